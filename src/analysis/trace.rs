//! ABIF (AB1) trace container parsing
//!
//! Reads the vendor capillary-sequencing format just far enough for the
//! pipeline: the called base sequence, the per-base peak locations, and the
//! four fluorescence channel arrays. Everything is big-endian.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAGIC: &[u8; 4] = b"ABIF";
/// The header's self-describing directory entry sits right after the magic
/// and version word.
const HEADER_ENTRY_OFFSET: usize = 6;
const DIR_ENTRY_SIZE: usize = 28;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("not an ABIF container (bad magic)")]
    BadMagic,
    #[error("truncated container while reading {0}")]
    Truncated(&'static str),
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("field order {0:?} does not name the four G/A/T/C channels")]
    BadFieldOrder(String),
    #[error("{bases} base calls but {peaks} peak locations")]
    PeakCountMismatch { bases: usize, peaks: usize },
    #[error("peak location {peak} outside signal range ({signal_length} samples)")]
    PeakOutOfRange { peak: usize, signal_length: usize },
}

/// The four raw fluorescence channels, keyed by base.
#[derive(Debug, Clone, Default)]
pub struct Channels {
    pub g: Vec<i16>,
    pub a: Vec<i16>,
    pub t: Vec<i16>,
    pub c: Vec<i16>,
}

impl Channels {
    /// Intensity array for one base symbol.
    pub fn for_base(&self, base: u8) -> Option<&[i16]> {
        match base.to_ascii_uppercase() {
            b'G' => Some(&self.g),
            b'A' => Some(&self.a),
            b'T' => Some(&self.t),
            b'C' => Some(&self.c),
            _ => None,
        }
    }
}

/// One parsed sequencing read. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Trace {
    sequence: String,
    peak_locations: Vec<usize>,
    channels: Channels,
    signal_length: usize,
}

impl Trace {
    /// Upper-case base-call sequence.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Signal-sample index of each base call, parallel to `sequence`.
    pub fn peak_locations(&self) -> &[usize] {
        &self.peak_locations
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Raw-signal sample count (common length of the channel arrays).
    pub fn signal_length(&self) -> usize {
        self.signal_length
    }

    /// Dense label over the full signal range: `Some(base)` at every sample
    /// index where a base call peaks, `None` elsewhere. Built by direct
    /// indexing, one pass over the peak list. Used for trace visualization,
    /// not by the alignment stages.
    pub fn base_labels(&self) -> Vec<Option<u8>> {
        let mut labels = vec![None; self.signal_length];
        let seq = self.sequence.as_bytes();
        for (i, &loc) in self.peak_locations.iter().enumerate() {
            labels[loc] = Some(seq[i]);
        }
        labels
    }
}

struct DirEntry {
    name: [u8; 4],
    number: u32,
    data_offset: usize,
    num_elements: usize,
    data: Vec<u8>,
}

fn be_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn slice<'a>(bytes: &'a [u8], at: usize, len: usize, what: &'static str) -> Result<&'a [u8], TraceError> {
    at.checked_add(len)
        .and_then(|end| bytes.get(at..end))
        .ok_or(TraceError::Truncated(what))
}

fn parse_entry(bytes: &[u8], at: usize) -> Result<DirEntry, TraceError> {
    let raw = slice(bytes, at, DIR_ENTRY_SIZE, "directory entry")?;
    let name = [raw[0], raw[1], raw[2], raw[3]];
    let number = be_u32(raw, 4);
    let data_size = be_u32(raw, 16) as usize;
    let data_offset = be_u32(raw, 20) as usize;
    // Payloads of four bytes or fewer are stored inline in the offset field.
    let data = if data_size <= 4 {
        raw[20..20 + data_size].to_vec()
    } else {
        slice(bytes, data_offset, data_size, "entry payload")?.to_vec()
    };
    Ok(DirEntry {
        name,
        number,
        data_offset,
        num_elements: be_u32(raw, 12) as usize,
        data,
    })
}

/// Look up a field by name, trying tag numbers in preference order.
fn field<'a>(entries: &'a [DirEntry], name: &[u8; 4], numbers: &[u32]) -> Option<&'a DirEntry> {
    numbers
        .iter()
        .find_map(|&n| entries.iter().find(|e| &e.name == name && e.number == n))
}

fn u16_values(entry: &DirEntry) -> Vec<u16> {
    entry
        .data
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

fn i16_values(entry: &DirEntry) -> Vec<i16> {
    entry
        .data
        .chunks_exact(2)
        .map(|c| i16::from_be_bytes([c[0], c[1]]))
        .collect()
}

/// Read and parse one trace container file.
pub fn read_trace(path: &Path) -> Result<Trace, TraceError> {
    let bytes = fs::read(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&bytes)
}

/// Parse a trace container from memory.
pub fn parse_trace(bytes: &[u8]) -> Result<Trace, TraceError> {
    if bytes.len() < 4 || &bytes[..4] != MAGIC {
        return Err(TraceError::BadMagic);
    }

    let header = parse_entry(bytes, HEADER_ENTRY_OFFSET)?;
    let mut entries = Vec::with_capacity(header.num_elements);
    for i in 0..header.num_elements {
        entries.push(parse_entry(bytes, header.data_offset + i * DIR_ENTRY_SIZE)?);
    }

    // The instrument stores both an original (1) and an edited (2) call set;
    // the edited sequence pairs with the original peak list here, matching
    // the upstream tooling this replaces.
    let bases = field(&entries, b"PBAS", &[2, 1]).ok_or(TraceError::MissingField("PBAS"))?;
    let peaks = field(&entries, b"PLOC", &[1, 2]).ok_or(TraceError::MissingField("PLOC"))?;

    let sequence: String = bases.data.iter().map(|b| b.to_ascii_uppercase() as char).collect();
    let peak_locations: Vec<usize> = u16_values(peaks).into_iter().map(usize::from).collect();

    if sequence.len() != peak_locations.len() {
        return Err(TraceError::PeakCountMismatch {
            bases: sequence.len(),
            peaks: peak_locations.len(),
        });
    }

    // Channel-to-base assignment follows the FWO_ field order; data tags
    // 9 through 12 hold the processed intensities.
    let order: Vec<u8> = match field(&entries, b"FWO_", &[1]) {
        Some(e) => e.data.clone(),
        None => b"GATC".to_vec(),
    };
    let mut channels = Channels::default();
    {
        let mut seen = [false; 4];
        if order.len() != 4 {
            return Err(TraceError::BadFieldOrder(
                String::from_utf8_lossy(&order).into_owned(),
            ));
        }
        for (i, &base) in order.iter().enumerate() {
            let tag = 9 + i as u32;
            let entry =
                field(&entries, b"DATA", &[tag]).ok_or(TraceError::MissingField("DATA"))?;
            let values = i16_values(entry);
            let slot = match base.to_ascii_uppercase() {
                b'G' => 0,
                b'A' => 1,
                b'T' => 2,
                b'C' => 3,
                _ => {
                    return Err(TraceError::BadFieldOrder(
                        String::from_utf8_lossy(&order).into_owned(),
                    ))
                }
            };
            seen[slot] = true;
            match slot {
                0 => channels.g = values,
                1 => channels.a = values,
                2 => channels.t = values,
                _ => channels.c = values,
            }
        }
        if seen != [true; 4] {
            return Err(TraceError::BadFieldOrder(
                String::from_utf8_lossy(&order).into_owned(),
            ));
        }
    }

    let signal_length = [&channels.g, &channels.a, &channels.t, &channels.c]
        .iter()
        .map(|ch| ch.len())
        .min()
        .unwrap_or(0);
    if let Some(&peak) = peak_locations.iter().find(|&&p| p >= signal_length) {
        return Err(TraceError::PeakOutOfRange {
            peak,
            signal_length,
        });
    }

    Ok(Trace {
        sequence,
        peak_locations,
        channels,
        signal_length,
    })
}

/// Test-only ABIF container builder, shared with the pipeline tests.
#[cfg(test)]
pub(crate) mod testutil {
    struct RawEntry {
        name: [u8; 4],
        number: u32,
        elem_type: u16,
        elem_size: u16,
        payload: Vec<u8>,
    }

    #[derive(Default)]
    pub(crate) struct AbifBuilder {
        entries: Vec<RawEntry>,
    }

    impl AbifBuilder {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn entry(
            mut self,
            name: &[u8; 4],
            number: u32,
            elem_type: u16,
            elem_size: u16,
            payload: Vec<u8>,
        ) -> Self {
            self.entries.push(RawEntry {
                name: *name,
                number,
                elem_type,
                elem_size,
                payload,
            });
            self
        }

        pub(crate) fn build(self) -> Vec<u8> {
            const HEADER_LEN: usize = 128;

            // Lay out payloads after the fixed header, directory after them.
            let mut blob = Vec::new();
            let mut offsets = Vec::new();
            for e in &self.entries {
                if e.payload.len() > 4 {
                    offsets.push(HEADER_LEN + blob.len());
                    blob.extend_from_slice(&e.payload);
                } else {
                    offsets.push(0);
                }
            }
            let dir_offset = HEADER_LEN + blob.len();

            let mut out = Vec::new();
            out.extend_from_slice(b"ABIF");
            out.extend_from_slice(&101u16.to_be_bytes());
            write_entry_header(
                &mut out,
                b"tdir",
                1,
                1023,
                28,
                self.entries.len(),
                self.entries.len() * 28,
                dir_offset,
                &[],
            );
            out.resize(HEADER_LEN, 0);
            out.extend_from_slice(&blob);
            for (e, &offset) in self.entries.iter().zip(&offsets) {
                write_entry_header(
                    &mut out,
                    &e.name,
                    e.number,
                    e.elem_type,
                    e.elem_size,
                    e.payload.len() / e.elem_size.max(1) as usize,
                    e.payload.len(),
                    offset,
                    &e.payload,
                );
            }
            out
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_entry_header(
        out: &mut Vec<u8>,
        name: &[u8; 4],
        number: u32,
        elem_type: u16,
        elem_size: u16,
        num_elements: usize,
        data_size: usize,
        data_offset: usize,
        payload: &[u8],
    ) {
        out.extend_from_slice(name);
        out.extend_from_slice(&number.to_be_bytes());
        out.extend_from_slice(&elem_type.to_be_bytes());
        out.extend_from_slice(&elem_size.to_be_bytes());
        out.extend_from_slice(&(num_elements as u32).to_be_bytes());
        out.extend_from_slice(&(data_size as u32).to_be_bytes());
        if data_size <= 4 {
            let mut inline = [0u8; 4];
            inline[..payload.len()].copy_from_slice(payload);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&(data_offset as u32).to_be_bytes());
        }
        out.extend_from_slice(&0u32.to_be_bytes()); // data handle
    }

    fn be_shorts(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    /// A minimal well-formed container: `sequence` called at `peaks`, flat
    /// channel signal of `signal_length` samples.
    pub(crate) fn trace_bytes(sequence: &str, peaks: &[u16], signal_length: usize) -> Vec<u8> {
        let peak_bytes: Vec<u8> = peaks.iter().flat_map(|p| p.to_be_bytes()).collect();
        let channel = be_shorts(&vec![7i16; signal_length]);
        AbifBuilder::new()
            .entry(b"PBAS", 2, 2, 1, sequence.as_bytes().to_vec())
            .entry(b"PLOC", 1, 4, 2, peak_bytes)
            .entry(b"FWO_", 1, 2, 1, b"GATC".to_vec())
            .entry(b"DATA", 9, 4, 2, channel.clone())
            .entry(b"DATA", 10, 4, 2, channel.clone())
            .entry(b"DATA", 11, 4, 2, channel.clone())
            .entry(b"DATA", 12, 4, 2, channel)
            .build()
    }
}

//! Target localization by local alignment
//!
//! Bisulfite reads can be sequenced from either strand relative to the
//! lab-chosen reference orientation, so the reference is aligned against the
//! trace sequence and against its reverse complement, and the higher-scoring
//! hypothesis wins. The extracted span is always reference-strand oriented.

use bio::alignment::pairwise::Aligner;
use bio::alphabets::dna;
use serde::Serialize;

use super::types::ScoringParams;

/// Which strand hypothesis produced the reported match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Forward,
    Reverse,
}

/// Where the reference was found within one trace read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedTarget {
    /// Trace span matching the reference, reference-strand oriented,
    /// upper case. Empty when no alignment was found.
    pub matched: String,
    /// Start offset into the orientation-chosen sequence.
    pub start: usize,
    /// End offset into the orientation-chosen sequence.
    pub end: usize,
    pub orientation: Orientation,
    /// Best local-alignment score (scaled scoring, see [`ScoringParams`]).
    pub score: i32,
}

impl LocatedTarget {
    /// Degenerate result for a read with no positive-scoring alignment in
    /// either orientation. Downstream stages treat the empty call string as
    /// a mismatch-everywhere sample.
    pub fn no_alignment() -> Self {
        Self {
            matched: String::new(),
            start: 0,
            end: 0,
            orientation: Orientation::Forward,
            score: 0,
        }
    }

    /// True when this is the degenerate no-alignment outcome.
    pub fn is_aligned(&self) -> bool {
        !self.matched.is_empty()
    }
}

/// Find the best local alignment of `reference` within `trace_seq`, trying
/// both orientations. Ties keep the forward hypothesis; a reverse hit must
/// score strictly higher to replace it.
pub fn locate(reference: &str, trace_seq: &str, params: &ScoringParams) -> LocatedTarget {
    let reference = reference.to_ascii_uppercase().into_bytes();
    let forward = trace_seq.to_ascii_uppercase().into_bytes();
    let reverse = dna::revcomp(&forward);

    let score = |a: u8, b: u8| {
        if a == b {
            params.match_score
        } else {
            params.mismatch_score
        }
    };
    let mut aligner = Aligner::with_capacity(
        reference.len(),
        forward.len(),
        params.gap_open,
        params.gap_extend,
        &score,
    );

    // Reference is the query (x); the trace span comes from y.
    let fwd = aligner.local(&reference, &forward);
    let rev = aligner.local(&reference, &reverse);

    let (alignment, oriented, orientation) = if rev.score > fwd.score {
        (rev, &reverse, Orientation::Reverse)
    } else {
        (fwd, &forward, Orientation::Forward)
    };

    if alignment.score <= 0 {
        return LocatedTarget::no_alignment();
    }

    LocatedTarget {
        matched: String::from_utf8_lossy(&oriented[alignment.ystart..alignment.yend]).into_owned(),
        start: alignment.ystart,
        end: alignment.yend,
        orientation,
        score: alignment.score,
    }
}

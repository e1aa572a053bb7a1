//! Shared data types for the methylation analysis pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Local-alignment scoring parameters.
///
/// The defaults reproduce a match/mismatch/gap scheme of +2 / -0.1 / -4 / -2
/// scaled by 10, so the fractional mismatch penalty stays in integer space
/// without changing any score comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: 20,
            mismatch_score: -1,
            gap_open: -40,
            gap_extend: -20,
        }
    }
}

/// One analysis row: a reference sequence plus the trace reads sequenced
/// from it, and the per-row visualization options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowInput {
    /// Report name, used to label output artifacts.
    pub name: String,
    /// Reference DNA sequence (the strand the analysis works on).
    pub reference: String,
    /// Trace container files, one per sequenced sample.
    pub trace_paths: Vec<PathBuf>,
    /// Additional 1-indexed positions to force into the heat map.
    #[serde(default)]
    pub include_sites: Vec<usize>,
    /// 1-indexed positions to drop from the heat map.
    #[serde(default)]
    pub exclude_sites: Vec<usize>,
    /// Sample names are the trace file name up to the first occurrence of
    /// this separator; the full file name when absent.
    #[serde(default)]
    pub name_separator: Option<String>,
}

/// Non-fatal conditions observed while analyzing a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RowWarning {
    /// Neither alignment orientation scored above zero for this sample;
    /// its matrix row is all zeros.
    NoAlignment { sample: String },
    /// The sample's aligned call string is shorter than the reference, so
    /// trailing sites read as unmethylated.
    ShortAlignment {
        sample: String,
        aligned_len: usize,
        reference_len: usize,
    },
}

/// A trace file that could not be parsed; the sample is reported missing
/// and the rest of the row proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTrace {
    pub path: PathBuf,
    pub error: String,
}

//! Per-row analysis pipeline and batch driver
//!
//! One row = one reference sequence plus its trace files. Traces are read
//! and aligned in parallel against the shared immutable reference, the
//! results join, and the matrices and heat map are built from the joined
//! call strings. A bad trace degrades that one sample; only an unusable
//! reference or an empty trace list fails the row, and a failed row never
//! stops the batch.

use bio::alphabets::dna;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::aligner::{locate, LocatedTarget};
use super::methylation::{MethylationCalls, SiteMatrix, SiteSet};
use super::report::{filtered_matrix, plot_series, HeatMap};
use super::trace::read_trace;
use super::types::{FailedTrace, RowInput, RowWarning, ScoringParams};

/// Cooperative cancellation for a running batch. Cancelling stops work at
/// the next trace boundary; rows already completed are unaffected.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Error)]
pub enum RowError {
    #[error("reference sequence is empty")]
    EmptyReference,
    #[error("reference sequence contains non-IUPAC characters")]
    InvalidReference,
    #[error("no trace files supplied")]
    NoTraceFiles,
    #[error("analysis cancelled")]
    Cancelled,
}

/// Everything the reporting layer needs for one row, in plain tabular and
/// numeric form.
#[derive(Debug, Clone, Serialize)]
pub struct RowReport {
    pub name: String,
    pub reference: String,
    /// One entry per successfully parsed trace, in input order.
    pub sample_names: Vec<String>,
    pub alignments: Vec<LocatedTarget>,
    pub c_matrix: SiteMatrix,
    pub cpg_matrix: SiteMatrix,
    /// Peak counts over the full reference length, one value per position.
    pub c_series: Vec<u32>,
    pub cpg_series: Vec<u32>,
    pub heat_map: HeatMap,
    pub failed_traces: Vec<FailedTrace>,
    pub warnings: Vec<RowWarning>,
}

enum TraceOutcome {
    Aligned {
        sample: String,
        located: LocatedTarget,
    },
    Failed(FailedTrace),
    Cancelled,
}

/// Sample name: trace file name cut at the first separator occurrence.
fn sample_name(path: &Path, separator: Option<&str>) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match separator {
        Some(sep) if !sep.is_empty() => file_name
            .split(sep)
            .next()
            .unwrap_or(&file_name)
            .to_string(),
        _ => file_name,
    }
}

/// Analyze one row end to end.
pub fn analyze_row(
    row: &RowInput,
    params: &ScoringParams,
    token: &CancelToken,
) -> Result<RowReport, RowError> {
    let reference = row.reference.trim().to_ascii_uppercase();
    if reference.is_empty() {
        return Err(RowError::EmptyReference);
    }
    if !dna::iupac_alphabet().is_word(reference.as_bytes()) {
        return Err(RowError::InvalidReference);
    }
    if row.trace_paths.is_empty() {
        return Err(RowError::NoTraceFiles);
    }
    if token.is_cancelled() {
        return Err(RowError::Cancelled);
    }

    info!(
        "row {}: aligning {} trace(s) against a {} bp reference",
        row.name,
        row.trace_paths.len(),
        reference.len()
    );

    let separator = row.name_separator.as_deref();
    let outcomes: Vec<TraceOutcome> = row
        .trace_paths
        .par_iter()
        .map(|path| {
            if token.is_cancelled() {
                return TraceOutcome::Cancelled;
            }
            match read_trace(path) {
                Ok(trace) => TraceOutcome::Aligned {
                    sample: sample_name(path, separator),
                    located: locate(&reference, trace.sequence(), params),
                },
                Err(error) => TraceOutcome::Failed(FailedTrace {
                    path: path.clone(),
                    error: error.to_string(),
                }),
            }
        })
        .collect();

    // Join point: every trace of the row is done before the matrices build.
    if token.is_cancelled() {
        return Err(RowError::Cancelled);
    }

    let mut sample_names = Vec::new();
    let mut alignments = Vec::new();
    let mut failed_traces = Vec::new();
    let mut warnings = Vec::new();
    for outcome in outcomes {
        match outcome {
            TraceOutcome::Aligned { sample, located } => {
                if !located.is_aligned() {
                    warn!("row {}: no alignment for sample {}", row.name, sample);
                    warnings.push(RowWarning::NoAlignment {
                        sample: sample.clone(),
                    });
                } else if located.matched.len() < reference.len() {
                    warnings.push(RowWarning::ShortAlignment {
                        sample: sample.clone(),
                        aligned_len: located.matched.len(),
                        reference_len: reference.len(),
                    });
                }
                sample_names.push(sample);
                alignments.push(located);
            }
            TraceOutcome::Failed(failed) => {
                warn!(
                    "row {}: skipping unreadable trace {}: {}",
                    row.name,
                    failed.path.display(),
                    failed.error
                );
                failed_traces.push(failed);
            }
            TraceOutcome::Cancelled => return Err(RowError::Cancelled),
        }
    }

    let call_strings: Vec<String> = alignments.iter().map(|a| a.matched.clone()).collect();
    let calls = MethylationCalls::new(reference.clone(), call_strings);
    let c_matrix = calls.build_matrix(SiteSet::C);
    let cpg_matrix = calls.build_matrix(SiteSet::Cpg);
    let c_series = plot_series(&c_matrix, reference.len());
    let cpg_series = plot_series(&cpg_matrix, reference.len());
    let heat_map = filtered_matrix(&calls, &cpg_matrix, &row.include_sites, &row.exclude_sites);

    Ok(RowReport {
        name: row.name.clone(),
        reference,
        sample_names,
        alignments,
        c_matrix,
        cpg_matrix,
        c_series,
        cpg_series,
        heat_map,
        failed_traces,
        warnings,
    })
}

/// Run every row, collecting per-row results; one failed row never aborts
/// the rest.
pub fn analyze_batch(
    rows: &[RowInput],
    params: &ScoringParams,
    token: &CancelToken,
) -> Vec<(String, Result<RowReport, RowError>)> {
    rows.iter()
        .map(|row| (row.name.clone(), analyze_row(row, params, token)))
        .collect()
}

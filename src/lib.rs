//! BS-Call - Bisulfite Sanger Methylation Analysis
//!
//! Locates a reference sequence within capillary-sequencing (AB1) trace
//! reads by local alignment, classifies each reference C and CpG position
//! as methylated or unmethylated per sample, and aggregates the calls into
//! peak-count series and a binary heat map across samples.

pub mod analysis;

pub use analysis::*;

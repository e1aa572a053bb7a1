//! Report aggregation: peak-count series and the filtered heat map
//!
//! Consumes the builder's matrices and produces the numeric series and the
//! position-filtered binary matrix the rendering layer draws from.

use log::warn;
use serde::Serialize;
use thiserror::Error;

use super::methylation::{MethylationCalls, SiteMatrix};

/// A site include/exclude list that could not be parsed. The run layer
/// falls back to an empty list and logs the degradation; parsing itself
/// never guesses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid site list token {token:?}")]
pub struct FilterParseError {
    pub token: String,
}

/// Parse a comma-separated list of 1-indexed site positions. The fullwidth
/// comma `，` is accepted as a separator; empty tokens are skipped. Any
/// non-numeric token fails the whole list.
pub fn parse_site_list(text: &str) -> Result<Vec<usize>, FilterParseError> {
    let text = text.replace('，', ",");
    let mut sites = Vec::new();
    for token in text.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<usize>() {
            Ok(site) => sites.push(site),
            Err(_) => {
                return Err(FilterParseError {
                    token: token.to_string(),
                })
            }
        }
    }
    Ok(sites)
}

/// Parse a user-supplied site list, degrading a malformed list to no
/// filter. The fallback is applied here, once, and logged; downstream code
/// never sees a partially parsed list.
pub fn site_list_or_default(which: &str, text: Option<&str>) -> Vec<usize> {
    let Some(text) = text else {
        return Vec::new();
    };
    match parse_site_list(text) {
        Ok(sites) => sites,
        Err(e) => {
            warn!("ignoring {which} list: {e}");
            Vec::new()
        }
    }
}

/// Expand per-site peak counts into one value per reference position, zero
/// off-site. Feeds the linear peak-count plot.
pub fn plot_series(matrix: &SiteMatrix, reference_len: usize) -> Vec<u32> {
    let mut series = vec![0u32; reference_len];
    for (&site, &count) in matrix.sites.iter().zip(&matrix.peak_counts) {
        if site < reference_len {
            series[site] = count;
        }
    }
    series
}

/// Position-filtered binary matrix for the per-sample heat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatMap {
    /// Plotted reference positions, ascending, 0-indexed.
    pub sites: Vec<usize>,
    /// The same positions 1-indexed, as shown on the axis.
    pub labels: Vec<usize>,
    /// One row per sample; one column per site plus a trailing always-zero
    /// boundary column the renderer relies on.
    pub rows: Vec<Vec<u8>>,
}

/// Build the heat map: start from the matrix's sites, force-include and
/// then remove the caller's 1-indexed positions (out-of-range or absent
/// entries are silently ignored), sort, and rescore every sample from its
/// raw call string. A cell is 1 only when the call matches the reference
/// *and* the reference base is a C; include-listed non-C positions render
/// as 0.
pub fn filtered_matrix(
    calls: &MethylationCalls,
    base: &SiteMatrix,
    include: &[usize],
    exclude: &[usize],
) -> HeatMap {
    let reference = calls.reference().as_bytes();
    let mut sites = base.sites.clone();

    for &pos in include {
        let Some(site) = pos.checked_sub(1) else {
            continue;
        };
        if site < reference.len() && !sites.contains(&site) {
            sites.push(site);
        }
    }
    for &pos in exclude {
        let Some(site) = pos.checked_sub(1) else {
            continue;
        };
        sites.retain(|&s| s != site);
    }
    sites.sort_unstable();
    sites.dedup();

    let rows = calls
        .samples()
        .iter()
        .map(|sample| {
            let sample = sample.as_bytes();
            let mut row: Vec<u8> = sites
                .iter()
                .map(|&site| {
                    let matches = sample.get(site) == Some(&reference[site]);
                    u8::from(matches && reference[site] == b'C')
                })
                .collect();
            row.push(0); // rendering boundary column
            row
        })
        .collect();

    HeatMap {
        labels: sites.iter().map(|&s| s + 1).collect(),
        sites,
        rows,
    }
}

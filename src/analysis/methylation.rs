//! Methylation call matrix construction
//!
//! A reference cytosine counts as methylated in a sample when the sample's
//! aligned base at that position still reads as the reference base
//! (bisulfite conversion left it untouched). Comparison is strict
//! index-aligned equality against the reference; the local alignment is
//! trusted to have introduced no indels inside the matched span.

use serde::Serialize;

/// Which reference positions to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SiteSet {
    /// Every reference `C`.
    C,
    /// Every reference `C` immediately followed by `G`, reported at the `C`.
    Cpg,
}

/// Rectangular binary call matrix for one site set.
///
/// `rows` has one row per sample and one column per entry of `sites`;
/// `peak_counts` is the per-site column sum, parallel to `sites`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteMatrix {
    /// Scored reference positions, ascending, 0-indexed.
    pub sites: Vec<usize>,
    pub peak_counts: Vec<u32>,
    pub rows: Vec<Vec<u8>>,
}

impl SiteMatrix {
    /// Peak count at one reference position, `None` off-site.
    pub fn peak_count_at(&self, site: usize) -> Option<u32> {
        self.sites
            .iter()
            .position(|&s| s == site)
            .map(|i| self.peak_counts[i])
    }
}

/// One reference sequence plus the per-sample aligned call strings
/// co-registered to its coordinates. Pure data; every build is a function
/// of the constructor inputs alone.
#[derive(Debug, Clone)]
pub struct MethylationCalls {
    reference: String,
    samples: Vec<String>,
}

impl MethylationCalls {
    pub fn new(reference: impl Into<String>, samples: Vec<String>) -> Self {
        Self {
            reference: reference.into().to_ascii_uppercase(),
            samples,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// All reference positions holding a `C`.
    pub fn c_sites(&self) -> Vec<usize> {
        self.reference
            .bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'C')
            .map(|(i, _)| i)
            .collect()
    }

    /// All CpG positions, reported at the `C`.
    pub fn cpg_sites(&self) -> Vec<usize> {
        let seq = self.reference.as_bytes();
        seq.windows(2)
            .enumerate()
            .filter(|&(_, pair)| pair == b"CG")
            .map(|(i, _)| i)
            .collect()
    }

    pub fn sites(&self, set: SiteSet) -> Vec<usize> {
        match set {
            SiteSet::C => self.c_sites(),
            SiteSet::Cpg => self.cpg_sites(),
        }
    }

    /// Score every sample at every site of `set`.
    ///
    /// A call string shorter than the reference simply has no base at the
    /// queried position; that is an explicit branch scoring `0`, so the
    /// matrix stays rectangular for truncated alignments.
    pub fn build_matrix(&self, set: SiteSet) -> SiteMatrix {
        let sites = self.sites(set);
        let reference = self.reference.as_bytes();
        let mut peak_counts = vec![0u32; sites.len()];
        let mut rows = Vec::with_capacity(self.samples.len());

        for sample in &self.samples {
            let calls = sample.as_bytes();
            let mut row = Vec::with_capacity(sites.len());
            for (column, &site) in sites.iter().enumerate() {
                let methylated = match calls.get(site) {
                    Some(&base) => base == reference[site],
                    None => false,
                };
                if methylated {
                    peak_counts[column] += 1;
                    row.push(1);
                } else {
                    row.push(0);
                }
            }
            rows.push(row);
        }

        SiteMatrix {
            sites,
            peak_counts,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_detection_on_acgt() {
        let calls = MethylationCalls::new("ACGT", vec![]);
        assert_eq!(calls.c_sites(), vec![1]);
        assert_eq!(calls.cpg_sites(), vec![1]);
    }

    #[test]
    fn cpg_requires_following_g() {
        let calls = MethylationCalls::new("CCACCT", vec![]);
        assert_eq!(calls.c_sites(), vec![0, 1, 3, 4]);
        assert!(calls.cpg_sites().is_empty());
    }

    #[test]
    fn matrix_is_rectangular() {
        let calls = MethylationCalls::new(
            "ACGTCCGT",
            vec!["ACGTCCGT".into(), "AT".into(), String::new()],
        );
        let matrix = calls.build_matrix(SiteSet::C);
        assert_eq!(matrix.rows.len(), 3);
        for row in &matrix.rows {
            assert_eq!(row.len(), matrix.sites.len());
        }
        assert_eq!(matrix.peak_counts.len(), matrix.sites.len());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let calls = MethylationCalls::new("ATCGAATCGT", vec!["ATCGAATCGT".into(), "ATTG".into()]);
        let first = calls.build_matrix(SiteSet::Cpg);
        let second = calls.build_matrix(SiteSet::Cpg);
        assert_eq!(first, second);
    }

    #[test]
    fn fully_methylated_sample() {
        let calls = MethylationCalls::new("ATCGAATCGT", vec!["ATCGAATCGT".into()]);
        assert_eq!(calls.cpg_sites(), vec![2, 7]);
        let matrix = calls.build_matrix(SiteSet::Cpg);
        assert_eq!(matrix.peak_count_at(2), Some(1));
        assert_eq!(matrix.rows, vec![vec![1, 1]]);
    }

    #[test]
    fn converted_c_reads_unmethylated() {
        // Bisulfite converted the C of the first CpG to T.
        let calls = MethylationCalls::new("ATCGAATCGT", vec!["ATTGAATCGT".into()]);
        let matrix = calls.build_matrix(SiteSet::Cpg);
        assert_eq!(matrix.peak_count_at(2), Some(0));
        assert_eq!(matrix.rows, vec![vec![0, 1]]);
    }

    #[test]
    fn truncated_call_string_scores_zero_past_its_end() {
        let calls = MethylationCalls::new("ATCGAATCGT", vec!["ATCG".into()]);
        let matrix = calls.build_matrix(SiteSet::Cpg);
        // Site 2 is within the truncated string, site 7 beyond it.
        assert_eq!(matrix.rows, vec![vec![1, 0]]);
        assert_eq!(matrix.peak_counts, vec![1, 0]);
    }

    #[test]
    fn empty_call_string_is_all_zeros() {
        let calls = MethylationCalls::new("ACGACG", vec![String::new()]);
        let matrix = calls.build_matrix(SiteSet::C);
        assert_eq!(matrix.rows, vec![vec![0, 0]]);
    }
}

//! Tabular export of per-row results
//!
//! Writes the mC/mCG call matrices and the aligned-sequence sheet as TSV,
//! rows = samples, columns = 1-indexed reference positions. Writers are
//! flushed before returning on every path, so a failed row never leaves a
//! half-written sheet behind silently.

use csv::WriterBuilder;
use std::path::Path;

use super::methylation::SiteMatrix;
use super::run::RowReport;

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, csv::Error> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
}

/// One binary call matrix: header row of 1-indexed site positions, then one
/// row per sample.
pub fn write_matrix_sheet(
    path: &Path,
    sample_names: &[String],
    matrix: &SiteMatrix,
) -> Result<(), csv::Error> {
    let mut writer = tsv_writer(path)?;

    let mut header = vec![String::new()];
    header.extend(matrix.sites.iter().map(|&s| (s + 1).to_string()));
    writer.write_record(&header)?;

    for (name, row) in sample_names.iter().zip(&matrix.rows) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// The full aligned call strings, one base per column, padded to the
/// reference length, with the reference itself as the final row.
pub fn write_sequence_sheet(path: &Path, report: &RowReport) -> Result<(), csv::Error> {
    let mut writer = tsv_writer(path)?;
    let reference_len = report.reference.len();

    let mut header = vec![String::new()];
    header.extend((1..=reference_len).map(|i| i.to_string()));
    writer.write_record(&header)?;

    for (name, alignment) in report.sample_names.iter().zip(&report.alignments) {
        let mut record = vec![name.clone()];
        let calls = alignment.matched.as_bytes();
        for i in 0..reference_len {
            record.push(match calls.get(i) {
                Some(&b) => (b as char).to_string(),
                None => String::new(),
            });
        }
        writer.write_record(&record)?;
    }

    let mut reference_row = vec!["Reference".to_string()];
    reference_row.extend(report.reference.chars().map(|c| c.to_string()));
    writer.write_record(&reference_row)?;
    writer.flush()?;
    Ok(())
}

/// Write the three sheets for one row into `dir`, named after the row.
pub fn write_row_sheets(dir: &Path, report: &RowReport) -> Result<(), csv::Error> {
    write_matrix_sheet(
        &dir.join(format!("{}_mC.tsv", report.name)),
        &report.sample_names,
        &report.c_matrix,
    )?;
    write_matrix_sheet(
        &dir.join(format!("{}_mCG.tsv", report.name)),
        &report.sample_names,
        &report.cpg_matrix,
    )?;
    write_sequence_sheet(&dir.join(format!("{}_sequence.tsv", report.name)), report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aligner::{LocatedTarget, Orientation};
    use crate::analysis::methylation::{MethylationCalls, SiteSet};
    use crate::analysis::report::{filtered_matrix, plot_series};
    use std::fs;
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bscall-sheets-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn matrix_sheet_layout() {
        let calls = MethylationCalls::new("ATCGAATCGT", vec!["ATCGAATCGT".into(), "ATTGAATCGT".into()]);
        let matrix = calls.build_matrix(SiteSet::Cpg);
        let path = temp_file("m.tsv");
        write_matrix_sheet(&path, &["s1".into(), "s2".into()], &matrix).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "\t3\t8");
        assert_eq!(lines[1], "s1\t1\t1");
        assert_eq!(lines[2], "s2\t0\t1");
    }

    fn located(matched: &str) -> LocatedTarget {
        LocatedTarget {
            matched: matched.into(),
            start: 0,
            end: matched.len(),
            orientation: Orientation::Forward,
            score: matched.len() as i32 * 20,
        }
    }

    fn report_with_truncated_sample() -> RowReport {
        let reference = "ACGTAC".to_string();
        let calls = MethylationCalls::new(reference.clone(), vec!["ACGTAC".into(), "ACG".into()]);
        let c_matrix = calls.build_matrix(SiteSet::C);
        let cpg_matrix = calls.build_matrix(SiteSet::Cpg);
        let heat_map = filtered_matrix(&calls, &cpg_matrix, &[], &[]);
        RowReport {
            name: "row".into(),
            sample_names: vec!["s1".into(), "s2".into()],
            alignments: vec![located("ACGTAC"), located("ACG")],
            c_series: plot_series(&c_matrix, reference.len()),
            cpg_series: plot_series(&cpg_matrix, reference.len()),
            reference,
            c_matrix,
            cpg_matrix,
            heat_map,
            failed_traces: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn sequence_sheet_layout() {
        let report = report_with_truncated_sample();
        let path = temp_file("seq.tsv");
        write_sequence_sheet(&path, &report).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // Header: one column per 1-indexed reference position.
        assert_eq!(lines[0], "\t1\t2\t3\t4\t5\t6");
        assert_eq!(lines[1], "s1\tA\tC\tG\tT\tA\tC");
        // A truncated call string pads with empty cells to reference length.
        assert_eq!(lines[2], "s2\tA\tC\tG\t\t\t");
        // The reference itself is the final row.
        assert_eq!(lines[3], "Reference\tA\tC\tG\tT\tA\tC");
        assert_eq!(lines.len(), 4);
    }
}

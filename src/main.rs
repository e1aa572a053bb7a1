//! BS-Call - Bisulfite Sanger Methylation Analysis
//!
//! Batch CLI over the analysis pipeline: each row pairs one reference
//! sequence with its trace files; results land as TSV sheets plus a JSON
//! report per row.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod analysis;

use analysis::{
    analyze_batch, site_list_or_default, write_row_sheets, CancelToken, RowInput, ScoringParams,
};
use clap::Parser;
use log::error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bscall", about = "Bisulfite Sanger methylation analysis", version)]
struct Cli {
    /// JSON batch manifest (an array of rows); overrides the single-row flags.
    #[arg(long, conflicts_with_all = ["name", "reference", "trace"])]
    batch: Option<PathBuf>,

    /// Report name for a single-row run.
    #[arg(long, requires = "reference")]
    name: Option<String>,

    /// Reference DNA sequence.
    #[arg(long)]
    reference: Option<String>,

    /// Trace file, repeatable.
    #[arg(long = "trace")]
    trace: Vec<PathBuf>,

    /// Comma-separated 1-indexed positions to force into the heat map.
    #[arg(long)]
    include: Option<String>,

    /// Comma-separated 1-indexed positions to drop from the heat map.
    #[arg(long)]
    exclude: Option<String>,

    /// Sample-name separator applied to trace file names.
    #[arg(long)]
    separator: Option<String>,

    /// Output directory for sheets and reports.
    #[arg(long, default_value = "reports")]
    out: PathBuf,
}

fn load_rows(cli: &Cli) -> Result<Vec<RowInput>, String> {
    if let Some(manifest) = &cli.batch {
        let file = File::open(manifest)
            .map_err(|e| format!("cannot open manifest {}: {e}", manifest.display()))?;
        return serde_json::from_reader(BufReader::new(file))
            .map_err(|e| format!("cannot parse manifest {}: {e}", manifest.display()));
    }

    let Some(reference) = cli.reference.clone() else {
        return Err("either --batch or --reference/--trace is required".into());
    };
    Ok(vec![RowInput {
        name: cli.name.clone().unwrap_or_else(|| "report".into()),
        reference,
        trace_paths: cli.trace.clone(),
        include_sites: site_list_or_default("include", cli.include.as_deref()),
        exclude_sites: site_list_or_default("exclude", cli.exclude.as_deref()),
        name_separator: cli.separator.clone(),
    }])
}

fn run(cli: &Cli) -> Result<usize, String> {
    let rows = load_rows(cli)?;
    std::fs::create_dir_all(&cli.out)
        .map_err(|e| format!("cannot create {}: {e}", cli.out.display()))?;

    let results = analyze_batch(&rows, &ScoringParams::default(), &CancelToken::new());
    let mut failures = 0;
    for (name, result) in results {
        match result {
            Ok(report) => {
                if let Err(e) = write_row_sheets(&cli.out, &report) {
                    error!("row {name}: failed to write sheets: {e}");
                    failures += 1;
                    continue;
                }
                let json_path = cli.out.join(format!("{name}_report.json"));
                let write_report = File::create(&json_path)
                    .map_err(|e| e.to_string())
                    .and_then(|file| {
                        let mut writer = BufWriter::new(file);
                        serde_json::to_writer_pretty(&mut writer, &report)
                            .map_err(|e| e.to_string())?;
                        writer.flush().map_err(|e| e.to_string())
                    });
                if let Err(e) = write_report {
                    error!("row {name}: failed to write report: {e}");
                    failures += 1;
                }
            }
            Err(e) => {
                error!("row {name}: {e}");
                failures += 1;
            }
        }
    }
    Ok(failures)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

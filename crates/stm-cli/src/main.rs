//! Specimen Table Merger CLI
//!
//! Command-line tool for merging specimen tables on a unifying field.

use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use stm_core::{
    expand_inputs, merge, merge_to_writer, BatchFile, Delimiter, MergeConfig, MergeReport,
    TableFormat,
};

#[derive(Parser)]
#[command(name = "stm-cli")]
#[command(about = "Merge specimen tables on a unifying field", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge input tables into one output table
    Merge {
        /// Input files or directories
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Output file, or '-' for stdout
        #[arg(short, long)]
        output: PathBuf,

        /// Column whose value identifies rows that belong together
        #[arg(short, long, default_value = "specimenid")]
        field: String,

        /// Ignore case and separators (- _ . / \ and space) when comparing
        #[arg(long)]
        fuzzy: bool,

        /// Delimiter of the input files (tab, comma, semicolon)
        #[arg(long, default_value = "tab")]
        input_format: Delimiter,

        /// Delimiter of the output file (tab, comma, semicolon)
        #[arg(long, default_value = "tab")]
        output_format: Delimiter,

        /// Write a JSON report of the merge to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the normalized columns of input tables
    Columns {
        /// Input files or directories
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Delimiter of the input files (tab, comma, semicolon)
        #[arg(long, default_value = "tab")]
        input_format: Delimiter,
    },

    /// Run every merge job of a batch file
    Batch {
        /// Path to batch file (JSON)
        #[arg(short, long)]
        batch: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(command: Commands) -> stm_core::Result<()> {
    match command {
        Commands::Merge {
            input,
            output,
            field,
            fuzzy,
            input_format,
            output_format,
            report,
        } => {
            let config = MergeConfig::new(field)
                .fuzzy(fuzzy)
                .formats(input_format, output_format);
            cmd_merge(&input, &output, &config, report.as_deref())
        }
        Commands::Columns {
            input,
            input_format,
        } => cmd_columns(&input, input_format),
        Commands::Batch { batch } => cmd_batch(&batch),
    }
}

fn cmd_merge(
    inputs: &[PathBuf],
    output: &Path,
    config: &MergeConfig,
    report_path: Option<&Path>,
) -> stm_core::Result<()> {
    let inputs = expand_inputs(inputs)?;

    let report = if output == Path::new("-") {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let report = merge_to_writer(&inputs, &mut handle, config)?;
        handle.flush()?;
        report
    } else {
        merge(&inputs, output, config)?
    };

    print_summary(&report);

    if let Some(path) = report_path {
        report.save(path)?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}

/// Summary goes to stderr so stdout can carry the merged table
fn print_summary(report: &MergeReport) {
    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }

    let mode = if report.fuzzy_merge { "fuzzy" } else { "exact" };
    eprintln!(
        "Merged {} rows from {} file(s) on '{}' ({} match)",
        report.rows_read,
        report.inputs.len(),
        report.unifying_field,
        mode
    );
    eprintln!(
        "  {} groups: {} merged, {} not merged",
        report.groups,
        report.merged_groups,
        report.conflicted_groups()
    );

    for conflict in &report.conflicts {
        eprintln!(
            "  - {} ({} rows): {} differ",
            conflict.key.as_deref().unwrap_or("<empty>"),
            conflict.rows,
            conflict.columns.join(", ")
        );
    }

    match &report.output {
        Some(path) => eprintln!("Wrote {} rows to {}", report.rows_written, path.display()),
        None => eprintln!("Wrote {} rows", report.rows_written),
    }
}

fn cmd_columns(inputs: &[PathBuf], input_format: Delimiter) -> stm_core::Result<()> {
    let inputs = expand_inputs(inputs)?;
    let format = input_format.format();

    let mut common: Option<BTreeSet<String>> = None;
    for path in &inputs {
        let table = format.load_table(path)?;
        let names: Vec<&str> = table.column_names();

        println!("{} ({} rows)", path.display(), table.row_count());
        println!("  {}", names.join(", "));

        let these: BTreeSet<String> = names.iter().map(|n| n.to_string()).collect();
        common = Some(match common {
            Some(seen) => seen.intersection(&these).cloned().collect(),
            None => these,
        });
    }

    let common = common.unwrap_or_default();
    println!();
    if common.is_empty() {
        println!("No column is shared by all inputs");
    } else {
        let names: Vec<&str> = common.iter().map(String::as_str).collect();
        println!("Shared by all inputs: {}", names.join(", "));
    }

    Ok(())
}

fn cmd_batch(batch_path: &Path) -> stm_core::Result<()> {
    let batch = BatchFile::load(batch_path)?;

    println!("Running batch with {} merge job(s)", batch.jobs.len());
    println!();

    let mut errors = Vec::new();
    let mut completed = 0;

    for job in &batch.jobs {
        println!("Merging into {}", job.output.display());

        match job.run() {
            Ok(report) => {
                completed += 1;
                for warning in &report.warnings {
                    println!("  Warning: {}", warning);
                }
                println!(
                    "  {} rows in, {} rows out, {} group(s) not merged",
                    report.rows_read,
                    report.rows_written,
                    report.conflicted_groups()
                );
            }
            Err(e) => errors.push((job.output.clone(), e.to_string())),
        }
    }

    println!();
    println!("Batch complete:");
    println!("  {} of {} jobs succeeded", completed, batch.jobs.len());

    if !errors.is_empty() {
        println!("\nErrors ({}):", errors.len());
        for (path, err) in &errors {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}

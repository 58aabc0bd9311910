//! WaferScan CLI - KLARF wafer-inspection result inspection from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use waferscan::{
    parse_inspection, Inspection, InspectionReport, LoadOptions, WaferScanCore,
};

#[derive(Parser)]
#[command(name = "waferscan")]
#[command(about = "KLARF wafer-inspection result file tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single result file and print its summary
    Info {
        /// Path to a .klarf/.kla result file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Skip die-map reconstruction
        #[arg(long)]
        no_die_map: bool,

        /// Exit with error code if the file's summary row disagrees with
        /// the parsed data
        #[arg(long)]
        fail_on_mismatch: bool,
    },

    /// Parse all result files in a directory
    Lot {
        /// Path to lot directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if any summary row disagrees
        #[arg(long)]
        fail_on_mismatch: bool,
    },

    /// Print an ASCII wafer map with per-die defect counts
    Map {
        /// Path to a .klarf/.kla result file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Re-serialize a result file to canonical KLARF text
    Export {
        /// Path to a .klarf/.kla result file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Info {
            file,
            format,
            no_die_map,
            fail_on_mismatch,
        } => handle_info(&file, format, no_die_map, fail_on_mismatch),
        Commands::Lot {
            dir,
            format,
            fail_on_mismatch,
        } => handle_lot(&dir, format, fail_on_mismatch),
        Commands::Map { file } => handle_map(&file),
        Commands::Export { file, output } => handle_export(&file, output.as_deref()),
    };

    process::exit(exit_code);
}

fn handle_info(
    file: &PathBuf,
    format: OutputFormat,
    no_die_map: bool,
    fail_on_mismatch: bool,
) -> i32 {
    let options = LoadOptions {
        build_die_map: !no_die_map,
        verify_summary: !no_die_map,
    };

    match WaferScanCore::load_inspection(file, options) {
        Ok(report) => {
            output_reports(&[report.clone()], &format);
            if fail_on_mismatch && report.has_mismatches() {
                return 1;
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_lot(dir: &PathBuf, format: OutputFormat, fail_on_mismatch: bool) -> i32 {
    match WaferScanCore::load_lot(dir, LoadOptions::default()) {
        Ok(reports) => {
            output_reports(&reports, &format);
            if fail_on_mismatch && reports.iter().any(|r| r.has_mismatches()) {
                return 1;
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_map(file: &PathBuf) -> i32 {
    let mut inspection = match parse_inspection(file) {
        Ok(Some(inspection)) => inspection,
        Ok(None) => {
            eprintln!("Error: {} is not a KLARF result file", file.display());
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    inspection.build_die_map();

    println!(
        "Lot {} wafer {} - {} dies, {} defects",
        inspection.lot_id,
        inspection.wafer_id,
        inspection.dies.len(),
        inspection.defects.len()
    );
    print!("{}", render_map(&inspection));
    println!("Legend: '.' clean die, 1-9 defect count, '#' 10 or more");
    0
}

fn handle_export(file: &PathBuf, output: Option<&std::path::Path>) -> i32 {
    let inspection = match parse_inspection(file) {
        Ok(Some(inspection)) => inspection,
        Ok(None) => {
            eprintln!("Error: {} is not a KLARF result file", file.display());
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let text = inspection.to_string();
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("Error: {}", e);
                return 1;
            }
            0
        }
        None => {
            print!("{}", text);
            0
        }
    }
}

/// ASCII wafer map: one character per die, top row = highest y index.
fn render_map(inspection: &Inspection) -> String {
    if inspection.dies.is_empty() {
        return "(no dies qualify)\n".to_string();
    }

    let min_x = inspection.dies.values().map(|d| d.index_x).min().unwrap();
    let max_x = inspection.dies.values().map(|d| d.index_x).max().unwrap();
    let min_y = inspection.dies.values().map(|d| d.index_y).min().unwrap();
    let max_y = inspection.dies.values().map(|d| d.index_y).max().unwrap();

    let mut out = String::new();
    for y in (min_y..=max_y).rev() {
        for x in min_x..=max_x {
            let cell = match inspection.die(x, y) {
                None => ' ',
                Some(die) => match die.defect_count() {
                    0 => '.',
                    n @ 1..=9 => char::from_digit(n as u32, 10).unwrap_or('9'),
                    _ => '#',
                },
            };
            out.push(cell);
        }
        out.push('\n');
    }
    out
}

fn output_reports(reports: &[InspectionReport], format: &OutputFormat) {
    match format {
        OutputFormat::Human => output_human(reports),
        OutputFormat::Json => output_json(reports),
    }
}

fn output_human(reports: &[InspectionReport]) {
    for report in reports {
        println!("\nFile: {}", report.file.display());
        println!("{}", "─".repeat(60));
        println!("  Lot:                {}", report.inspection.lot_id);
        println!("  Wafer:              {}", report.inspection.wafer_id);
        if let Some(status) = &report.inspection.wafer_status {
            println!("  Status:             {}", status);
        }
        println!("  Defects:            {}", report.stats.defect_count);
        println!("  Dies:               {}", report.stats.die_count);
        println!("  Defective dies:     {}", report.stats.defective_die_count);
        println!("  Max defects/die:    {}", report.stats.max_defects_per_die);
        println!("  Classes used:       {}", report.stats.classes_used);
        if report.stats.unclassified_defects > 0 {
            println!(
                "  Unclassified:       {}",
                report.stats.unclassified_defects
            );
        }

        if report.has_mismatches() {
            println!("\n  Summary disagrees with parsed data:");
            for mismatch in &report.mismatches {
                println!(
                    "    - {}: file says {}, data says {}",
                    mismatch.field, mismatch.declared, mismatch.computed
                );
            }
        }
    }
}

fn output_json(reports: &[InspectionReport]) {
    let output = serde_json::json!({
        "results": reports.iter().map(|r| {
            serde_json::json!({
                "file": r.file.display().to_string(),
                "lot": r.inspection.lot_id,
                "wafer": r.inspection.wafer_id,
                "status": r.inspection.wafer_status,
                "stats": r.stats,
                "mismatches": r.mismatches,
            })
        }).collect::<Vec<_>>(),
        "summary": {
            "total_files": reports.len(),
            "total_defects": reports.iter().map(|r| r.stats.defect_count).sum::<usize>(),
            "files_with_mismatches": reports.iter().filter(|r| r.has_mismatches()).count(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

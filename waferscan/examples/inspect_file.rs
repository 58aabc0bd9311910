//! Inspect a KLARF file: parse it, build the die map, print a summary.

use std::path::Path;

use waferscan::prelude::*;

fn main() -> Result<(), WaferScanError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/valid_inspection.klarf".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example inspect_file [path/to/file.klarf]");
        std::process::exit(1);
    }

    let report = WaferScanCore::load_inspection(path, LoadOptions::default())?;

    println!("Inspection: {}", report.file.display());
    println!("Lot:        {}", report.inspection.lot_id);
    println!("Wafer:      {}", report.inspection.wafer_id);
    println!("Defects:    {}", report.stats.defect_count);
    println!("Dies:       {}", report.stats.die_count);
    println!("Defective:  {}", report.stats.defective_die_count);
    println!("Max/die:    {}", report.stats.max_defects_per_die);

    if report.has_mismatches() {
        println!("\nSummary disagrees with parsed data:");
        for mismatch in &report.mismatches {
            println!(
                "  {}: file says {}, data says {}",
                mismatch.field, mismatch.declared, mismatch.computed
            );
        }
        std::process::exit(1);
    }

    println!("\nSummary row matches parsed data.");
    Ok(())
}

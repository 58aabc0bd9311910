//! WaferScan - KLARF wafer-inspection result parsing library
//!
//! This library parses the KLARF-style semicolon-terminated result files
//! produced by wafer inspection tools and reconstructs the wafer's die grid
//! from the recorded geometry, bucketing defects into dies.
//!
//! # Quick Start
//!
//! ```no_run
//! use waferscan::{WaferScanCore, LoadOptions};
//! use std::path::Path;
//!
//! let options = LoadOptions::default();
//! let report = WaferScanCore::load_inspection(
//!     Path::new("wafer01.klarf"),
//!     options,
//! ).unwrap();
//!
//! println!("{} defects on {} dies", report.stats.defect_count, report.stats.die_count);
//! for mismatch in &report.mismatches {
//!     println!("{}: file says {}, data says {}", mismatch.field, mismatch.declared, mismatch.computed);
//! }
//! ```
//!
//! # Features
//!
//! - **KLARF parsing**: header records, class lookup, sample test plan,
//!   self-describing defect records, summary rows
//! - **Die-map reconstruction**: circularly-clipped die grid derived from
//!   wafer diameter, die pitch and sample centre
//! - **Summary verification**: recomputed counts diffed against the file's
//!   own summary row
//! - **Round-trip**: `Inspection` re-serializes to KLARF text via `Display`

pub mod analyzer;
pub mod core;
pub mod parser;

// Re-export main types
pub use crate::core::{
    discover_klarf_files, InspectionReport, LoadOptions, WaferScanCore, WaferScanError,
};
pub use analyzer::die_map::DieMapBuilder;
pub use analyzer::stats::{compute_stats, verify_summary, InspectionStats, SummaryMismatch};
pub use parser::klarf::{detect_format, KlarfParseError, KlarfParser, KlarfVersion};
pub use parser::record_spec::{RecordSchema, RecordSpecError};
pub use parser::schema::{
    Defect, DefectBuilder, DefectClass, Die, Inspection, Point, SamplePoint, SampleSize, SetupId,
    SummaryRow,
};

/// Parse an inspection file (convenience wrapper).
///
/// `Ok(None)` means the file is not a recognized KLARF result file.
pub fn parse_inspection(
    path: &std::path::Path,
) -> Result<Option<Inspection>, WaferScanError> {
    KlarfParser::parse_klarf(path).map_err(|e| WaferScanError::Parse(e.to_string()))
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Inspection, InspectionReport, InspectionStats, LoadOptions, WaferScanCore, WaferScanError,
    };
}

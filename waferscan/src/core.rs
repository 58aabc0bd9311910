//! Core loading logic shared by library consumers and the CLI.
//! No terminal or output-format dependencies.

use std::path::{Path, PathBuf};

use crate::analyzer::stats::{compute_stats, verify_summary, InspectionStats, SummaryMismatch};
use crate::parser::klarf::{KlarfParser, KlarfParseError};
use crate::parser::schema::Inspection;

#[derive(Debug, thiserror::Error)]
pub enum WaferScanError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Not a KLARF result file: {}", .0.display())]
    UnrecognizedFormat(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<KlarfParseError> for WaferScanError {
    fn from(e: KlarfParseError) -> Self {
        WaferScanError::Parse(e.to_string())
    }
}

/// Options for loading inspections (CLI or library).
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Build the die map after parsing.
    pub build_die_map: bool,
    /// Diff the file's summary row against recomputed counts.
    pub verify_summary: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            build_die_map: true,
            verify_summary: true,
        }
    }
}

/// Per-file load result with derived statistics.
#[derive(Debug, Clone)]
pub struct InspectionReport {
    pub file: PathBuf,
    pub inspection: Inspection,
    pub stats: InspectionStats,
    pub mismatches: Vec<SummaryMismatch>,
}

impl InspectionReport {
    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }
}

/// Recursively discover KLARF result files in a directory.
pub fn discover_klarf_files(dir: &Path) -> Result<Vec<PathBuf>, WaferScanError> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> Result<(), WaferScanError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "target" || name == "build" {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() {
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                match ext {
                    "klarf" | "kla" | "001" => files.push(path),
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Core loading API used by both library consumers and the CLI.
pub struct WaferScanCore;

impl WaferScanCore {
    /// Load a single inspection result file.
    pub fn load_inspection(
        path: &Path,
        options: LoadOptions,
    ) -> Result<InspectionReport, WaferScanError> {
        let mut inspection = KlarfParser::parse_klarf(path)?
            .ok_or_else(|| WaferScanError::UnrecognizedFormat(path.to_path_buf()))?;

        if options.build_die_map {
            inspection.build_die_map();
        }
        let stats = compute_stats(&inspection);
        let mismatches = if options.verify_summary {
            verify_summary(&inspection)
        } else {
            Vec::new()
        };

        Ok(InspectionReport {
            file: path.to_path_buf(),
            inspection,
            stats,
            mismatches,
        })
    }

    /// Load every KLARF file in a directory (one lot's worth of results).
    pub fn load_lot(
        dir: &Path,
        options: LoadOptions,
    ) -> Result<Vec<InspectionReport>, WaferScanError> {
        let files = discover_klarf_files(dir)?;
        let mut reports = Vec::new();
        for path in files {
            reports.push(Self::load_inspection(&path, options.clone())?);
        }
        Ok(reports)
    }
}

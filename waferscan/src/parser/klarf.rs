//! KLARF result file parser.
//!
//! KLARF is a line-oriented, semicolon-terminated text format produced by
//! wafer inspection tools. Header records are fixed-format and may appear in
//! any order; the one ordering rule is that `DefectRecordSpec` must precede
//! the defect data rows, because it declares the columns those rows carry.
//!
//! Key format details:
//! - Geometry values (die pitch, relative positions, sizes) are micrometres
//! - Timestamps are `MM-dd-yy HH:mm:ss`
//! - List sections (`ClassLookup`, `SampleTestPlan`, `DefectList`,
//!   `SummaryList`) put one row per line, the last row ending with `;`

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::error;

use crate::parser::record_spec::{RecordSchema, RecordSpecError};
use crate::parser::schema::{
    DefectClass, Inspection, Point, SamplePoint, SampleSize, SetupId, SummaryRow,
    KLARF_TIMESTAMP_FORMAT,
};

/// Error type for KLARF parsing.
///
/// Only structural failures are errors: a timestamp that does not match the
/// fixed format, or a defect record spec that cannot be compiled. Everything
/// else in the file body is handled best-effort.
#[derive(Debug, Error)]
pub enum KlarfParseError {
    #[error("invalid timestamp '{value}' in {record} record")]
    Timestamp { record: &'static str, value: String },
    #[error(transparent)]
    RecordSpec(#[from] RecordSpecError),
}

/// KLARF file format version, from the `FileVersion` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KlarfVersion {
    pub major: u32,
    pub minor: u32,
}

/// Detect whether `content` is a KLARF result file.
///
/// The signature is a `FileVersion` record on the first non-blank line.
/// Returns the declared version, defaulting to 1.0 when the record carries
/// no usable numbers.
pub fn detect_format(content: &str) -> Option<KlarfVersion> {
    let first = content.lines().find(|l| !l.trim().is_empty())?;
    let rest = first.trim().strip_prefix("FileVersion")?;

    let mut tokens = rest.trim_end_matches(';').split_whitespace();
    let major = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(1);
    let minor = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0);
    Some(KlarfVersion { major, minor })
}

/// Parser for KLARF wafer-inspection result files.
pub struct KlarfParser;

impl KlarfParser {
    /// Parse a KLARF file from disk.
    ///
    /// `Ok(None)` means the file is unreadable or not a recognized KLARF
    /// file; `Err` is reserved for structural errors inside a recognized
    /// file (malformed timestamps, unusable record spec).
    pub fn parse_klarf(path: &Path) -> Result<Option<Inspection>, KlarfParseError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!(path = %path.display(), "failed to read inspection file: {e}");
                return Ok(None);
            }
        };
        Self::parse_klarf_str(&content)
    }

    /// Parse KLARF content from a string.
    pub fn parse_klarf_str(content: &str) -> Result<Option<Inspection>, KlarfParseError> {
        if detect_format(content).is_none() {
            return Ok(None);
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut idx = 0;
        let mut inspection = Inspection::default();
        let mut schema: Option<RecordSchema> = None;

        while idx < lines.len() {
            let line = lines[idx].trim();
            if line.is_empty() {
                idx += 1;
                continue;
            }
            let closed = line.ends_with(';');
            let record = line.trim_end_matches(';').trim_end();
            let keyword = record.split_whitespace().next().unwrap_or("");

            match keyword {
                "FileVersion" => {
                    inspection.file_version = rest_after(record, keyword).to_string();
                }
                "FileTimestamp" => {
                    inspection.file_timestamp =
                        Some(parse_timestamp("FileTimestamp", rest_after(record, keyword))?);
                }
                "InspectionStationID" => {
                    inspection.inspection_station_id = quoted_values(rest_after(record, keyword));
                }
                "SampleType" => {
                    inspection.sample_type = unquote(rest_after(record, keyword));
                }
                "ResultTimestamp" => {
                    inspection.result_timestamp =
                        Some(parse_timestamp("ResultTimestamp", rest_after(record, keyword))?);
                }
                "LotID" => {
                    inspection.lot_id = unquote(rest_after(record, keyword));
                }
                "SampleSize" => {
                    if let Some(size) = parse_sample_size(rest_after(record, keyword)) {
                        inspection.sample_size = size;
                    }
                }
                "SetupID" => {
                    inspection.setup_id = Some(parse_setup_id(rest_after(record, keyword))?);
                }
                "StepID" => {
                    inspection.step_id = unquote(rest_after(record, keyword));
                }
                "SampleOrientationMarkType" => {
                    inspection.orientation_mark_type = unquote(rest_after(record, keyword));
                }
                "OrientationMarkLocation" => {
                    inspection.orientation_mark_location = unquote(rest_after(record, keyword));
                }
                "DiePitch" => {
                    if let Some(pitch) = parse_point(rest_after(record, keyword)) {
                        inspection.die_pitch = pitch;
                    }
                }
                "DieOrigin" => {
                    if let Some(origin) = parse_point(rest_after(record, keyword)) {
                        inspection.die_origin = origin;
                    }
                }
                "WaferID" => {
                    inspection.wafer_id = unquote(rest_after(record, keyword));
                }
                "Slot" => {
                    inspection.slot = rest_after(record, keyword).parse().ok();
                }
                "SampleCenterLocation" => {
                    if let Some(center) = parse_point(rest_after(record, keyword)) {
                        inspection.sample_center_location = center;
                    }
                }
                "ClassLookup" => {
                    let count = first_number(rest_after(record, keyword));
                    idx += 1;
                    if !closed {
                        Self::parse_class_lookup(&lines, &mut idx, count, &mut inspection);
                    }
                    continue;
                }
                "InspectionTest" => {
                    inspection.inspection_test = rest_after(record, keyword).parse().ok();
                }
                "SampleTestPlan" => {
                    let count = first_number(rest_after(record, keyword));
                    idx += 1;
                    if !closed {
                        Self::parse_sample_test_plan(&lines, &mut idx, count, &mut inspection);
                    }
                    continue;
                }
                "AreaPerTest" => {
                    inspection.area_per_test = rest_after(record, keyword).parse().ok();
                }
                "DefectRecordSpec" => {
                    let names: Vec<String> = rest_after(record, keyword)
                        .split_whitespace()
                        .skip(1) // leading column count
                        .map(str::to_string)
                        .collect();
                    inspection.record_fields = names.clone();
                    schema = Some(RecordSchema::compile(&names)?);
                }
                "DefectList" => {
                    // data rows follow; they are handled by the fallthrough
                    // arm once the record spec is known
                }
                "SummarySpec" => {
                    inspection.summary_fields = rest_after(record, keyword)
                        .split_whitespace()
                        .skip(1)
                        .map(str::to_string)
                        .collect();
                }
                "SummaryList" => {
                    idx += 1;
                    if !closed {
                        Self::parse_summary_list(&lines, &mut idx, &mut inspection);
                    }
                    continue;
                }
                "WaferStatus" => {
                    inspection.wafer_status = Some(unquote(rest_after(record, keyword)));
                }
                "EndOfFile" => break,
                _ => {
                    // once the record spec is known, any line may be a
                    // defect data row; everything else is skipped
                    if let Some(schema) = &schema {
                        if let Some(defect) = schema.decode(line) {
                            inspection.defects.push(defect);
                        }
                    }
                }
            }

            idx += 1;
        }

        Ok(Some(inspection))
    }

    /// Read `ClassLookup` rows (`<id> "<name>"`) until the count is met or
    /// a row closes the section with `;`.
    fn parse_class_lookup(
        lines: &[&str],
        idx: &mut usize,
        count: usize,
        inspection: &mut Inspection,
    ) {
        let mut read = 0;
        while *idx < lines.len() && read < count {
            let line = lines[*idx].trim();
            let closed = line.ends_with(';');
            let row = line.trim_end_matches(';').trim_end();
            if !row.is_empty() {
                let mut parts = row.splitn(2, char::is_whitespace);
                if let Some(id) = parts.next().and_then(|t| t.parse::<u32>().ok()) {
                    let name = parts.next().map(unquote).unwrap_or_default();
                    inspection.class_lookup.push(DefectClass {
                        id,
                        name,
                        used: false,
                    });
                    read += 1;
                }
            }
            *idx += 1;
            if closed {
                break;
            }
        }
    }

    /// Read `SampleTestPlan` rows (`<x> <y>`).
    fn parse_sample_test_plan(
        lines: &[&str],
        idx: &mut usize,
        count: usize,
        inspection: &mut Inspection,
    ) {
        let mut read = 0;
        while *idx < lines.len() && read < count {
            let line = lines[*idx].trim();
            let closed = line.ends_with(';');
            let row = line.trim_end_matches(';').trim_end();
            if !row.is_empty() {
                let mut tokens = row.split_whitespace();
                let x = tokens.next().and_then(|t| t.parse::<i64>().ok());
                let y = tokens.next().and_then(|t| t.parse::<i64>().ok());
                if let (Some(x), Some(y)) = (x, y) {
                    inspection.sample_test_plan.push(SamplePoint { x, y });
                    read += 1;
                }
            }
            *idx += 1;
            if closed {
                break;
            }
        }
    }

    /// Read the `SummaryList` row(s); the first parsable row wins.
    fn parse_summary_list(lines: &[&str], idx: &mut usize, inspection: &mut Inspection) {
        while *idx < lines.len() {
            let line = lines[*idx].trim();
            let closed = line.ends_with(';');
            let row = line.trim_end_matches(';').trim_end();
            if inspection.summary.is_none() {
                inspection.summary = parse_summary_row(row);
            }
            *idx += 1;
            if closed {
                break;
            }
        }
    }
}

fn rest_after<'a>(record: &'a str, keyword: &str) -> &'a str {
    record[keyword.len()..].trim()
}

fn parse_timestamp(record: &'static str, value: &str) -> Result<NaiveDateTime, KlarfParseError> {
    NaiveDateTime::parse_from_str(value.trim(), KLARF_TIMESTAMP_FORMAT).map_err(|_| {
        KlarfParseError::Timestamp {
            record,
            value: value.trim().to_string(),
        }
    })
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Collect every double-quoted value on the line.
fn quoted_values(value: &str) -> Vec<String> {
    value
        .split('"')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}

fn first_number(value: &str) -> usize {
    value
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .unwrap_or(0)
}

fn parse_point(value: &str) -> Option<Point> {
    let mut tokens = value.split_whitespace();
    let x = tokens.next()?.parse().ok()?;
    let y = tokens.next()?.parse().ok()?;
    Some(Point { x, y })
}

fn parse_sample_size(value: &str) -> Option<SampleSize> {
    let mut tokens = value.split_whitespace();
    let order = tokens.next()?.parse().ok()?;
    let diameter_mm = tokens.next()?.parse().ok()?;
    Some(SampleSize { order, diameter_mm })
}

fn parse_setup_id(value: &str) -> Result<SetupId, KlarfParseError> {
    let value = value.trim();
    let (name, remainder) = if let Some(stripped) = value.strip_prefix('"') {
        match stripped.find('"') {
            Some(end) => (stripped[..end].to_string(), stripped[end + 1..].trim()),
            None => (stripped.to_string(), ""),
        }
    } else {
        match value.split_once(char::is_whitespace) {
            Some((name, rest)) => (name.to_string(), rest.trim()),
            None => (value.to_string(), ""),
        }
    };

    let timestamp = if remainder.is_empty() {
        None
    } else {
        Some(parse_timestamp("SetupID", remainder)?)
    };
    Ok(SetupId { name, timestamp })
}

fn parse_summary_row(row: &str) -> Option<SummaryRow> {
    let mut tokens = row.split_whitespace();
    let test = tokens.next()?.parse().ok()?;
    let defect_count = tokens.next()?.parse().ok()?;
    let defect_density = tokens.next()?.parse().ok()?;
    let die_count = tokens.next()?.parse().ok()?;
    let defective_die_count = tokens.next()?.parse().ok()?;
    Some(SummaryRow {
        test,
        defect_count,
        defect_density,
        die_count,
        defective_die_count,
    })
}

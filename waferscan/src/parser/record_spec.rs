//! Runtime schema for the self-describing defect record format.
//!
//! A `DefectRecordSpec` header declares which named columns appear in each
//! defect data row and in what order; the layout is not fixed across files.
//! This module turns that declaration into a single compiled pattern plus an
//! ordered field list with per-field capture-group offsets, so data rows are
//! decoded generically whatever columns the file actually carries.

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::parser::schema::{Defect, DefectBuilder};

#[derive(Debug, Error)]
pub enum RecordSpecError {
    #[error("defect record spec declares no known columns")]
    NoKnownFields,
    #[error("failed to compile defect record pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Shape of the value in one defect record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Double,
    /// Double that may carry an exponent, e.g. `9.6e-1`. Two capture
    /// groups: mantissa and exponent.
    SciDouble,
    /// Whitespace-separated filename list; may be empty.
    FileList,
}

impl FieldKind {
    fn pattern(self) -> &'static str {
        match self {
            FieldKind::Integer => r"(-?\d+)",
            FieldKind::Double => r"(-?\d+(?:\.\d+)?)",
            FieldKind::SciDouble => r"(-?\d+(?:\.\d+)?)(?:[eE]([-+]?\d+))?",
            FieldKind::FileList => r"((?:\S+\s*)*)",
        }
    }

    fn group_count(self) -> usize {
        match self {
            FieldKind::SciDouble => 2,
            _ => 1,
        }
    }
}

/// Columns the decoder knows how to route into a [`DefectBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    DefectId,
    XRel,
    YRel,
    XIndex,
    YIndex,
    XSize,
    YSize,
    DefectArea,
    DSize,
    ClassNumber,
    RoughBinNumber,
    FineBinNumber,
    Test,
    ClusterNumber,
    ImageCount,
    ImageList,
}

/// Map a declared column name to its identifier and value shape.
pub(crate) fn known_field(name: &str) -> Option<(FieldId, FieldKind)> {
    Some(match name {
        "DEFECTID" => (FieldId::DefectId, FieldKind::Integer),
        "XREL" => (FieldId::XRel, FieldKind::Double),
        "YREL" => (FieldId::YRel, FieldKind::Double),
        "XINDEX" => (FieldId::XIndex, FieldKind::Integer),
        "YINDEX" => (FieldId::YIndex, FieldKind::Integer),
        "XSIZE" => (FieldId::XSize, FieldKind::Double),
        "YSIZE" => (FieldId::YSize, FieldKind::Double),
        "DEFECTAREA" => (FieldId::DefectArea, FieldKind::SciDouble),
        "DSIZE" => (FieldId::DSize, FieldKind::SciDouble),
        "CLASSNUMBER" => (FieldId::ClassNumber, FieldKind::Integer),
        "ROUGHBINNUMBER" => (FieldId::RoughBinNumber, FieldKind::Integer),
        "FINEBINNUMBER" => (FieldId::FineBinNumber, FieldKind::Integer),
        "TEST" => (FieldId::Test, FieldKind::Integer),
        "CLUSTERNUMBER" => (FieldId::ClusterNumber, FieldKind::Integer),
        "IMAGECOUNT" => (FieldId::ImageCount, FieldKind::Integer),
        "IMAGELIST" => (FieldId::ImageList, FieldKind::FileList),
        _ => return None,
    })
}

#[derive(Debug, Clone)]
struct RecordField {
    id: FieldId,
    kind: FieldKind,
    /// 1-based capture group of this field's first group in the composite
    /// pattern. SciDouble fields also own group + 1 (the exponent).
    group: usize,
}

/// Compiled schema for one file's defect records.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    fields: Vec<RecordField>,
    declared: Vec<String>,
    pattern: Regex,
}

impl RecordSchema {
    /// Compile the declared column list into a composite pattern.
    ///
    /// Fields keep their declared order; unknown names are skipped with a
    /// warning. Rows containing unknown columns will then fail to match and
    /// are skipped like any other unrecognized line.
    pub fn compile(names: &[String]) -> Result<Self, RecordSpecError> {
        let mut fields = Vec::new();
        let mut pattern = String::from(r"^\s*");
        let mut group = 1usize;

        for name in names {
            let canonical = name.to_ascii_uppercase();
            let Some((id, kind)) = known_field(&canonical) else {
                warn!(column = %name, "ignoring unknown defect record column");
                continue;
            };
            if !fields.is_empty() {
                // the filename list swallows its own leading whitespace and
                // may be empty, so it must not demand a separator
                pattern.push_str(if kind == FieldKind::FileList {
                    r"\s*"
                } else {
                    r"\s+"
                });
            }
            pattern.push_str(kind.pattern());
            fields.push(RecordField { id, kind, group });
            group += kind.group_count();
        }

        if fields.is_empty() {
            return Err(RecordSpecError::NoKnownFields);
        }
        pattern.push_str(r"\s*$");

        Ok(Self {
            fields,
            declared: names.to_vec(),
            pattern: Regex::new(&pattern)?,
        })
    }

    /// Column names exactly as the file declared them.
    pub fn declared_fields(&self) -> &[String] {
        &self.declared
    }

    /// Decode one data row into a [`Defect`].
    ///
    /// Returns `None` when the row does not match the schema; only declared
    /// columns are populated, everything else keeps the builder defaults.
    pub fn decode(&self, line: &str) -> Option<Defect> {
        let row = line.trim().trim_end_matches(';').trim_end();
        if row.is_empty() {
            return None;
        }
        let caps = self.pattern.captures(row)?;

        let mut builder = DefectBuilder::new();
        for field in &self.fields {
            match field.kind {
                FieldKind::Integer => {
                    let v: i64 = caps.get(field.group)?.as_str().parse().ok()?;
                    apply_integer(&mut builder, field.id, v);
                }
                FieldKind::Double => {
                    let v: f64 = caps.get(field.group)?.as_str().parse().ok()?;
                    apply_double(&mut builder, field.id, v);
                }
                FieldKind::SciDouble => {
                    let mantissa: f64 = caps.get(field.group)?.as_str().parse().ok()?;
                    let exponent: i32 = caps
                        .get(field.group + 1)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0);
                    apply_double(&mut builder, field.id, mantissa * 10f64.powi(exponent));
                }
                FieldKind::FileList => {
                    let list = caps.get(field.group).map(|m| m.as_str()).unwrap_or("");
                    builder.images(list.split_whitespace().map(str::to_string).collect());
                }
            }
        }
        Some(builder.build())
    }
}

fn apply_integer(builder: &mut DefectBuilder, id: FieldId, value: i64) {
    match id {
        FieldId::DefectId => builder.id(value),
        FieldId::XIndex => builder.index_x(value as i32),
        FieldId::YIndex => builder.index_y(value as i32),
        FieldId::ClassNumber => builder.class_number(value as u32),
        FieldId::RoughBinNumber => builder.rough_bin(value as u32),
        FieldId::FineBinNumber => builder.fine_bin(value as u32),
        FieldId::Test => builder.test(value as u32),
        FieldId::ClusterNumber => builder.cluster_number(value as u32),
        // the image list carries its own length
        FieldId::ImageCount => {}
        _ => {}
    }
}

fn apply_double(builder: &mut DefectBuilder, id: FieldId, value: f64) {
    match id {
        FieldId::XRel => builder.x_rel(value),
        FieldId::YRel => builder.y_rel(value),
        FieldId::XSize => builder.size_x(value),
        FieldId::YSize => builder.size_y(value),
        FieldId::DefectArea => builder.area(value),
        FieldId::DSize => builder.size_d(value),
        _ => {}
    }
}

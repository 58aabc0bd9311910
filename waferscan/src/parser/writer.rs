//! Re-serialization of an [`Inspection`] back into KLARF text.
//!
//! Output follows the canonical section ordering (`FileVersion` through
//! `EndOfFile`). Numeric formatting may differ from the source file in
//! trailing precision; parsing the output yields a semantically equal
//! aggregate.

use std::fmt;

use crate::parser::record_spec::known_field;
use crate::parser::schema::{Defect, Inspection, KLARF_TIMESTAMP_FORMAT, UM_PER_MM};

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_klarf(self, f)
    }
}

fn write_klarf(inspection: &Inspection, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let version = if inspection.file_version.is_empty() {
        "1 0"
    } else {
        inspection.file_version.as_str()
    };
    writeln!(f, "FileVersion {};", version)?;

    if let Some(ts) = &inspection.file_timestamp {
        writeln!(f, "FileTimestamp {};", ts.format(KLARF_TIMESTAMP_FORMAT))?;
    }
    if !inspection.inspection_station_id.is_empty() {
        let quoted: Vec<String> = inspection
            .inspection_station_id
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect();
        writeln!(f, "InspectionStationID {};", quoted.join(" "))?;
    }
    if !inspection.sample_type.is_empty() {
        writeln!(f, "SampleType {};", inspection.sample_type)?;
    }
    if let Some(ts) = &inspection.result_timestamp {
        writeln!(f, "ResultTimestamp {};", ts.format(KLARF_TIMESTAMP_FORMAT))?;
    }
    if !inspection.lot_id.is_empty() {
        writeln!(f, "LotID \"{}\";", inspection.lot_id)?;
    }
    if inspection.sample_size.diameter_mm > 0.0 {
        writeln!(
            f,
            "SampleSize {} {};",
            inspection.sample_size.order,
            fmt_num(inspection.sample_size.diameter_mm)
        )?;
    }
    if let Some(setup) = &inspection.setup_id {
        match &setup.timestamp {
            Some(ts) => writeln!(
                f,
                "SetupID \"{}\" {};",
                setup.name,
                ts.format(KLARF_TIMESTAMP_FORMAT)
            )?,
            None => writeln!(f, "SetupID \"{}\";", setup.name)?,
        }
    }
    if !inspection.step_id.is_empty() {
        writeln!(f, "StepID \"{}\";", inspection.step_id)?;
    }
    if !inspection.orientation_mark_type.is_empty() {
        writeln!(
            f,
            "SampleOrientationMarkType {};",
            inspection.orientation_mark_type
        )?;
    }
    if !inspection.orientation_mark_location.is_empty() {
        writeln!(
            f,
            "OrientationMarkLocation {};",
            inspection.orientation_mark_location
        )?;
    }
    if inspection.die_pitch.x > 0.0 || inspection.die_pitch.y > 0.0 {
        writeln!(
            f,
            "DiePitch {} {};",
            fmt_num(inspection.die_pitch.x),
            fmt_num(inspection.die_pitch.y)
        )?;
    }
    writeln!(
        f,
        "DieOrigin {} {};",
        fmt_num(inspection.die_origin.x),
        fmt_num(inspection.die_origin.y)
    )?;
    if !inspection.wafer_id.is_empty() {
        writeln!(f, "WaferID \"{}\";", inspection.wafer_id)?;
    }
    if let Some(slot) = inspection.slot {
        writeln!(f, "Slot {};", slot)?;
    }
    writeln!(
        f,
        "SampleCenterLocation {} {};",
        fmt_num(inspection.sample_center_location.x),
        fmt_num(inspection.sample_center_location.y)
    )?;

    if !inspection.class_lookup.is_empty() {
        writeln!(f, "ClassLookup {}", inspection.class_lookup.len())?;
        for (i, class) in inspection.class_lookup.iter().enumerate() {
            let terminator = terminator(i, inspection.class_lookup.len());
            writeln!(f, " {} \"{}\"{}", class.id, class.name, terminator)?;
        }
    }
    if let Some(test) = inspection.inspection_test {
        writeln!(f, "InspectionTest {};", test)?;
    }
    if !inspection.sample_test_plan.is_empty() {
        writeln!(f, "SampleTestPlan {}", inspection.sample_test_plan.len())?;
        for (i, point) in inspection.sample_test_plan.iter().enumerate() {
            let terminator = terminator(i, inspection.sample_test_plan.len());
            writeln!(f, " {} {}{}", point.x, point.y, terminator)?;
        }
    }
    if let Some(area) = inspection.area_per_test {
        writeln!(f, "AreaPerTest {};", fmt_num(area))?;
    }

    // only columns the decoder understands can be regenerated
    let columns: Vec<&String> = inspection
        .record_fields
        .iter()
        .filter(|name| known_field(&name.to_ascii_uppercase()).is_some())
        .collect();
    if !columns.is_empty() {
        let names: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
        writeln!(f, "DefectRecordSpec {} {} ;", names.len(), names.join(" "))?;
        writeln!(f, "DefectList")?;
        for (i, defect) in inspection.defects.iter().enumerate() {
            let row: Vec<String> = names
                .iter()
                .map(|name| defect_field_value(defect, name))
                .collect();
            let terminator = terminator(i, inspection.defects.len());
            writeln!(f, " {}{}", row.join(" "), terminator)?;
        }
        if inspection.defects.is_empty() {
            writeln!(f, ";")?;
        }
    }

    if !inspection.summary_fields.is_empty() {
        writeln!(
            f,
            "SummarySpec {} {} ;",
            inspection.summary_fields.len(),
            inspection.summary_fields.join(" ")
        )?;
    }
    if let Some(summary) = &inspection.summary {
        writeln!(f, "SummaryList")?;
        writeln!(
            f,
            " {} {} {} {} {};",
            summary.test,
            summary.defect_count,
            fmt_num(summary.defect_density),
            summary.die_count,
            summary.defective_die_count
        )?;
    }
    if let Some(status) = &inspection.wafer_status {
        writeln!(f, "WaferStatus {};", status)?;
    }
    writeln!(f, "EndOfFile;")
}

fn terminator(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        ";"
    } else {
        ""
    }
}

/// Render one defect column back into file units.
fn defect_field_value(defect: &Defect, name: &str) -> String {
    match name.to_ascii_uppercase().as_str() {
        "DEFECTID" => defect.id.to_string(),
        "XREL" => fmt_num(defect.x_rel * UM_PER_MM),
        "YREL" => fmt_num(defect.y_rel * UM_PER_MM),
        "XINDEX" => defect.index_x.to_string(),
        "YINDEX" => defect.index_y.to_string(),
        "XSIZE" => fmt_num(defect.size_x * UM_PER_MM),
        "YSIZE" => fmt_num(defect.size_y * UM_PER_MM),
        "DEFECTAREA" => fmt_num(defect.area * UM_PER_MM),
        "DSIZE" => fmt_num(defect.size_d * UM_PER_MM),
        "CLASSNUMBER" => defect.class_number.to_string(),
        "ROUGHBINNUMBER" => defect.rough_bin.to_string(),
        "FINEBINNUMBER" => defect.fine_bin.to_string(),
        "TEST" => defect.test.to_string(),
        "CLUSTERNUMBER" => defect.cluster_number.to_string(),
        "IMAGECOUNT" => defect.images.len().to_string(),
        "IMAGELIST" => defect.images.join(" "),
        _ => String::new(),
    }
}

/// Fixed-precision decimal with trailing zeros trimmed.
fn fmt_num(value: f64) -> String {
    let mut s = format!("{:.6}", value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

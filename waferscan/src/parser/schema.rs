use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used by every dated record in a KLARF file.
pub const KLARF_TIMESTAMP_FORMAT: &str = "%m-%d-%y %H:%M:%S";

/// Micrometres per millimetre; file geometry fields are micrometres.
pub(crate) const UM_PER_MM: f64 = 1000.0;

/// A coordinate pair in file units (micrometres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// `SampleSize` record: shape order and wafer diameter in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSize {
    pub order: u32,
    pub diameter_mm: f64,
}

/// `SetupID` record: recipe name plus the time it was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupId {
    pub name: String,
    pub timestamp: Option<NaiveDateTime>,
}

/// One `ClassLookup` row: classification id and display name.
///
/// `used` is derived data, set during die-map construction when at least one
/// parsed defect carries this class id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectClass {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub used: bool,
}

/// One `SampleTestPlan` row: die coordinates scheduled for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: i64,
    pub y: i64,
}

/// One `SummaryList` row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub test: u32,
    pub defect_count: u64,
    pub defect_density: f64,
    pub die_count: u64,
    pub defective_die_count: u64,
}

/// One inspected anomaly, located relative to its die's origin.
///
/// Geometry fields are millimetres (converted from the file's micrometres by
/// [`DefectBuilder::build`]). Identity fields never change after
/// construction; only the absolute position (assigned during die-map
/// construction) and image metadata are updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub id: i64,
    pub x_rel: f64,
    pub y_rel: f64,
    pub index_x: i32,
    pub index_y: i32,
    pub size_x: f64,
    pub size_y: f64,
    pub area: f64,
    pub size_d: f64,
    pub class_number: u32,
    pub rough_bin: u32,
    pub fine_bin: u32,
    pub test: u32,
    pub cluster_number: u32,
    pub images: Vec<String>,
    /// Absolute wafer position in mm; 0.0 until a die map assigns it.
    #[serde(default)]
    pub x_abs: f64,
    #[serde(default)]
    pub y_abs: f64,
}

/// Staged constructor for [`Defect`], driven by the defect record decoder.
///
/// Holds raw file-unit (micrometre) values. Geometry fields default to -1.0
/// and counts/classification to 0, so a column absent from the file's
/// `DefectRecordSpec` surfaces as the scaled sentinel after [`build`], never
/// as a silent zero.
///
/// [`build`]: DefectBuilder::build
#[derive(Debug, Clone)]
pub struct DefectBuilder {
    id: i64,
    x_rel: f64,
    y_rel: f64,
    index_x: i32,
    index_y: i32,
    size_x: f64,
    size_y: f64,
    area: f64,
    size_d: f64,
    class_number: u32,
    rough_bin: u32,
    fine_bin: u32,
    test: u32,
    cluster_number: u32,
    images: Vec<String>,
}

impl Default for DefectBuilder {
    fn default() -> Self {
        Self {
            id: 0,
            x_rel: -1.0,
            y_rel: -1.0,
            index_x: 0,
            index_y: 0,
            size_x: -1.0,
            size_y: -1.0,
            area: -1.0,
            size_d: -1.0,
            class_number: 0,
            rough_bin: 0,
            fine_bin: 0,
            test: 0,
            cluster_number: 0,
            images: Vec::new(),
        }
    }
}

impl DefectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self, v: i64) {
        self.id = v;
    }

    pub fn x_rel(&mut self, um: f64) {
        self.x_rel = um;
    }

    pub fn y_rel(&mut self, um: f64) {
        self.y_rel = um;
    }

    pub fn index_x(&mut self, v: i32) {
        self.index_x = v;
    }

    pub fn index_y(&mut self, v: i32) {
        self.index_y = v;
    }

    pub fn size_x(&mut self, um: f64) {
        self.size_x = um;
    }

    pub fn size_y(&mut self, um: f64) {
        self.size_y = um;
    }

    pub fn area(&mut self, um: f64) {
        self.area = um;
    }

    pub fn size_d(&mut self, um: f64) {
        self.size_d = um;
    }

    pub fn class_number(&mut self, v: u32) {
        self.class_number = v;
    }

    pub fn rough_bin(&mut self, v: u32) {
        self.rough_bin = v;
    }

    pub fn fine_bin(&mut self, v: u32) {
        self.fine_bin = v;
    }

    pub fn test(&mut self, v: u32) {
        self.test = v;
    }

    pub fn cluster_number(&mut self, v: u32) {
        self.cluster_number = v;
    }

    pub fn images(&mut self, files: Vec<String>) {
        self.images = files;
    }

    /// Finish the defect, scaling geometry from micrometres to millimetres.
    pub fn build(&self) -> Defect {
        Defect {
            id: self.id,
            x_rel: self.x_rel / UM_PER_MM,
            y_rel: self.y_rel / UM_PER_MM,
            index_x: self.index_x,
            index_y: self.index_y,
            size_x: self.size_x / UM_PER_MM,
            size_y: self.size_y / UM_PER_MM,
            area: self.area / UM_PER_MM,
            size_d: self.size_d / UM_PER_MM,
            class_number: self.class_number,
            rough_bin: self.rough_bin,
            fine_bin: self.fine_bin,
            test: self.test,
            cluster_number: self.cluster_number,
            images: self.images.clone(),
            x_abs: 0.0,
            y_abs: 0.0,
        }
    }
}

/// One rectangular unit cell of the wafer grid.
///
/// Origin and size are millimetres in wafer bounding-box coordinates. The
/// defect bucket is filled once per die-map build and is never shared
/// between dies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Die {
    pub index_x: i32,
    pub index_y: i32,
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
    pub defects: Vec<Defect>,
    pub visible: bool,
}

impl Die {
    /// Map key for this die: `"indexX/indexY"`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.index_x, self.index_y)
    }

    pub fn defect_count(&self) -> usize {
        self.defects.len()
    }
}

/// A fully parsed inspection result file.
///
/// Header scalars, lookup tables and the flat defect list come straight from
/// the file; `dies` and `max_defects_per_die` are derived by
/// `build_die_map` and must be rebuilt whenever header geometry changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub file_version: String,
    pub file_timestamp: Option<NaiveDateTime>,
    pub inspection_station_id: Vec<String>,
    pub sample_type: String,
    pub result_timestamp: Option<NaiveDateTime>,
    pub lot_id: String,
    pub sample_size: SampleSize,
    pub setup_id: Option<SetupId>,
    pub step_id: String,
    pub orientation_mark_type: String,
    pub orientation_mark_location: String,
    /// Die pitch in micrometres.
    pub die_pitch: Point,
    pub die_origin: Point,
    pub wafer_id: String,
    pub slot: Option<u32>,
    /// Offset of the file coordinate origin from the wafer centre, µm.
    pub sample_center_location: Point,
    pub class_lookup: Vec<DefectClass>,
    pub inspection_test: Option<u32>,
    pub sample_test_plan: Vec<SamplePoint>,
    /// Inspected area per test in square micrometres.
    pub area_per_test: Option<f64>,
    /// Column names declared by `DefectRecordSpec`, in file order.
    pub record_fields: Vec<String>,
    pub defects: Vec<Defect>,
    pub summary_fields: Vec<String>,
    pub summary: Option<SummaryRow>,
    pub wafer_status: Option<String>,
    /// Derived die grid, keyed by `"indexX/indexY"`.
    #[serde(default)]
    pub dies: HashMap<String, Die>,
    #[serde(default)]
    pub max_defects_per_die: usize,
}

impl Inspection {
    /// Die pitch converted to millimetres.
    pub fn die_size_mm(&self) -> (f64, f64) {
        (self.die_pitch.x / UM_PER_MM, self.die_pitch.y / UM_PER_MM)
    }

    /// Look up a die by its grid indices.
    pub fn die(&self, index_x: i32, index_y: i32) -> Option<&Die> {
        self.dies.get(&format!("{}/{}", index_x, index_y))
    }

    /// Number of dies with at least one bucketed defect.
    pub fn defective_die_count(&self) -> usize {
        self.dies.values().filter(|d| !d.defects.is_empty()).count()
    }
}

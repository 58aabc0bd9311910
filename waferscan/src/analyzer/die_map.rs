//! Die-grid reconstruction from wafer geometry.
//!
//! Derives the rectangular, circularly-clipped die grid from the wafer
//! diameter, die pitch and sample centre location, then buckets parsed
//! defects into dies by grid index. The grid is derived data: every build
//! fully recomputes it from the current header fields.

use std::collections::HashMap;

use tracing::warn;

use crate::parser::schema::{Die, Inspection, UM_PER_MM};

/// Builds the die map for an [`Inspection`].
pub struct DieMapBuilder;

impl DieMapBuilder {
    /// Recompute the die grid and defect buckets; returns the maximum
    /// defect count over all dies (0 when no dies qualify).
    ///
    /// Index convention: the x index increases left-to-right starting at
    /// `-dies_min_x`; the y index decreases top-to-bottom starting at
    /// `dies_max_y + 2`. Die `(X, Y)` occupies
    /// `x ∈ [u + X·dw, u + (X+1)·dw]`, `y ∈ [v + (Y−2)·dh, v + (Y−1)·dh]`
    /// where `(u, v)` is the grid origin. Parsed defect indices follow the
    /// same convention, so bucketing is exact index equality.
    pub fn build_die_map(inspection: &mut Inspection) -> usize {
        inspection.dies.clear();
        inspection.max_defects_per_die = 0;
        for class in &mut inspection.class_lookup {
            class.used = false;
        }
        for defect in &mut inspection.defects {
            defect.x_abs = 0.0;
            defect.y_abs = 0.0;
        }

        let diameter = inspection.sample_size.diameter_mm;
        let (die_w, die_h) = inspection.die_size_mm();
        if diameter <= 0.0 || die_w <= 0.0 || die_h <= 0.0 {
            return 0;
        }

        let radius = diameter / 2.0;
        let center_x = inspection.sample_center_location.x / UM_PER_MM;
        let center_y = inspection.sample_center_location.y / UM_PER_MM;
        // grid origin in wafer bounding-box coordinates; the wafer centre
        // sits at (radius, radius)
        let u = radius + center_x;
        let v = radius + center_y;

        // candidate die counts on each side of the grid origin, bounding
        // the scan without testing every integer pair
        let dies_min_x = (u / die_w) as i64;
        let dies_max_x = ((diameter - u) / die_w) as i64;
        let dies_min_y = (v / die_h) as i64;
        let dies_max_y = ((diameter - v) / die_h) as i64;

        let mut dies: HashMap<String, Die> = HashMap::new();
        for step_x in 0..=(dies_min_x + dies_max_x) {
            let index_x = (step_x - dies_min_x) as i32;
            let x0 = u + f64::from(index_x) * die_w;
            for step_y in 0..=(dies_min_y + dies_max_y) {
                let index_y = (dies_max_y + 2 - step_y) as i32;
                let y0 = v + f64::from(index_y - 2) * die_h;
                if !die_within_wafer(x0, y0, die_w, die_h, radius) {
                    continue;
                }
                let die = Die {
                    index_x,
                    index_y,
                    origin_x: x0,
                    origin_y: y0,
                    width: die_w,
                    height: die_h,
                    defects: Vec::new(),
                    visible: true,
                };
                dies.insert(die.label(), die);
            }
        }

        for defect in &inspection.defects {
            match inspection
                .class_lookup
                .iter_mut()
                .find(|c| c.id == defect.class_number)
            {
                Some(class) => class.used = true,
                None => warn!(
                    defect = defect.id,
                    class = defect.class_number,
                    "defect class has no lookup entry; treating as unclassified"
                ),
            }
        }

        let mut max_defects = 0usize;
        for defect in &mut inspection.defects {
            let label = format!("{}/{}", defect.index_x, defect.index_y);
            if let Some(die) = dies.get_mut(&label) {
                defect.x_abs = die_w * f64::from(defect.index_x) + defect.x_rel;
                defect.y_abs = die_h * f64::from(defect.index_y) + defect.y_rel;
                die.defects.push(defect.clone());
            }
        }
        for die in dies.values() {
            max_defects = max_defects.max(die.defects.len());
        }

        inspection.dies = dies;
        inspection.max_defects_per_die = max_defects;
        max_defects
    }
}

/// Conservative inclusion: all four corners must lie within the wafer
/// radius. Edge dies partially outside the circle are excluded, not
/// clipped.
fn die_within_wafer(x0: f64, y0: f64, width: f64, height: f64, radius: f64) -> bool {
    let within = |x: f64, y: f64| {
        let dx = x - radius;
        let dy = y - radius;
        (dx * dx + dy * dy).sqrt() <= radius
    };
    within(x0, y0)
        && within(x0 + width, y0)
        && within(x0, y0 + height)
        && within(x0 + width, y0 + height)
}

impl Inspection {
    /// Rebuild the derived die grid; see [`DieMapBuilder::build_die_map`].
    pub fn build_die_map(&mut self) -> usize {
        DieMapBuilder::build_die_map(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{DefectBuilder, DefectClass, Point, SampleSize};

    /// 20mm wafer with 5mm square dies and a centred grid origin; exactly
    /// four dies fit entirely inside the circle.
    fn small_wafer() -> Inspection {
        Inspection {
            sample_size: SampleSize {
                order: 1,
                diameter_mm: 20.0,
            },
            die_pitch: Point {
                x: 5000.0,
                y: 5000.0,
            },
            ..Default::default()
        }
    }

    fn defect_at(id: i64, index_x: i32, index_y: i32, x_rel_um: f64, y_rel_um: f64) -> crate::parser::schema::Defect {
        let mut builder = DefectBuilder::new();
        builder.id(id);
        builder.index_x(index_x);
        builder.index_y(index_y);
        builder.x_rel(x_rel_um);
        builder.y_rel(y_rel_um);
        builder.build()
    }

    #[test]
    fn test_four_central_dies_qualify() {
        let mut inspection = small_wafer();
        inspection.build_die_map();

        assert_eq!(inspection.dies.len(), 4);
        for label in ["-1/1", "0/1", "-1/2", "0/2"] {
            assert!(inspection.dies.contains_key(label), "missing die {label}");
        }
    }

    #[test]
    fn test_degenerate_geometry_yields_empty_map() {
        let mut inspection = Inspection::default();
        let max = inspection.build_die_map();

        assert_eq!(max, 0);
        assert!(inspection.dies.is_empty());
        assert_eq!(inspection.max_defects_per_die, 0);
    }

    #[test]
    fn test_defects_bucket_by_index() {
        let mut inspection = small_wafer();
        inspection.defects.push(defect_at(1, -1, 1, 10.0, 5.0));
        inspection.defects.push(defect_at(2, -1, 1, 20.0, 5.0));
        inspection.defects.push(defect_at(3, 0, 2, 30.0, 5.0));
        inspection.build_die_map();

        assert_eq!(inspection.dies["-1/1"].defect_count(), 2);
        assert_eq!(inspection.dies["0/2"].defect_count(), 1);
        assert_eq!(inspection.dies["0/1"].defect_count(), 0);
        assert_eq!(inspection.max_defects_per_die, 2);
    }

    #[test]
    fn test_absolute_position_formula() {
        let mut inspection = small_wafer();
        inspection.defects.push(defect_at(1, -1, 1, 10.0, 5.0));
        inspection.build_die_map();

        // die size (5, 5) mm: abs = size * index + rel
        let defect = &inspection.defects[0];
        assert!((defect.x_abs - (5.0 * -1.0 + 0.01)).abs() < 1e-9);
        assert!((defect.y_abs - (5.0 * 1.0 + 0.005)).abs() < 1e-9);

        // the bucketed copy carries the same absolute position
        let copy = &inspection.dies["-1/1"].defects[0];
        assert!((copy.x_abs - defect.x_abs).abs() < 1e-12);
    }

    #[test]
    fn test_unmatched_defect_keeps_sentinel_position() {
        let mut inspection = small_wafer();
        inspection.defects.push(defect_at(1, 50, 50, 10.0, 5.0));
        inspection.build_die_map();

        assert_eq!(inspection.defects.len(), 1);
        assert_eq!(inspection.defects[0].x_abs, 0.0);
        assert_eq!(inspection.defects[0].y_abs, 0.0);
        assert!(inspection.dies.values().all(|d| d.defects.is_empty()));
    }

    #[test]
    fn test_class_marking() {
        let mut inspection = small_wafer();
        inspection.class_lookup.push(DefectClass {
            id: 1,
            name: "Particle".to_string(),
            used: false,
        });
        inspection.class_lookup.push(DefectClass {
            id: 2,
            name: "Scratch".to_string(),
            used: false,
        });
        let mut defect = defect_at(1, -1, 1, 10.0, 5.0);
        defect.class_number = 1;
        inspection.defects.push(defect);
        inspection.build_die_map();

        assert!(inspection.class_lookup[0].used);
        assert!(!inspection.class_lookup[1].used);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut inspection = small_wafer();
        inspection.defects.push(defect_at(1, -1, 1, 10.0, 5.0));

        inspection.build_die_map();
        let first_dies = inspection.dies.clone();
        let first_abs: Vec<(f64, f64)> = inspection
            .defects
            .iter()
            .map(|d| (d.x_abs, d.y_abs))
            .collect();

        inspection.build_die_map();
        let second_abs: Vec<(f64, f64)> = inspection
            .defects
            .iter()
            .map(|d| (d.x_abs, d.y_abs))
            .collect();

        assert_eq!(inspection.dies, first_dies);
        assert_eq!(first_abs, second_abs);
    }
}

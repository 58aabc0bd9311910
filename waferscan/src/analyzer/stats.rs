//! Summary statistics derived from a parsed inspection, and verification of
//! the file's own `SummaryList` row against them.

use serde::Serialize;

use crate::parser::schema::Inspection;

/// Statistics recomputed from the parsed data.
#[derive(Debug, Clone, Serialize)]
pub struct InspectionStats {
    pub defect_count: usize,
    pub die_count: usize,
    pub defective_die_count: usize,
    pub max_defects_per_die: usize,
    /// Defects per cm² of inspected die area; 0 when no dies qualify.
    pub defect_density: f64,
    pub classes_used: usize,
    /// Defects whose class id has no `ClassLookup` entry.
    pub unclassified_defects: usize,
}

/// A disagreement between the file's `SummaryList` row and the values
/// recomputed from the defect list and die map.
///
/// Densities are not diffed: their inspected-area conventions vary by tool,
/// so only exact counts are compared.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryMismatch {
    pub field: &'static str,
    pub declared: u64,
    pub computed: u64,
}

/// Recompute statistics from the current state of `inspection`.
///
/// Die-related fields reflect the die map as last built; call
/// `build_die_map` first for meaningful values.
pub fn compute_stats(inspection: &Inspection) -> InspectionStats {
    let die_count = inspection.dies.len();
    let (die_w, die_h) = inspection.die_size_mm();
    let die_area_cm2 = (die_w / 10.0) * (die_h / 10.0);
    let defect_density = if die_count > 0 && die_area_cm2 > 0.0 {
        inspection.defects.len() as f64 / (die_count as f64 * die_area_cm2)
    } else {
        0.0
    };
    let unclassified_defects = inspection
        .defects
        .iter()
        .filter(|d| !inspection.class_lookup.iter().any(|c| c.id == d.class_number))
        .count();

    InspectionStats {
        defect_count: inspection.defects.len(),
        die_count,
        defective_die_count: inspection.defective_die_count(),
        max_defects_per_die: inspection.max_defects_per_die,
        defect_density,
        classes_used: inspection.class_lookup.iter().filter(|c| c.used).count(),
        unclassified_defects,
    }
}

/// Compare the file's summary row with recomputed counts.
///
/// Returns one entry per disagreeing field; empty when the file carries no
/// summary. Mismatches are findings, never parse errors.
pub fn verify_summary(inspection: &Inspection) -> Vec<SummaryMismatch> {
    let Some(summary) = &inspection.summary else {
        return Vec::new();
    };

    let mut mismatches = Vec::new();
    let defect_count = inspection.defects.len() as u64;
    if summary.defect_count != defect_count {
        mismatches.push(SummaryMismatch {
            field: "NDEFECT",
            declared: summary.defect_count,
            computed: defect_count,
        });
    }
    let defective = inspection.defective_die_count() as u64;
    if summary.defective_die_count != defective {
        mismatches.push(SummaryMismatch {
            field: "NDEFDIE",
            declared: summary.defective_die_count,
            computed: defective,
        });
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{DefectBuilder, Point, SampleSize, SummaryRow};

    fn inspection_with_defects(count: usize) -> Inspection {
        let mut inspection = Inspection {
            sample_size: SampleSize {
                order: 1,
                diameter_mm: 20.0,
            },
            die_pitch: Point {
                x: 5000.0,
                y: 5000.0,
            },
            ..Default::default()
        };
        for i in 0..count {
            let mut builder = DefectBuilder::new();
            builder.id(i as i64 + 1);
            builder.index_x(-1);
            builder.index_y(1);
            builder.x_rel(10.0);
            builder.y_rel(10.0);
            inspection.defects.push(builder.build());
        }
        inspection
    }

    #[test]
    fn test_compute_stats_counts() {
        let mut inspection = inspection_with_defects(3);
        inspection.build_die_map();
        let stats = compute_stats(&inspection);

        assert_eq!(stats.defect_count, 3);
        assert_eq!(stats.die_count, 4);
        assert_eq!(stats.defective_die_count, 1);
        assert_eq!(stats.max_defects_per_die, 3);
        // 3 defects over 4 dies of 0.25 cm² each
        assert!((stats.defect_density - 3.0).abs() < 1e-9);
        assert_eq!(stats.unclassified_defects, 3);
    }

    #[test]
    fn test_stats_without_die_map() {
        let inspection = inspection_with_defects(2);
        let stats = compute_stats(&inspection);

        assert_eq!(stats.defect_count, 2);
        assert_eq!(stats.die_count, 0);
        assert_eq!(stats.defect_density, 0.0);
    }

    #[test]
    fn test_verify_summary_agreement() {
        let mut inspection = inspection_with_defects(2);
        inspection.build_die_map();
        inspection.summary = Some(SummaryRow {
            test: 1,
            defect_count: 2,
            defect_density: 0.5,
            die_count: 4,
            defective_die_count: 1,
        });

        assert!(verify_summary(&inspection).is_empty());
    }

    #[test]
    fn test_verify_summary_mismatch() {
        let mut inspection = inspection_with_defects(2);
        inspection.build_die_map();
        inspection.summary = Some(SummaryRow {
            test: 1,
            defect_count: 5,
            defect_density: 0.5,
            die_count: 4,
            defective_die_count: 3,
        });

        let mismatches = verify_summary(&inspection);
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].field, "NDEFECT");
        assert_eq!(mismatches[0].declared, 5);
        assert_eq!(mismatches[0].computed, 2);
        assert_eq!(mismatches[1].field, "NDEFDIE");
    }

    #[test]
    fn test_verify_summary_absent() {
        let inspection = inspection_with_defects(1);
        assert!(verify_summary(&inspection).is_empty());
    }
}

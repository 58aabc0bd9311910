pub mod die_map;
pub mod stats;

pub use die_map::DieMapBuilder;
pub use stats::{compute_stats, verify_summary, InspectionStats, SummaryMismatch};

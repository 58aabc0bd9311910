pub mod klarf;
pub mod record_spec;
pub mod schema;
pub mod writer;

// Re-export for convenience
pub use klarf::{detect_format, KlarfParseError, KlarfParser, KlarfVersion};
pub use record_spec::{RecordSchema, RecordSpecError};
pub use schema::*;

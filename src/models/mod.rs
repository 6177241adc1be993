//! Data models for dialogue annotation
//!
//! Segments and the taxonomy they are annotated against.

pub mod segment;
pub mod taxonomy;

// Re-export commonly used types
pub use segment::{Annotation, Link, OriginalText, Segment, SegmentId};
pub use taxonomy::Taxonomy;

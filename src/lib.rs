//! Dialogue Annotator
//!
//! Engine for annotating transcribed dialogue: segments carrying
//! multi-layer labels, qualifiers, typed links and notes; structural edits
//! (split, merge, link, filter) that keep links and views consistent; and
//! an undo/redo history covering every edit.
//!
//! Rendering and input handling belong to the caller, which drives an
//! [`Annotator`] and polls its collection after every gesture.

pub mod annotator;
pub mod collection;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod undo;

// Re-export commonly used types
pub use annotator::Annotator;
pub use collection::{Filter, SegmentCollection};
pub use config::AnnotatorConfig;
pub use error::{EditError, PersistError};
pub use models::{Annotation, Link, OriginalText, Segment, SegmentId, Taxonomy};
pub use undo::{Command, UndoStack};

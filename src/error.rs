//! Error types for the annotation engine
//!
//! Two families: [`EditError`] for declined edits (the collection is left
//! untouched) and [`PersistError`] for import/export faults (the previously
//! loaded collection is left untouched).

use thiserror::Error;

/// A declined edit, navigation or history request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Segment {0} not found")]
    UnknownSegment(String),

    #[error("Token '{0}' cannot be used as a split point")]
    NotSplittable(String),

    /// Merge donor must immediately precede the receiver in the view
    #[error("Segments are not adjacent in the view")]
    NotAdjacent,

    #[error("Cannot merge segments from different participants ('{0}' and '{1}')")]
    ParticipantMismatch(String, String),

    #[error("Link target must come before the source segment")]
    LinkNotEarlier,

    #[error("Link of type '{0}' already exists")]
    DuplicateLink(String),

    #[error("Layer '{0}' not found in taxonomy")]
    UnknownLayer(String),

    #[error("Label '{label}' not found in layer '{layer}'")]
    UnknownLabel { layer: String, label: String },

    #[error("Qualifier '{qualifier}' not found in layer '{layer}'")]
    UnknownQualifier { layer: String, qualifier: String },

    #[error("Link type '{0}' not found in taxonomy")]
    UnknownLinkType(String),

    #[error("Name '{0}' already exists")]
    NameCollision(String),

    #[error("Cannot delete the only remaining layer '{0}'")]
    LastLayer(String),

    #[error("Active segment has no annotation in layer '{0}'")]
    NotAnnotated(String),

    #[error("No active segment")]
    EmptyView,

    #[error("No taxonomy loaded")]
    NoTaxonomy,

    #[error("No undo history available")]
    NothingToUndo,

    #[error("No redo history available")]
    NothingToRedo,
}

/// Persistence faults (import, export, snapshots, taxonomy documents, config)
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Duplicate segment id '{0}'")]
    DuplicateId(String),

    #[error("Link references unknown segment '{0}'")]
    UnknownLinkTarget(String),

    #[error("Unparseable timestamp '{0}'")]
    BadTimestamp(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(String),
}

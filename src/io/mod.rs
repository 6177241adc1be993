//! Persistence adapters
//!
//! - `json`: record-oriented import/export (array of objects)
//! - `tsv`: tab-delimited import/export with a header row
//! - `snapshot`: complete collection save/load
//!
//! Imports build a fresh collection and never touch the one currently
//! loaded; a failed import returns the error and nothing else. Imported
//! annotations and links land in the legacy maps of each segment.

pub mod json;
pub mod snapshot;
pub mod tsv;

use crate::collection::SegmentCollection;
use crate::error::PersistError;
use crate::models::{Link, Segment, SegmentId, Taxonomy};
use chrono::{DateTime, NaiveDateTime};
use std::collections::HashSet;
use std::path::Path;

/// Separator between provenance parts of a merged segment in flat exports
pub const MERGE_SYMBOL: &str = "<<MERGED<<";

/// Timestamp format written by every exporter
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%y %H:%M:%S";

const ACCEPTED_FORMATS: [&str; 6] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Document flavour, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Tsv,
}

impl Format {
    /// `.json` is record-oriented; `.tsv`, `.csv` and `.txt` are tab-delimited
    pub fn from_path(path: &Path) -> Result<Format, PersistError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(Format::Json),
            "tsv" | "csv" | "txt" => Ok(Format::Tsv),
            other => Err(PersistError::UnsupportedFormat(other.to_string())),
        }
    }
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp in the export format or one of the common ISO forms
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, PersistError> {
    let text = text.trim();
    for format in ACCEPTED_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_local())
        .map_err(|_| PersistError::BadTimestamp(text.to_string()))
}

/// Import a collection, picking the reader from the file extension
pub fn import_collection(path: impl AsRef<Path>, taxonomy: Option<Taxonomy>) -> Result<SegmentCollection, PersistError> {
    let path = path.as_ref();
    let format = Format::from_path(path).unwrap_or(Format::Tsv);
    let content = std::fs::read_to_string(path)?;
    let segments = match format {
        Format::Json => json::read_records(&content)?,
        Format::Tsv => tsv::read_rows(&content)?,
    };
    log::info!("Imported {} segments from {}", segments.len(), path.display());
    Ok(SegmentCollection::from_segments(segments, taxonomy))
}

/// Export the full collection, picking the writer from the file extension
pub fn export_collection(collection: &SegmentCollection, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let path = path.as_ref();
    let content = match Format::from_path(path)? {
        Format::Json => json::write_records(collection)?,
        Format::Tsv => tsv::write_rows(collection),
    };
    std::fs::write(path, content)?;
    log::info!("Exported {} segments to {}", collection.len(), path.display());
    Ok(())
}

/// Collects imported segments in order, enforcing unique ids and
/// backward-only link references
#[derive(Default)]
pub(crate) struct ImportBuilder {
    segments: Vec<Segment>,
    seen: HashSet<SegmentId>,
}

impl ImportBuilder {
    pub(crate) fn push(&mut self, segment: Segment) -> Result<(), PersistError> {
        if !self.seen.insert(segment.id.clone()) {
            return Err(PersistError::DuplicateId(segment.id.to_string()));
        }
        self.segments.push(segment);
        Ok(())
    }

    pub(crate) fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Segment> {
        self.segments.last_mut()
    }

    /// Legacy link to a segment imported earlier
    pub(crate) fn legacy_link(&self, target: &str, link_type: &str) -> Result<Link, PersistError> {
        let target = SegmentId::from(target.trim());
        if !self.seen.contains(&target) {
            return Err(PersistError::UnknownLinkTarget(target.to_string()));
        }
        Ok(Link::new(target, link_type.trim()))
    }

    pub(crate) fn finish(self) -> Vec<Segment> {
        self.segments
    }
}

//! Record-oriented JSON documents
//!
//! An array of objects, one per segment:
//! `{id, segment, raw, participant, datetime, note, links: {type: [ids]}, annotations}`.
//! `segment` is the current text and `raw` its provenance (a string, or a
//! list of strings for merged segments).

use super::{format_timestamp, parse_timestamp, ImportBuilder};
use crate::collection::SegmentCollection;
use crate::error::PersistError;
use crate::models::{Annotation, OriginalText, Segment, SegmentId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    #[serde(default)]
    id: Option<String>,
    segment: String,
    #[serde(default)]
    raw: Option<OriginalText>,
    participant: String,
    datetime: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    links: IndexMap<String, Vec<String>>,
    #[serde(default)]
    annotations: BTreeMap<String, Annotation>,
}

/// Parse a record document into segments in document order
pub fn read_records(json: &str) -> Result<Vec<Segment>, PersistError> {
    let records: Vec<Record> = serde_json::from_str(json)?;
    let mut builder = ImportBuilder::default();

    for (index, record) in records.into_iter().enumerate() {
        let timestamp = parse_timestamp(&record.datetime)?;
        let id = match record.id {
            Some(id) if !id.trim().is_empty() => SegmentId::from(id.trim()),
            _ => SegmentId::generate(),
        };
        let mut segment = Segment::with_id(id, record.segment, record.participant, timestamp);
        if let Some(original) = record.raw {
            segment.set_original(original);
        }
        segment.note = record.note.filter(|n| !n.trim().is_empty());
        segment.legacy = record
            .annotations
            .into_iter()
            .filter(|(_, a)| !a.is_empty())
            .collect();

        for (link_type, targets) in &record.links {
            for target in targets {
                let link = builder.legacy_link(target, link_type).map_err(|e| {
                    log::error!("Record {}: {}", index + 1, e);
                    e
                })?;
                segment.legacy_links.push(link);
            }
        }
        builder.push(segment)?;
    }
    Ok(builder.finish())
}

/// Serialize the full collection as a record document
///
/// Live annotations and links are written; legacy ones are not.
pub fn write_records(collection: &SegmentCollection) -> Result<String, PersistError> {
    let records: Vec<Record> = collection.full().map(to_record).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

fn to_record(segment: &Segment) -> Record {
    let mut links: IndexMap<String, Vec<String>> = IndexMap::new();
    for link in segment.outgoing() {
        links
            .entry(link.link_type.clone())
            .or_default()
            .push(link.segment.to_string());
    }
    Record {
        id: Some(segment.id.to_string()),
        segment: segment.raw().to_string(),
        raw: Some(segment.original().clone()),
        participant: segment.participant.clone(),
        datetime: format_timestamp(&segment.timestamp),
        note: segment.note.clone(),
        links,
        annotations: segment.annotations.clone(),
    }
}

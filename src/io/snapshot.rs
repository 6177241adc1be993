//! Complete collection snapshots
//!
//! Unlike the flat exports a snapshot keeps live links, legacy data, the
//! taxonomy and the navigation state, so loading one resumes a session
//! exactly where it was saved.

use crate::collection::{Filter, SegmentCollection};
use crate::error::PersistError;
use crate::models::{Segment, SegmentId, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    taxonomy: Option<Taxonomy>,
    active_layer: Option<String>,
    #[serde(default)]
    filter: Option<Filter>,
    /// Full-order index of the active segment
    #[serde(default)]
    position: Option<usize>,
    segments: Vec<Segment>,
}

pub fn to_json_string(collection: &SegmentCollection) -> Result<String, PersistError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        taxonomy: collection.taxonomy.clone(),
        active_layer: collection.active_layer.clone(),
        filter: collection.filter.clone(),
        position: collection.active_id().and_then(|id| collection.position(id)),
        segments: collection.full().cloned().collect(),
    };
    Ok(serde_json::to_string(&snapshot)?)
}

pub fn from_json_str(json: &str) -> Result<SegmentCollection, PersistError> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedFormat(format!("snapshot version {}", snapshot.version)));
    }

    let mut segments = snapshot.segments;
    let mut ids: HashSet<SegmentId> = HashSet::new();
    for segment in &mut segments {
        segment.tokenize();
        if !ids.insert(segment.id.clone()) {
            return Err(PersistError::DuplicateId(segment.id.to_string()));
        }
    }
    let dangling = segments
        .iter()
        .flat_map(|s| s.outgoing().iter().chain(s.incoming()).chain(s.legacy_links()))
        .find(|l| !ids.contains(&l.segment));
    if let Some(link) = dangling {
        return Err(PersistError::UnknownLinkTarget(link.segment.to_string()));
    }

    let mut collection = SegmentCollection::from_segments(segments, snapshot.taxonomy);
    collection
        .check_links()
        .map_err(|reason| PersistError::MalformedRecord { line: 0, reason })?;
    collection.active_layer = snapshot.active_layer;
    if let Some(position) = snapshot.position {
        collection.go_to(position);
    }
    if let Some(filter) = snapshot.filter {
        collection.filter_by(filter);
    }
    Ok(collection)
}

pub fn save(collection: &SegmentCollection, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let path = path.as_ref();
    fs::write(path, to_json_string(collection)?)?;
    log::info!("Saved snapshot of {} segments to {}", collection.len(), path.display());
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<SegmentCollection, PersistError> {
    let path = path.as_ref();
    let collection = from_json_str(&fs::read_to_string(path)?)?;
    log::info!("Loaded snapshot of {} segments from {}", collection.len(), path.display());
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::test_support::*;

    #[test]
    fn test_snapshot_round_trip_keeps_session() {
        let mut c = collection(&[("hello world", "P1"), ("ok", "P2"), ("fine", "P1")]);
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();
        c.set_label(&id("s2"), "task", "inform").unwrap();
        c.segments.get_mut(&id("s0")).unwrap().note = Some("n".to_string());
        c.go_to(2);
        c.filter_by(Filter::Label {
            layer: "task".to_string(),
            label: "inform".to_string(),
        });

        let json = to_json_string(&c).unwrap();
        let loaded = from_json_str(&json).unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.segment(&id("s0")).unwrap().tokens(), &["hello", "world"]);
        loaded.check_invariants().unwrap();
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let c = collection(&[("a b", "P1")]);
        save(&c, &path).unwrap();
        assert_eq!(load(&path).unwrap(), c);
    }

    #[test]
    fn test_dangling_link_rejected() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();
        c.segments.remove(&id("s0"));
        c.order.retain(|s| s != &id("s0"));
        c.view.retain(|s| s != &id("s0"));
        c.cursor = Some(0);
        let json = to_json_string(&c).unwrap();
        assert!(matches!(from_json_str(&json), Err(PersistError::UnknownLinkTarget(_))));
    }

    #[test]
    fn test_unmirrored_link_rejected() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();
        c.segments.get_mut(&id("s0")).unwrap().incoming.clear();
        let json = to_json_string(&c).unwrap();
        assert!(matches!(from_json_str(&json), Err(PersistError::MalformedRecord { .. })));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let json = r#"{"version": 9, "taxonomy": null, "active_layer": null, "segments": []}"#;
        assert!(matches!(from_json_str(json), Err(PersistError::UnsupportedFormat(_))));
    }
}

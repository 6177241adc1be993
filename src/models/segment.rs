//! Segment model
//!
//! A segment is one annotatable unit of transcript text. It owns its
//! annotations, its note and both sides of its links. Links are stored by
//! segment id so that the collection can keep segments in an arena and
//! undo snapshots never alias live data.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Punctuation that attaches to the preceding text without a space when merging
const CLAUSE_FINAL: [char; 2] = [',', '.'];

/// Process-unique segment identifier
///
/// Fresh segments get a v4 uuid; imported segments keep the id found in the
/// source document so cross references survive export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SegmentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Pre-edit text of a segment
///
/// A single string for imported segments, an ordered list once segments
/// have been merged (donor parts first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OriginalText {
    Single(String),
    Merged(Vec<String>),
}

impl OriginalText {
    pub fn parts(&self) -> Vec<&str> {
        match self {
            OriginalText::Single(s) => vec![s.as_str()],
            OriginalText::Merged(parts) => parts.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Provenance of a merge: `donor` parts followed by `receiver` parts
    pub fn combine(donor: &OriginalText, receiver: &OriginalText) -> OriginalText {
        let parts = donor
            .parts()
            .into_iter()
            .chain(receiver.parts())
            .map(|s| s.to_string())
            .collect();
        OriginalText::Merged(parts)
    }

    pub fn joined(&self, separator: &str) -> String {
        self.parts().join(separator)
    }
}

/// Annotation under one layer
///
/// A qualifier without a label is a valid state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl Annotation {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.qualifier.is_none()
    }

    /// Deep update: fields present in `other` overwrite ours
    pub fn update_from(&mut self, other: &Annotation) {
        if other.label.is_some() {
            self.label = other.label.clone();
        }
        if other.qualifier.is_some() {
            self.qualifier = other.qualifier.clone();
        }
    }
}

/// One end of a typed link
///
/// In an outgoing list `segment` is the target; in an incoming list it is
/// the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub segment: SegmentId,
    pub link_type: String,
}

impl Link {
    pub fn new(segment: SegmentId, link_type: impl Into<String>) -> Self {
        Self {
            segment,
            link_type: link_type.into(),
        }
    }
}

/// One annotatable unit of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    raw: String,
    original: OriginalText,
    pub participant: String,
    pub timestamp: NaiveDateTime,
    #[serde(skip)]
    tokens: Vec<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, Annotation>,
    #[serde(default)]
    pub legacy: BTreeMap<String, Annotation>,
    #[serde(default)]
    pub(crate) outgoing: Vec<Link>,
    #[serde(default)]
    pub(crate) incoming: Vec<Link>,
    /// Links imported from a prior scheme, promoted explicitly
    #[serde(default)]
    pub(crate) legacy_links: Vec<Link>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Segment {
    pub fn new(raw: impl Into<String>, participant: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self::with_id(SegmentId::generate(), raw, participant, timestamp)
    }

    pub fn with_id(
        id: SegmentId,
        raw: impl Into<String>,
        participant: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        let raw = raw.into();
        let mut segment = Self {
            id,
            original: OriginalText::Single(raw.clone()),
            raw,
            participant: participant.into(),
            timestamp,
            tokens: Vec::new(),
            annotations: BTreeMap::new(),
            legacy: BTreeMap::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            legacy_links: Vec::new(),
            note: None,
        };
        segment.tokenize();
        segment
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Replace the text, keeping tokens in sync
    pub fn set_raw(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
        self.tokenize();
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn original(&self) -> &OriginalText {
        &self.original
    }

    pub fn set_original(&mut self, original: OriginalText) {
        self.original = original;
    }

    pub fn outgoing(&self) -> &[Link] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[Link] {
        &self.incoming
    }

    pub fn legacy_links(&self) -> &[Link] {
        &self.legacy_links
    }

    pub fn links_to(&self, target: &SegmentId) -> bool {
        self.outgoing.iter().any(|l| &l.segment == target)
    }

    /// Recompute tokens after deserialization
    pub(crate) fn tokenize(&mut self) {
        self.tokens = self.raw.split_whitespace().map(|t| t.to_string()).collect();
    }

    // ----- annotations -----

    pub fn annotation(&self, layer: &str) -> Option<&Annotation> {
        self.annotations.get(layer)
    }

    pub fn legacy_annotation(&self, layer: &str) -> Option<&Annotation> {
        self.legacy.get(layer)
    }

    pub fn label(&self, layer: &str) -> Option<&str> {
        self.annotations.get(layer).and_then(|a| a.label.as_deref())
    }

    pub fn qualifier(&self, layer: &str) -> Option<&str> {
        self.annotations.get(layer).and_then(|a| a.qualifier.as_deref())
    }

    pub fn set_label(&mut self, layer: &str, label: impl Into<String>) {
        self.annotations.entry(layer.to_string()).or_default().label = Some(label.into());
    }

    pub fn set_qualifier(&mut self, layer: &str, qualifier: impl Into<String>) {
        self.annotations.entry(layer.to_string()).or_default().qualifier = Some(qualifier.into());
    }

    pub fn clear_label(&mut self, layer: &str) {
        if let Some(a) = self.annotations.get_mut(layer) {
            a.label = None;
        }
        self.prune(layer);
    }

    pub fn clear_qualifier(&mut self, layer: &str) {
        if let Some(a) = self.annotations.get_mut(layer) {
            a.qualifier = None;
        }
        self.prune(layer);
    }

    /// Set or remove the whole annotation record under a layer
    pub fn set_annotation(&mut self, layer: &str, annotation: Option<Annotation>) {
        match annotation {
            Some(a) if !a.is_empty() => {
                self.annotations.insert(layer.to_string(), a);
            }
            _ => {
                self.annotations.remove(layer);
            }
        }
    }

    fn prune(&mut self, layer: &str) {
        if self.annotations.get(layer).is_some_and(|a| a.is_empty()) {
            self.annotations.remove(layer);
        }
    }

    // ----- structural primitives -----

    /// Index of the first token equal to `token`, if splitting after it
    /// leaves a non-empty second half
    pub fn split_point(&self, token: &str) -> Option<usize> {
        let index = self.tokens.iter().position(|t| t == token)?;
        (index + 1 < self.tokens.len()).then_some(index + 1)
    }

    /// Copy with fresh id and new text; links are not copied
    pub fn derive(&self, raw: impl Into<String>) -> Segment {
        let mut segment = Segment::new(raw, self.participant.clone(), self.timestamp);
        segment.original = self.original.clone();
        segment.annotations = self.annotations.clone();
        segment.legacy = self.legacy.clone();
        segment.note = self.note.clone();
        segment
    }

    /// Two halves split before token `at`; both inherit everything but links
    pub fn halves(&self, at: usize) -> (Segment, Segment) {
        let first = self.derive(self.tokens[..at].join(" "));
        let second = self.derive(self.tokens[at..].join(" "));
        (first, second)
    }

    /// Prepend `donor`'s text, provenance, annotations and note
    ///
    /// Links are handled by the collection.
    pub fn absorb(&mut self, donor: &Segment) {
        let glue = match self.raw.chars().next() {
            None => "",
            Some(c) if CLAUSE_FINAL.contains(&c) => "",
            Some(_) => " ",
        };
        let raw = format!("{}{}{}", donor.raw, glue, self.raw);
        self.set_raw(raw);
        self.original = OriginalText::combine(&donor.original, &self.original);

        deep_update(&mut self.annotations, &donor.annotations);
        deep_update(&mut self.legacy, &donor.legacy);

        self.note = match (&donor.note, self.note.take()) {
            (Some(d), Some(r)) => Some(format!("{} / {}", d, r)),
            (Some(d), None) => Some(d.clone()),
            (None, r) => r,
        };
    }
}

/// Layer-wise deep update where `from` wins on collision
fn deep_update(into: &mut BTreeMap<String, Annotation>, from: &BTreeMap<String, Annotation>) {
    for (layer, annotation) in from {
        into.entry(layer.clone()).or_default().update_from(annotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_tokens_follow_raw() {
        let mut s = Segment::new("  hello   big world ", "P1", ts());
        assert_eq!(s.tokens(), &["hello", "big", "world"]);

        s.set_raw("bye");
        assert_eq!(s.tokens(), &["bye"]);
    }

    #[test]
    fn test_split_point_excludes_last_token() {
        let s = Segment::new("a b a", "P1", ts());
        assert_eq!(s.split_point("a"), Some(1));
        assert_eq!(s.split_point("b"), Some(2));
        assert_eq!(s.split_point("c"), None);

        let single = Segment::new("alone", "P1", ts());
        assert_eq!(single.split_point("alone"), None);
    }

    #[test]
    fn test_halves_conserve_tokens() {
        let mut s = Segment::new("one two three four", "P1", ts());
        s.set_label("task", "inform");
        s.note = Some("n".to_string());

        let (a, b) = s.halves(2);
        assert_eq!(a.raw(), "one two");
        assert_eq!(b.raw(), "three four");
        let joined: Vec<_> = a.tokens().iter().chain(b.tokens()).cloned().collect();
        assert_eq!(joined, s.tokens());

        assert_ne!(a.id, s.id);
        assert_ne!(a.id, b.id);
        assert_eq!(a.label("task"), Some("inform"));
        assert_eq!(b.note.as_deref(), Some("n"));
        assert_eq!(b.original(), s.original());
    }

    #[test]
    fn test_absorb_text_and_notes() {
        let mut donor = Segment::new("hi", "P1", ts());
        donor.note = Some("x".to_string());
        let mut receiver = Segment::new("there", "P1", ts());
        receiver.note = Some("y".to_string());

        receiver.absorb(&donor);
        assert_eq!(receiver.raw(), "hi there");
        assert_eq!(receiver.note.as_deref(), Some("x / y"));
        assert_eq!(
            receiver.original(),
            &OriginalText::Merged(vec!["hi".to_string(), "there".to_string()])
        );
    }

    #[test]
    fn test_absorb_punctuation_glue() {
        let donor = Segment::new("ok", "P1", ts());
        let mut receiver = Segment::new(", fine", "P1", ts());
        receiver.absorb(&donor);
        assert_eq!(receiver.raw(), "ok, fine");

        let donor = Segment::new("really", "P1", ts());
        let mut receiver = Segment::new("? yes", "P1", ts());
        receiver.absorb(&donor);
        assert_eq!(receiver.raw(), "really ? yes");
    }

    #[test]
    fn test_absorb_single_note_kept() {
        let donor = Segment::new("a", "P1", ts());
        let mut receiver = Segment::new("b", "P1", ts());
        receiver.note = Some("only".to_string());
        receiver.absorb(&donor);
        assert_eq!(receiver.note.as_deref(), Some("only"));
    }

    #[test]
    fn test_absorb_donor_annotations_win() {
        let mut donor = Segment::new("a", "P1", ts());
        donor.set_label("task", "inform");
        let mut receiver = Segment::new("b", "P1", ts());
        receiver.set_label("task", "request");
        receiver.set_qualifier("task", "partial");
        receiver.set_label("feedback", "acknowledge");

        receiver.absorb(&donor);
        assert_eq!(receiver.label("task"), Some("inform"));
        assert_eq!(receiver.qualifier("task"), Some("partial"));
        assert_eq!(receiver.label("feedback"), Some("acknowledge"));
    }

    #[test]
    fn test_clearing_last_field_removes_layer() {
        let mut s = Segment::new("a", "P1", ts());
        s.set_qualifier("task", "partial");
        assert!(s.annotation("task").is_some());
        assert_eq!(s.label("task"), None);

        s.clear_qualifier("task");
        assert!(s.annotation("task").is_none());
    }

    #[test]
    fn test_original_text_serializes_untagged() {
        let single = OriginalText::Single("a".to_string());
        assert_eq!(serde_json::to_string(&single).unwrap(), "\"a\"");
        let merged: OriginalText = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(merged.joined("|"), "a|b");
    }
}

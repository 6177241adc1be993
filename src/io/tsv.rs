//! Tab-delimited transcripts
//!
//! Header row first. Fixed columns are `id, segment, raw, participant,
//! datetime, note, links`; every other column `<layer>` holds a label and
//! `<layer>-value` a qualifier. Links are written `"<id>-<type>,..."`.
//!
//! `raw` is the transcript line and `segment` the span of it this row
//! covers. A row with an empty `raw` continues the previous row: the
//! previous segment keeps as many tokens as its span has, and the rest
//! becomes the new segment. A `\` participant repeats the previous one.

use super::{format_timestamp, parse_timestamp, ImportBuilder, MERGE_SYMBOL};
use crate::collection::SegmentCollection;
use crate::error::PersistError;
use crate::models::{Annotation, OriginalText, Segment, SegmentId};
use std::collections::{BTreeSet, HashMap};

const FIXED_COLUMNS: [&str; 7] = ["id", "segment", "raw", "participant", "datetime", "note", "links"];
const QUALIFIER_SUFFIX: &str = "-value";
const SAME_PARTICIPANT: &str = "\\";

struct Row<'a> {
    line: usize,
    cells: HashMap<&'a str, &'a str>,
}

impl<'a> Row<'a> {
    fn get(&self, column: &str) -> &'a str {
        self.cells.get(column).copied().map(str::trim).unwrap_or("")
    }

    fn malformed(&self, reason: impl Into<String>) -> PersistError {
        PersistError::MalformedRecord {
            line: self.line,
            reason: reason.into(),
        }
    }
}

/// Parse a tab-delimited document into segments in row order
pub fn read_rows(content: &str) -> Result<Vec<Segment>, PersistError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or(PersistError::MalformedRecord {
        line: 1,
        reason: "missing header row".to_string(),
    })?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    for required in ["raw", "participant"] {
        if !columns.contains(&required) {
            return Err(PersistError::MalformedRecord {
                line: 1,
                reason: format!("missing '{}' column", required),
            });
        }
    }

    let mut builder = ImportBuilder::default();
    let mut spans: Vec<String> = Vec::new();

    for (index, line) in lines {
        let values: Vec<&str> = line.split('\t').collect();
        let row = Row {
            line: index + 1,
            cells: columns.iter().copied().zip(values.iter().copied()).collect(),
        };
        if values.len() > columns.len() {
            return Err(row.malformed(format!("{} cells for {} columns", values.len(), columns.len())));
        }

        let mut segment = if row.get("raw").is_empty() {
            continuation(&row, &mut builder, spans.last().map(String::as_str))?
        } else {
            fresh(&row, builder.last())?
        };
        spans.push(row.get("segment").to_string());

        read_legacy_annotations(&row, &columns, &mut segment);
        for link in row.get("links").split(',').map(str::trim).filter(|l| !l.is_empty()) {
            // ids may contain hyphens, link type names may not
            let (target, link_type) = link
                .rsplit_once('-')
                .ok_or_else(|| row.malformed(format!("bad link '{}'", link)))?;
            segment.legacy_links.push(builder.legacy_link(target, link_type)?);
        }
        let note = row.get("note");
        segment.note = (!note.is_empty()).then(|| note.to_string());

        builder.push(segment)?;
    }
    Ok(builder.finish())
}

fn row_id(row: &Row) -> SegmentId {
    match row.get("id") {
        "" => SegmentId::generate(),
        id => SegmentId::from(id),
    }
}

fn fresh(row: &Row, previous: Option<&Segment>) -> Result<Segment, PersistError> {
    let participant = match row.get("participant") {
        SAME_PARTICIPANT => previous
            .map(|p| p.participant.clone())
            .ok_or_else(|| row.malformed("'\\' participant on the first row"))?,
        p => p.to_string(),
    };
    let timestamp = match row.get("datetime") {
        "" => previous
            .map(|p| p.timestamp)
            .ok_or_else(|| row.malformed("missing datetime on the first row"))?,
        text => parse_timestamp(text)?,
    };

    let raw = row.get("raw");
    if raw.contains(MERGE_SYMBOL) {
        let parts: Vec<String> = raw.split(MERGE_SYMBOL).map(|p| p.trim().to_string()).collect();
        let mut segment = Segment::with_id(row_id(row), parts.join(" "), participant, timestamp);
        segment.set_original(OriginalText::Merged(parts));
        Ok(segment)
    } else {
        Ok(Segment::with_id(row_id(row), raw, participant, timestamp))
    }
}

/// Split the previous segment after its span and return the remainder
fn continuation(row: &Row, builder: &mut ImportBuilder, span: Option<&str>) -> Result<Segment, PersistError> {
    let kept = span.map(|s| s.split_whitespace().count()).unwrap_or(0);
    let previous = builder
        .last_mut()
        .ok_or_else(|| row.malformed("continuation row without a previous row"))?;
    if kept == 0 || kept >= previous.tokens().len() {
        return Err(row.malformed("previous span does not leave text to continue"));
    }

    let tokens = previous.tokens().to_vec();
    previous.set_raw(tokens[..kept].join(" "));

    let mut segment = Segment::with_id(
        row_id(row),
        tokens[kept..].join(" "),
        previous.participant.clone(),
        previous.timestamp,
    );
    segment.set_original(previous.original().clone());
    Ok(segment)
}

fn read_legacy_annotations(row: &Row, columns: &[&str], segment: &mut Segment) {
    for column in columns.iter().filter(|c| !FIXED_COLUMNS.contains(*c)) {
        let value = row.get(column);
        if value.is_empty() {
            continue;
        }
        let (layer, is_qualifier) = match column.strip_suffix(QUALIFIER_SUFFIX) {
            Some(layer) => (layer, true),
            None => (*column, false),
        };
        let entry: &mut Annotation = segment.legacy.entry(layer.to_string()).or_default();
        if is_qualifier {
            entry.qualifier = Some(value.to_string());
        } else {
            entry.label = Some(value.to_string());
        }
    }
}

/// Serialize the full collection as a tab-delimited document
///
/// Layers come from the taxonomy, or from the live annotations when no
/// taxonomy is loaded. A `raw` cell equal to the previous row's is left
/// empty so the file reads back as a continuation.
pub fn write_rows(collection: &SegmentCollection) -> String {
    let layers: Vec<String> = match collection.taxonomy() {
        Some(t) => t.layers().map(String::from).collect(),
        None => collection
            .full()
            .flat_map(|s| s.annotations.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for layer in &layers {
        header.push(layer.clone());
        header.push(format!("{}{}", layer, QUALIFIER_SUFFIX));
    }

    let mut out = header.join("\t");
    out.push('\n');

    let mut previous_raw: Option<String> = None;
    for segment in collection.full() {
        let raw = segment.original().joined(MERGE_SYMBOL);
        let links: Vec<String> = segment
            .outgoing()
            .iter()
            .map(|l| format!("{}-{}", l.segment, l.link_type))
            .collect();

        let mut cells = vec![
            segment.id.to_string(),
            segment.raw().to_string(),
            if previous_raw.as_deref() == Some(raw.as_str()) { String::new() } else { raw.clone() },
            segment.participant.clone(),
            format_timestamp(&segment.timestamp),
            segment.note.clone().unwrap_or_default(),
            links.join(","),
        ];
        for layer in &layers {
            cells.push(segment.label(layer).unwrap_or_default().to_string());
            cells.push(segment.qualifier(layer).unwrap_or_default().to_string());
        }

        let cells: Vec<String> = cells.iter().map(|c| clean(c)).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
        previous_raw = Some(raw);
    }
    out
}

/// Tabs and line breaks would break the row structure
fn clean(cell: &str) -> String {
    cell.replace(['\t', '\n', '\r'], " ")
}

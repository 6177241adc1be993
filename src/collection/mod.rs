//! Segment collection
//!
//! Owns every segment (an arena keyed by [`SegmentId`]), the full order,
//! the filtered view, the cursor, the active layer and filter, and the
//! taxonomy. Every mutating operation leaves the collection consistent and
//! returns the [`Command`](crate::undo::Command) that describes what it
//! did, so the caller can record it for undo.
//!
//! ## Modules
//!
//! - `navigation`: cursor movement inside the view
//! - `filter`: filtered views and cursor repositioning
//! - `links`: mirrored link graph maintenance
//! - `edit`: split, merge, delete, annotation and note writes
//! - `taxonomy_ops`: taxonomy edits propagated to segments

mod edit;
mod filter;
mod links;
mod navigation;
mod taxonomy_ops;

pub use filter::Filter;

use crate::error::EditError;
use crate::models::{Segment, SegmentId, Taxonomy};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentCollection {
    pub(crate) segments: HashMap<SegmentId, Segment>,
    /// Full ordering (creation order)
    pub(crate) order: Vec<SegmentId>,
    /// Order-preserving subsequence of `order`
    pub(crate) view: Vec<SegmentId>,
    /// Index into `view`; `None` when the view is empty
    pub(crate) cursor: Option<usize>,
    pub(crate) active_layer: Option<String>,
    pub(crate) filter: Option<Filter>,
    pub(crate) taxonomy: Option<Taxonomy>,
}

impl SegmentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from segments in order
    ///
    /// Link lists are taken as they are; callers importing links should
    /// put them in the legacy lists or go through `create_link`.
    pub fn from_segments(segments: Vec<Segment>, taxonomy: Option<Taxonomy>) -> Self {
        let order: Vec<SegmentId> = segments.iter().map(|s| s.id.clone()).collect();
        let active_layer = taxonomy.as_ref().and_then(|t| t.default_layer.clone());
        let cursor = (!order.is_empty()).then_some(0);
        Self {
            segments: segments.into_iter().map(|s| (s.id.clone(), s)).collect(),
            view: order.clone(),
            order,
            cursor,
            active_layer,
            filter: None,
            taxonomy,
        }
    }

    /// Append a segment at the end of the collection (and of the view when
    /// unfiltered)
    pub fn push(&mut self, segment: Segment) {
        let id = segment.id.clone();
        self.segments.insert(id.clone(), segment);
        self.order.push(id.clone());
        if self.filter.is_none() {
            self.view.push(id);
        }
        if self.cursor.is_none() && !self.view.is_empty() {
            self.cursor = Some(0);
        }
    }

    // ----- read-only accessors -----

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Segment ids in full order
    pub fn order(&self) -> &[SegmentId] {
        &self.order
    }

    /// Segment ids currently displayed
    pub fn view(&self) -> &[SegmentId] {
        &self.view
    }

    /// Segments in full order
    pub fn full(&self) -> impl Iterator<Item = &Segment> {
        self.order.iter().filter_map(|id| self.segments.get(id))
    }

    /// Segments in view order
    pub fn visible(&self) -> impl Iterator<Item = &Segment> {
        self.view.iter().filter_map(|id| self.segments.get(id))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub(crate) fn segment_mut(&mut self, id: &SegmentId) -> Result<&mut Segment, EditError> {
        self.segments
            .get_mut(id)
            .ok_or_else(|| EditError::UnknownSegment(id.to_string()))
    }

    pub(crate) fn require(&self, id: &SegmentId) -> Result<&Segment, EditError> {
        self.segments
            .get(id)
            .ok_or_else(|| EditError::UnknownSegment(id.to_string()))
    }

    pub fn active_id(&self) -> Option<&SegmentId> {
        self.cursor.and_then(|i| self.view.get(i))
    }

    pub fn active(&self) -> Option<&Segment> {
        self.active_id().and_then(|id| self.segments.get(id))
    }

    pub(crate) fn require_active(&self) -> Result<SegmentId, EditError> {
        self.active_id().cloned().ok_or(EditError::EmptyView)
    }

    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.order.iter().position(|s| s == id)
    }

    pub fn view_position(&self, id: &SegmentId) -> Option<usize> {
        self.view.iter().position(|s| s == id)
    }

    pub fn active_layer(&self) -> Option<&str> {
        self.active_layer.as_deref()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Human readable description of the active filter
    pub fn filter_label(&self) -> Option<String> {
        self.filter.as_ref().map(Filter::label)
    }

    pub fn taxonomy(&self) -> Option<&Taxonomy> {
        self.taxonomy.as_ref()
    }

    pub(crate) fn require_taxonomy(&self) -> Result<&Taxonomy, EditError> {
        self.taxonomy.as_ref().ok_or(EditError::NoTaxonomy)
    }

    /// Status line: 1-based position, view size, and filter
    pub fn status(&self) -> String {
        let position = self.cursor.map(|c| c + 1).unwrap_or(0);
        match self.filter_label() {
            Some(label) => format!("{}/{} - Filter: {}", position, self.view.len(), label),
            None => format!("{}/{}", position, self.view.len()),
        }
    }

    // ----- cursor bookkeeping -----

    /// Put the cursor on `id` if it is visible, else on `fallback` clamped
    /// to the view
    pub(crate) fn focus(&mut self, id: Option<&SegmentId>, fallback: Option<usize>) {
        if let Some(pos) = id.and_then(|id| self.view_position(id)) {
            self.cursor = Some(pos);
            return;
        }
        self.cursor = match (self.view.len(), fallback) {
            (0, _) => None,
            (len, Some(i)) => Some(i.min(len - 1)),
            (_, None) => Some(0),
        };
    }

    /// Every link must point at a live segment and be mirrored on the other end
    pub(crate) fn check_links(&self) -> Result<(), String> {
        for segment in self.segments.values() {
            for link in segment.outgoing() {
                let target = self
                    .segments
                    .get(&link.segment)
                    .ok_or_else(|| format!("{} links to missing {}", segment.id, link.segment))?;
                if !target
                    .incoming()
                    .iter()
                    .any(|l| l.segment == segment.id && l.link_type == link.link_type)
                {
                    return Err(format!("link {} -> {} not mirrored", segment.id, link.segment));
                }
            }
            for link in segment.incoming() {
                let source = self
                    .segments
                    .get(&link.segment)
                    .ok_or_else(|| format!("{} linked from missing {}", segment.id, link.segment))?;
                if !source
                    .outgoing()
                    .iter()
                    .any(|l| l.segment == segment.id && l.link_type == link.link_type)
                {
                    return Err(format!("incoming {} <- {} not mirrored", segment.id, link.segment));
                }
            }
        }
        Ok(())
    }

    /// Check every structural invariant; used by tests
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.order.len() != self.segments.len() {
            return Err(format!(
                "order has {} ids but arena has {} segments",
                self.order.len(),
                self.segments.len()
            ));
        }
        let unique: HashSet<_> = self.order.iter().collect();
        if unique.len() != self.order.len() {
            return Err("duplicate id in order".to_string());
        }

        // view is an order-preserving subsequence of order
        let mut rest = self.order.iter();
        for id in &self.view {
            if !rest.any(|o| o == id) {
                return Err(format!("view id {} breaks subsequence order", id));
            }
        }

        match (self.view.len(), self.cursor) {
            (0, None) => {}
            (0, Some(c)) => return Err(format!("cursor {} set on empty view", c)),
            (_, None) => return Err("cursor unset on non-empty view".to_string()),
            (len, Some(c)) if c >= len => return Err(format!("cursor {} out of {}", c, len)),
            _ => {}
        }

        for segment in self.segments.values() {
            let expected: Vec<&str> = segment.raw().split_whitespace().collect();
            if segment.tokens() != expected.as_slice() {
                return Err(format!("tokens of {} out of sync", segment.id));
            }
        }
        self.check_links()?;

        if let Some(taxonomy) = &self.taxonomy {
            for segment in self.segments.values() {
                for (layer, annotation) in &segment.annotations {
                    if !taxonomy.has_layer(layer) {
                        return Err(format!("{} annotated with unknown layer {}", segment.id, layer));
                    }
                    if let Some(label) = &annotation.label {
                        if !taxonomy.has_label(layer, label) {
                            return Err(format!("{} uses unknown label {}", segment.id, label));
                        }
                    }
                    if let Some(qualifier) = &annotation.qualifier {
                        if !taxonomy.has_qualifier(layer, qualifier) {
                            return Err(format!("{} uses unknown qualifier {}", segment.id, qualifier));
                        }
                    }
                }
                for link in segment.outgoing() {
                    if !taxonomy.has_link_type(&link.link_type) {
                        return Err(format!("{} uses unknown link type {}", segment.id, link.link_type));
                    }
                }
            }
        }
        Ok(())
    }
}

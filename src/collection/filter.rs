//! Filtered views
//!
//! A filter rebuilds the view as the order-preserving subsequence of
//! segments it accepts. The cursor then lands on the nearest match at or
//! after the previously active segment, falling back to the nearest match
//! before it.

use super::SegmentCollection;
use crate::error::EditError;
use crate::models::{Segment, SegmentId};
use crate::undo::{Change, Command, ViewState};
use serde::{Deserialize, Serialize};

/// Predicate description for a filtered view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Live label in a layer
    Label { layer: String, label: String },
    /// Legacy (imported) label in a layer
    LegacyLabel { layer: String, label: String },
    /// Any live or legacy annotation in a layer
    Layer { layer: String },
    Participant { participant: String },
}

impl Filter {
    pub fn matches(&self, segment: &Segment) -> bool {
        match self {
            Filter::Label { layer, label } => segment.label(layer) == Some(label.as_str()),
            Filter::LegacyLabel { layer, label } => segment
                .legacy_annotation(layer)
                .and_then(|a| a.label.as_deref())
                == Some(label.as_str()),
            Filter::Layer { layer } => {
                segment.annotation(layer).is_some() || segment.legacy_annotation(layer).is_some()
            }
            Filter::Participant { participant } => &segment.participant == participant,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Filter::Label { label, .. } => format!("[{}]", label),
            Filter::LegacyLabel { label, .. } => format!("(({}))", label),
            Filter::Layer { layer } => format!("|{}|", layer),
            Filter::Participant { participant } => format!("@{}", participant),
        }
    }

    pub(crate) fn rename_layer(&mut self, old: &str, new: &str) {
        match self {
            Filter::Label { layer, .. } | Filter::Layer { layer } if layer.as_str() == old => {
                *layer = new.to_string();
            }
            _ => {}
        }
    }

    pub(crate) fn rename_label(&mut self, in_layer: &str, old: &str, new: &str) {
        if let Filter::Label { layer, label } = self {
            if layer.as_str() == in_layer && label.as_str() == old {
                *label = new.to_string();
            }
        }
    }
}

impl SegmentCollection {
    fn view_state(&self) -> ViewState {
        ViewState {
            view: self.view.clone(),
            cursor: self.cursor,
            filter: self.filter.clone(),
        }
    }

    /// Replace the view with the segments accepted by `filter`
    pub fn filter_by(&mut self, filter: Filter) -> Command {
        let before = self.view_state();
        let previous = self.active_id().and_then(|id| self.position(id)).unwrap_or(0);

        self.view = self
            .order
            .iter()
            .filter(|id| self.segments.get(*id).is_some_and(|s| filter.matches(s)))
            .cloned()
            .collect();
        log::debug!("Filter {} keeps {} of {} segments", filter.label(), self.view.len(), self.order.len());
        self.filter = Some(filter);
        self.finish_filter(previous);

        Command::View(Box::new(Change::new(before, self.view_state())))
    }

    /// Scan forward from `previous` to the end of the full order, then
    /// backward from just before it, and land on the first visible segment
    fn finish_filter(&mut self, previous: usize) {
        let forward = self.order.iter().skip(previous);
        let backward = self.order.iter().take(previous).rev();
        let target: Option<SegmentId> = forward
            .chain(backward)
            .find(|id| self.view.contains(*id))
            .cloned();
        self.cursor = target.and_then(|id| self.view_position(&id));
    }

    /// Restore the full view, staying on the active segment
    ///
    /// Returns `None` when no filter is active.
    pub fn remove_filter(&mut self) -> Option<Command> {
        self.filter.as_ref()?;
        let before = self.view_state();
        let active = self.active_id().cloned();

        self.view = self.order.clone();
        self.filter = None;
        self.focus(active.as_ref(), Some(0));

        Some(Command::View(Box::new(Change::new(before, self.view_state()))))
    }

    /// Toggle a filter on the active segment's label in the active layer
    ///
    /// A live label is preferred over a legacy one.
    pub fn toggle_label_filter(&mut self) -> Result<Command, EditError> {
        if let Some(cmd) = self.remove_filter() {
            return Ok(cmd);
        }
        let layer = self.active_layer.clone().ok_or(EditError::NoTaxonomy)?;
        let active = self.active().ok_or(EditError::EmptyView)?;

        let filter = if let Some(label) = active.label(&layer) {
            Filter::Label {
                layer: layer.clone(),
                label: label.to_string(),
            }
        } else if let Some(label) = active.legacy_annotation(&layer).and_then(|a| a.label.clone()) {
            Filter::LegacyLabel { layer, label }
        } else {
            return Err(EditError::NotAnnotated(layer));
        };
        Ok(self.filter_by(filter))
    }

    /// Toggle a filter on segments annotated in the active layer
    pub fn toggle_layer_filter(&mut self) -> Result<Command, EditError> {
        if let Some(cmd) = self.remove_filter() {
            return Ok(cmd);
        }
        let layer = self.active_layer.clone().ok_or(EditError::NoTaxonomy)?;
        Ok(self.filter_by(Filter::Layer { layer }))
    }
}

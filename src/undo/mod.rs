//! Undo/redo command history
//!
//! Every mutation of a [`SegmentCollection`] is described by a reversible
//! [`Command`]. Field-level edits carry their own before/after values;
//! structural and taxonomy edits carry a [`Patch`] holding before/after
//! images of just the segments they touched plus splices on the full
//! order and on the view.

use crate::collection::{Filter, SegmentCollection};
use crate::error::EditError;
use crate::models::{Annotation, Segment, SegmentId, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A value before and after an edit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change<T> {
    pub before: T,
    pub after: T,
}

impl<T: Clone> Change<T> {
    pub fn new(before: T, after: T) -> Self {
        Self { before, after }
    }

    pub fn inverse(&self) -> Self {
        Self {
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }
}

/// Replace `removed` ids at `index` with `inserted` ids
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Splice {
    pub index: usize,
    pub removed: Vec<SegmentId>,
    pub inserted: Vec<SegmentId>,
}

impl Splice {
    pub fn new(index: usize, removed: Vec<SegmentId>, inserted: Vec<SegmentId>) -> Self {
        Self { index, removed, inserted }
    }

    pub fn apply(&self, ids: &mut Vec<SegmentId>) {
        let start = self.index.min(ids.len());
        let end = (start + self.removed.len()).min(ids.len());
        ids.splice(start..end, self.inserted.iter().cloned());
    }

    pub fn inverse(&self) -> Self {
        Self {
            index: self.index,
            removed: self.inserted.clone(),
            inserted: self.removed.clone(),
        }
    }
}

/// Before/after image of one segment (`None` = absent)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentChange {
    pub id: SegmentId,
    pub before: Option<Segment>,
    pub after: Option<Segment>,
}

impl SegmentChange {
    fn inverse(&self) -> Self {
        Self {
            id: self.id.clone(),
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }
}

/// Minimal description of a structural or taxonomy edit
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub segments: Vec<SegmentChange>,
    pub order: Option<Splice>,
    pub view: Option<Splice>,
    pub cursor: Option<Change<Option<usize>>>,
    pub taxonomy: Option<Box<Change<Option<Taxonomy>>>>,
    pub active_layer: Option<Change<Option<String>>>,
    pub filter: Option<Change<Option<Filter>>>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
            && self.order.is_none()
            && self.view.is_none()
            && self.cursor.as_ref().map_or(true, |c| c.before == c.after)
            && self.taxonomy.is_none()
            && self.active_layer.is_none()
            && self.filter.is_none()
    }

    fn apply(&self, collection: &mut SegmentCollection) {
        for change in &self.segments {
            match &change.after {
                Some(segment) => {
                    collection.segments.insert(change.id.clone(), segment.clone());
                }
                None => {
                    collection.segments.remove(&change.id);
                }
            }
        }
        if let Some(splice) = &self.order {
            splice.apply(&mut collection.order);
        }
        if let Some(splice) = &self.view {
            splice.apply(&mut collection.view);
        }
        if let Some(taxonomy) = &self.taxonomy {
            collection.taxonomy = taxonomy.after.clone();
        }
        if let Some(layer) = &self.active_layer {
            collection.active_layer = layer.after.clone();
        }
        if let Some(filter) = &self.filter {
            collection.filter = filter.after.clone();
        }
        if let Some(cursor) = &self.cursor {
            collection.cursor = cursor.after;
        }
    }

    fn inverse(&self) -> Patch {
        Patch {
            segments: self.segments.iter().map(SegmentChange::inverse).collect(),
            order: self.order.as_ref().map(Splice::inverse),
            view: self.view.as_ref().map(Splice::inverse),
            cursor: self.cursor.as_ref().map(Change::inverse),
            taxonomy: self.taxonomy.as_ref().map(|t| Box::new(t.inverse())),
            active_layer: self.active_layer.as_ref().map(Change::inverse),
            filter: self.filter.as_ref().map(Change::inverse),
        }
    }
}

/// View, cursor and filter together (filtering replaces all three)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub view: Vec<SegmentId>,
    pub cursor: Option<usize>,
    pub filter: Option<Filter>,
}

/// Represents a reversible edit command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Cursor movement
    GoTo { from: Option<usize>, to: Option<usize> },
    /// Annotation record of one segment under one layer
    SetAnnotation {
        segment: SegmentId,
        layer: String,
        before: Option<Annotation>,
        after: Option<Annotation>,
    },
    SetNote {
        segment: SegmentId,
        before: Option<String>,
        after: Option<String>,
    },
    SetActiveLayer(Change<Option<String>>),
    /// Filter applied or removed
    View(Box<Change<ViewState>>),
    /// Structural or taxonomy edit
    Edit(Patch),
    /// Commands grouped into one undo unit
    Batch { commands: Vec<Command> },
}

impl Command {
    /// Execute this command on the collection
    pub fn execute(&self, collection: &mut SegmentCollection) -> Result<(), EditError> {
        match self {
            Command::GoTo { to, .. } => {
                collection.cursor = *to;
                Ok(())
            }
            Command::SetAnnotation { segment, layer, after, .. } => {
                let s = collection.segment_mut(segment)?;
                s.set_annotation(layer, after.clone());
                Ok(())
            }
            Command::SetNote { segment, after, .. } => {
                let s = collection.segment_mut(segment)?;
                s.note = after.clone();
                Ok(())
            }
            Command::SetActiveLayer(change) => {
                collection.active_layer = change.after.clone();
                Ok(())
            }
            Command::View(change) => {
                collection.view = change.after.view.clone();
                collection.cursor = change.after.cursor;
                collection.filter = change.after.filter.clone();
                Ok(())
            }
            Command::Edit(patch) => {
                patch.apply(collection);
                Ok(())
            }
            Command::Batch { commands } => {
                for cmd in commands {
                    cmd.execute(collection)?;
                }
                Ok(())
            }
        }
    }

    /// Undo this command (reverse the operation)
    pub fn undo(&self, collection: &mut SegmentCollection) -> Result<(), EditError> {
        self.inverse().execute(collection)
    }

    /// The command that reverts this one
    pub fn inverse(&self) -> Command {
        match self {
            Command::GoTo { from, to } => Command::GoTo { from: *to, to: *from },
            Command::SetAnnotation { segment, layer, before, after } => Command::SetAnnotation {
                segment: segment.clone(),
                layer: layer.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            Command::SetNote { segment, before, after } => Command::SetNote {
                segment: segment.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            Command::SetActiveLayer(change) => Command::SetActiveLayer(change.inverse()),
            Command::View(change) => Command::View(Box::new(change.inverse())),
            Command::Edit(patch) => Command::Edit(patch.inverse()),
            Command::Batch { commands } => Command::Batch {
                commands: commands.iter().rev().map(Command::inverse).collect(),
            },
        }
    }

    /// Navigation does not fork the history
    pub fn is_navigation(&self) -> bool {
        matches!(self, Command::GoTo { .. })
    }
}

/// Linear undo/redo history with grouping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UndoStack {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
    /// Maximum number of commands to keep in history
    max_size: usize,
    /// Current group being accumulated (if any)
    #[serde(skip)]
    current_batch: Option<Vec<Command>>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PartialEq for UndoStack {
    fn eq(&self, other: &Self) -> bool {
        // Transient batch state is not part of the history
        self.undo == other.undo && self.redo == other.redo && self.max_size == other.max_size
    }
}

impl UndoStack {
    /// Create a new undo stack with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_size: max_size.max(1),
            current_batch: None,
        }
    }

    /// Record an already executed command
    ///
    /// Inside a group the command joins the group. Navigation goes on the
    /// undo stack without clearing redo; anything else clears redo.
    pub fn push(&mut self, command: Command) {
        if let Some(batch) = self.current_batch.as_mut() {
            batch.push(command);
            return;
        }
        if !command.is_navigation() {
            self.redo.clear();
        }
        self.push_undo(command);
    }

    fn push_undo(&mut self, command: Command) {
        self.undo.push_back(command);
        if self.undo.len() > self.max_size {
            self.undo.pop_front();
        }
    }

    /// Start grouping subsequent commands into one undo unit
    pub fn begin_batch(&mut self) {
        if self.current_batch.is_none() {
            self.current_batch = Some(Vec::new());
        }
    }

    pub fn in_batch(&self) -> bool {
        self.current_batch.is_some()
    }

    /// Close the current group and add it to the undo stack
    pub fn finalize_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if batch.is_empty() {
                return;
            }
            let command = if batch.len() == 1 {
                batch.into_iter().next().unwrap_or(Command::Batch { commands: Vec::new() })
            } else {
                Command::Batch { commands: batch }
            };
            self.push(command);
        }
    }

    /// Revert a group that failed half way and drop it
    pub fn abort_batch(&mut self, collection: &mut SegmentCollection) -> Result<(), EditError> {
        if let Some(batch) = self.current_batch.take() {
            for command in batch.iter().rev() {
                command.undo(collection)?;
            }
        }
        Ok(())
    }

    /// Undo the last command
    pub fn undo(&mut self, collection: &mut SegmentCollection) -> Result<(), EditError> {
        // Finalize any pending batch first
        self.finalize_batch();

        let command = self.undo.pop_back().ok_or(EditError::NothingToUndo)?;
        if let Err(e) = command.undo(collection) {
            self.undo.push_back(command);
            return Err(e);
        }
        log::debug!("Undo: {}", command.describe());
        self.redo.push(command);
        Ok(())
    }

    /// Redo the last undone command
    pub fn redo(&mut self, collection: &mut SegmentCollection) -> Result<(), EditError> {
        self.finalize_batch();

        let command = self.redo.pop().ok_or(EditError::NothingToRedo)?;
        if let Err(e) = command.execute(collection) {
            self.redo.push(command);
            return Err(e);
        }
        log::debug!("Redo: {}", command.describe());
        self.push_undo(command);
        Ok(())
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.current_batch = None;
    }

    /// Get the number of available undo steps
    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    /// Get the number of available redo steps
    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }
}

impl Command {
    fn describe(&self) -> &'static str {
        match self {
            Command::GoTo { .. } => "go to",
            Command::SetAnnotation { .. } => "annotation",
            Command::SetNote { .. } => "note",
            Command::SetActiveLayer(_) => "active layer",
            Command::View(_) => "filter",
            Command::Edit(_) => "edit",
            Command::Batch { .. } => "batch",
        }
    }
}

/// Captures before-images while an edit mutates the collection
pub(crate) struct Recorder {
    segments: Vec<(SegmentId, Option<Segment>)>,
    cursor: Option<usize>,
    active_layer: Option<String>,
    filter: Option<Filter>,
    taxonomy: Option<Option<Taxonomy>>,
}

impl Recorder {
    pub(crate) fn start(collection: &SegmentCollection) -> Self {
        Self {
            segments: Vec::new(),
            cursor: collection.cursor,
            active_layer: collection.active_layer.clone(),
            filter: collection.filter.clone(),
            taxonomy: None,
        }
    }

    /// Remember a segment as it is now (first touch wins)
    pub(crate) fn touch(&mut self, collection: &SegmentCollection, id: &SegmentId) {
        if self.segments.iter().any(|(seen, _)| seen == id) {
            return;
        }
        self.segments.push((id.clone(), collection.segments.get(id).cloned()));
    }

    pub(crate) fn touch_all<'a>(
        &mut self,
        collection: &SegmentCollection,
        ids: impl IntoIterator<Item = &'a SegmentId>,
    ) {
        for id in ids {
            self.touch(collection, id);
        }
    }

    pub(crate) fn track_taxonomy(&mut self, collection: &SegmentCollection) {
        if self.taxonomy.is_none() {
            self.taxonomy = Some(collection.taxonomy.clone());
        }
    }

    pub(crate) fn finish(
        self,
        collection: &SegmentCollection,
        order: Option<Splice>,
        view: Option<Splice>,
    ) -> Patch {
        let segments = self
            .segments
            .into_iter()
            .filter_map(|(id, before)| {
                let after = collection.segments.get(&id).cloned();
                (before != after).then_some(SegmentChange { id, before, after })
            })
            .collect();

        Patch {
            segments,
            order,
            view,
            // always absolute: navigation may run between undo and redo
            cursor: Some(Change::new(self.cursor, collection.cursor)),
            taxonomy: self
                .taxonomy
                .and_then(|before| changed(before, collection.taxonomy.clone()))
                .map(Box::new),
            active_layer: changed(self.active_layer, collection.active_layer.clone()),
            filter: changed(self.filter, collection.filter.clone()),
        }
    }
}

fn changed<T: PartialEq + Clone>(before: T, after: T) -> Option<Change<T>> {
    (before != after).then(|| Change::new(before, after))
}

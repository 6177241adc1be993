//! Annotation session
//!
//! [`Annotator`] owns one [`SegmentCollection`] and the [`UndoStack`] that
//! records what happens to it. Each public method is one user gesture: it
//! runs the collection operation and records the resulting command. A
//! declined gesture returns the error and records nothing.

use crate::collection::{Filter, SegmentCollection};
use crate::config::AnnotatorConfig;
use crate::error::{EditError, PersistError};
use crate::io::{self, snapshot};
use crate::models::{SegmentId, Taxonomy};
use crate::undo::{Command, UndoStack};
use std::path::Path;

#[derive(Debug)]
pub struct Annotator {
    collection: SegmentCollection,
    history: UndoStack,
    config: AnnotatorConfig,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

impl Annotator {
    pub fn new(config: AnnotatorConfig) -> Self {
        Self::with_collection(SegmentCollection::new(), config)
    }

    pub fn with_collection(collection: SegmentCollection, config: AnnotatorConfig) -> Self {
        Self {
            collection,
            history: UndoStack::new(config.history_limit),
            config,
        }
    }

    pub fn collection(&self) -> &SegmentCollection {
        &self.collection
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn status(&self) -> String {
        self.collection.status()
    }

    // ----- recording -----

    fn commit(&mut self, command: Command) {
        if matches!(&command, Command::Edit(patch) if patch.is_empty()) {
            return;
        }
        let navigation = command.is_navigation();
        self.history.push(command);
        if !navigation && !self.history.in_batch() {
            self.backup();
        }
    }

    fn record(&mut self, result: Result<Command, EditError>) -> Result<(), EditError> {
        match result {
            Ok(command) => {
                self.commit(command);
                Ok(())
            }
            Err(e) => {
                log::debug!("Declined: {}", e);
                Err(e)
            }
        }
    }

    fn record_navigation(&mut self, command: Option<Command>) -> bool {
        match command {
            Some(command) => {
                self.commit(command);
                true
            }
            None => false,
        }
    }

    /// Run several gestures as one undo unit
    ///
    /// If any of them fails, the ones already applied are reverted and the
    /// error is returned. Nested groups join the outer one.
    pub fn group<T>(&mut self, gestures: impl FnOnce(&mut Self) -> Result<T, EditError>) -> Result<T, EditError> {
        if self.history.in_batch() {
            return gestures(self);
        }
        self.history.begin_batch();
        match gestures(self) {
            Ok(value) => {
                self.history.finalize_batch();
                self.backup();
                Ok(value)
            }
            Err(e) => {
                self.history.abort_batch(&mut self.collection)?;
                Err(e)
            }
        }
    }

    /// Fire-and-forget snapshot after an edit, when configured
    fn backup(&self) {
        if let Some(path) = self.config.backup_target() {
            if let Err(e) = snapshot::save(&self.collection, path) {
                log::error!("Backup to {} failed: {}", path.display(), e);
            }
        }
    }

    // ----- history -----

    pub fn undo(&mut self) -> Result<(), EditError> {
        self.history.undo(&mut self.collection)
    }

    pub fn redo(&mut self) -> Result<(), EditError> {
        self.history.redo(&mut self.collection)
    }

    // ----- navigation -----

    /// Returns whether the cursor moved
    pub fn next(&mut self, n: usize) -> bool {
        let command = self.collection.next(n);
        self.record_navigation(command)
    }

    pub fn previous(&mut self, n: usize) -> bool {
        let command = self.collection.previous(n);
        self.record_navigation(command)
    }

    pub fn go_to(&mut self, index: usize) -> bool {
        let command = self.collection.go_to(index);
        self.record_navigation(command)
    }

    // ----- filtering -----

    pub fn filter_by(&mut self, filter: Filter) {
        let command = self.collection.filter_by(filter);
        self.commit(command);
    }

    /// Returns whether a filter was active
    pub fn remove_filter(&mut self) -> bool {
        match self.collection.remove_filter() {
            Some(command) => {
                self.commit(command);
                true
            }
            None => false,
        }
    }

    pub fn toggle_label_filter(&mut self) -> Result<(), EditError> {
        let result = self.collection.toggle_label_filter();
        self.record(result)
    }

    pub fn toggle_layer_filter(&mut self) -> Result<(), EditError> {
        let result = self.collection.toggle_layer_filter();
        self.record(result)
    }

    // ----- structure -----

    pub fn split(&mut self, token: &str) -> Result<(), EditError> {
        let result = self.collection.split_active(token);
        self.record(result)
    }

    /// Split the active segment and label the first half in one undo unit
    pub fn split_and_label(&mut self, token: &str, label: &str) -> Result<(), EditError> {
        self.group(|a| {
            a.split(token)?;
            a.set_label(label)
        })
    }

    pub fn merge_with_previous(&mut self) -> Result<(), EditError> {
        let result = self.collection.merge_with_previous();
        self.record(result)
    }

    pub fn merge(&mut self, receiver: &SegmentId, donor: &SegmentId) -> Result<(), EditError> {
        let result = self.collection.merge(receiver, donor);
        self.record(result)
    }

    pub fn delete_segment(&mut self) -> Result<(), EditError> {
        let result = self.collection.delete_active();
        self.record(result)
    }

    // ----- links -----

    /// Link the active segment to an earlier one
    pub fn link_to(&mut self, target: &SegmentId, link_type: &str) -> Result<(), EditError> {
        let source = self.collection.require_active()?;
        let result = self.collection.create_link(&source, target, link_type);
        self.record(result)
    }

    pub fn create_link(&mut self, source: &SegmentId, target: &SegmentId, link_type: &str) -> Result<(), EditError> {
        let result = self.collection.create_link(source, target, link_type);
        self.record(result)
    }

    pub fn remove_links(&mut self, source: &SegmentId, target: &SegmentId) -> Result<(), EditError> {
        let result = self.collection.remove_links(source, target);
        self.record(result)
    }

    /// Remove every outgoing link of the active segment
    pub fn unlink_all(&mut self) -> Result<(), EditError> {
        let source = self.collection.require_active()?;
        let result = self.collection.unlink_all(&source);
        self.record(result)
    }

    // ----- annotation entry (active segment, active layer) -----

    fn active_target(&self) -> Result<(SegmentId, String), EditError> {
        let id = self.collection.require_active()?;
        let layer = self.collection.active_layer().ok_or(EditError::NoTaxonomy)?;
        Ok((id, layer.to_string()))
    }

    pub fn set_label(&mut self, label: &str) -> Result<(), EditError> {
        let (id, layer) = self.active_target()?;
        let result = self.collection.set_label(&id, &layer, label);
        self.record(result)
    }

    pub fn set_qualifier(&mut self, qualifier: &str) -> Result<(), EditError> {
        let (id, layer) = self.active_target()?;
        let result = self.collection.set_qualifier(&id, &layer, qualifier);
        self.record(result)
    }

    pub fn erase_annotation(&mut self) -> Result<(), EditError> {
        let (id, layer) = self.active_target()?;
        let result = self.collection.erase_annotation(&id, &layer);
        self.record(result)
    }

    pub fn erase_qualifier(&mut self) -> Result<(), EditError> {
        let (id, layer) = self.active_target()?;
        let result = self.collection.erase_qualifier(&id, &layer);
        self.record(result)
    }

    /// Empty text clears the note
    pub fn set_note(&mut self, text: &str) -> Result<(), EditError> {
        let id = self.collection.require_active()?;
        let result = self.collection.set_note(&id, text);
        self.record(result)
    }

    pub fn set_active_layer(&mut self, layer: &str) -> Result<(), EditError> {
        let result = self.collection.set_active_layer(layer);
        self.record(result)
    }

    pub fn promote_legacy(&mut self) -> Result<(), EditError> {
        let result = self.collection.promote_legacy();
        self.record(result)
    }

    // ----- taxonomy -----

    pub fn set_taxonomy(&mut self, taxonomy: Taxonomy) {
        let command = self.collection.set_taxonomy(taxonomy);
        self.commit(command);
    }

    pub fn add_layer(&mut self, layer: &str) -> Result<(), EditError> {
        let result = self.collection.add_layer(layer);
        self.record(result)
    }

    pub fn add_label(&mut self, layer: &str, label: &str) -> Result<(), EditError> {
        let result = self.collection.add_label(layer, label);
        self.record(result)
    }

    pub fn add_qualifier(&mut self, layer: &str, qualifier: &str) -> Result<(), EditError> {
        let result = self.collection.add_qualifier(layer, qualifier);
        self.record(result)
    }

    pub fn add_link_type(&mut self, link_type: &str, color: Option<String>) -> Result<(), EditError> {
        let result = self.collection.add_link_type(link_type, color);
        self.record(result)
    }

    pub fn rename_layer(&mut self, layer: &str, new_layer: &str) -> Result<(), EditError> {
        let result = self.collection.rename_layer(layer, new_layer);
        self.record(result)
    }

    pub fn rename_label(&mut self, layer: &str, label: &str, new_label: &str) -> Result<(), EditError> {
        let result = self.collection.rename_label(layer, label, new_label);
        self.record(result)
    }

    pub fn rename_qualifier(&mut self, layer: &str, qualifier: &str, new_qualifier: &str) -> Result<(), EditError> {
        let result = self.collection.rename_qualifier(layer, qualifier, new_qualifier);
        self.record(result)
    }

    pub fn rename_link_type(&mut self, link_type: &str, new_link_type: &str) -> Result<(), EditError> {
        let result = self.collection.rename_link_type(link_type, new_link_type);
        self.record(result)
    }

    pub fn delete_layer(&mut self, layer: &str) -> Result<(), EditError> {
        let result = self.collection.delete_layer(layer);
        self.record(result)
    }

    pub fn delete_label(&mut self, layer: &str, label: &str) -> Result<(), EditError> {
        let result = self.collection.delete_label(layer, label);
        self.record(result)
    }

    pub fn delete_qualifier(&mut self, layer: &str, qualifier: &str) -> Result<(), EditError> {
        let result = self.collection.delete_qualifier(layer, qualifier);
        self.record(result)
    }

    pub fn delete_link_type(&mut self, link_type: &str) -> Result<(), EditError> {
        let result = self.collection.delete_link_type(link_type);
        self.record(result)
    }

    // ----- files -----

    fn replace(&mut self, collection: SegmentCollection) {
        self.collection = collection;
        self.history.clear();
    }

    /// Load a taxonomy document in place of the current taxonomy (undoable)
    pub fn load_taxonomy(&mut self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let taxonomy = Taxonomy::load(path).map_err(log_failure)?;
        self.set_taxonomy(taxonomy);
        Ok(())
    }

    pub fn save_taxonomy(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        match self.collection.taxonomy() {
            Some(taxonomy) => taxonomy.save(path).map_err(log_failure),
            None => Ok(()),
        }
    }

    /// Replace the session with a transcript; the taxonomy is kept
    pub fn import(&mut self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let taxonomy = self.collection.taxonomy().cloned();
        let collection = io::import_collection(path, taxonomy).map_err(log_failure)?;
        self.replace(collection);
        Ok(())
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        io::export_collection(&self.collection, path).map_err(log_failure)
    }

    /// Replace the session with a saved snapshot
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let collection = snapshot::load(path).map_err(log_failure)?;
        self.replace(collection);
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        snapshot::save(&self.collection, path).map_err(log_failure)
    }

    /// Drop the session, keeping the taxonomy
    pub fn close(&mut self) {
        let taxonomy = self.collection.taxonomy().cloned();
        self.replace(SegmentCollection::from_segments(Vec::new(), taxonomy));
    }
}

fn log_failure(e: PersistError) -> PersistError {
    log::error!("{}", e);
    e
}

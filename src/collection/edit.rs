//! Structural edits and annotation writes
//!
//! Split and merge correct automatic sentence boundaries. Their link rules
//! keep every reference pointing at a segment that still exists:
//!
//! - split: outgoing links stay with the first half, every back reference
//!   to the original moves to the second half
//! - merge: links between the pair are dropped, the donor's outgoing links
//!   replace the receiver's, and back references to the donor move to the
//!   receiver

use super::SegmentCollection;
use crate::error::EditError;
use crate::models::{Annotation, SegmentId};
use crate::undo::{Change, Command, Recorder, Splice};

impl SegmentCollection {
    /// Split `id` after the first occurrence of `token`
    pub fn split(&mut self, id: &SegmentId, token: &str) -> Result<Command, EditError> {
        let segment = self.require(id)?;
        let at = segment
            .split_point(token)
            .ok_or_else(|| EditError::NotSplittable(token.to_string()))?;
        let (mut first, second) = segment.halves(at);
        first.outgoing = segment.outgoing.clone();

        let full_index = self
            .position(id)
            .ok_or_else(|| EditError::UnknownSegment(id.to_string()))?;
        let view_index = self.view_position(id);
        let holders = self.link_sources(id);
        let targets = self.link_targets(id);
        let (first_id, second_id) = (first.id.clone(), second.id.clone());

        let mut recorder = Recorder::start(self);
        recorder.touch(self, id);
        recorder.touch_all(self, holders.iter().chain(&targets));
        recorder.touch_all(self, [&first_id, &second_id]);

        self.segments.insert(first_id.clone(), first);
        self.segments.insert(second_id.clone(), second);
        for target in &targets {
            self.resource(target, id, &first_id);
        }
        for holder in &holders {
            self.retarget(holder, id, &second_id);
        }
        self.segments.remove(id);

        let active = self.active_id().cloned();
        let cursor = self.cursor;
        let halves = vec![first_id.clone(), second_id];
        let order = Splice::new(full_index, vec![id.clone()], halves.clone());
        order.apply(&mut self.order);
        let view = view_index.map(|i| Splice::new(i, vec![id.clone()], halves));
        if let Some(splice) = &view {
            splice.apply(&mut self.view);
        }
        let focus = if active.as_ref() == Some(id) { Some(first_id) } else { active };
        self.focus(focus.as_ref(), cursor);

        log::debug!("Split {} after token {} ('{}')", id, at, token);
        Ok(Command::Edit(recorder.finish(self, Some(order), view)))
    }

    /// Split the active segment
    pub fn split_active(&mut self, token: &str) -> Result<Command, EditError> {
        let id = self.require_active()?;
        self.split(&id, token)
    }

    /// Merge `donor` into `receiver`; `donor` must immediately precede
    /// `receiver` in the view and belong to the same participant
    pub fn merge(&mut self, receiver: &SegmentId, donor: &SegmentId) -> Result<Command, EditError> {
        let r = self.require(receiver)?;
        let d = self.require(donor)?;
        if r.participant != d.participant {
            return Err(EditError::ParticipantMismatch(
                d.participant.clone(),
                r.participant.clone(),
            ));
        }
        let donor_view = self.view_position(donor).ok_or(EditError::NotAdjacent)?;
        match self.view_position(receiver) {
            Some(rv) if rv == donor_view + 1 => {}
            _ => return Err(EditError::NotAdjacent),
        }
        let donor_full = self
            .position(donor)
            .ok_or_else(|| EditError::UnknownSegment(donor.to_string()))?;

        let mut recorder = Recorder::start(self);
        recorder.touch_all(self, [receiver, donor]);
        recorder.touch_all(self, &self.neighbours(receiver));
        recorder.touch_all(self, &self.neighbours(donor));

        // no self link survives
        self.detach(receiver, donor);
        self.detach(donor, receiver);

        // receiver's own outgoing links are discarded
        for target in self.link_targets(receiver) {
            self.detach(receiver, &target);
        }

        // donor's outgoing links move to the receiver
        for target in self.link_targets(donor) {
            self.resource(&target, donor, receiver);
        }
        let donated = self.segment_mut(donor).map(|d| std::mem::take(&mut d.outgoing))?;
        self.segment_mut(receiver)?.outgoing = donated;

        // back references to the donor now point at the receiver
        for holder in self.link_sources(donor) {
            self.retarget(&holder, donor, receiver);
        }

        let donor_segment = self
            .segments
            .remove(donor)
            .ok_or_else(|| EditError::UnknownSegment(donor.to_string()))?;
        self.segment_mut(receiver)?.absorb(&donor_segment);

        let active = self.active_id().cloned();
        let order = Splice::new(donor_full, vec![donor.clone()], Vec::new());
        order.apply(&mut self.order);
        let view = Splice::new(donor_view, vec![donor.clone()], Vec::new());
        view.apply(&mut self.view);
        let focus = match active {
            Some(a) if &a == donor || &a == receiver => Some(receiver.clone()),
            other => other,
        };
        self.focus(focus.as_ref(), Some(donor_view));

        log::debug!("Merged {} into {}", donor, receiver);
        Ok(Command::Edit(recorder.finish(self, Some(order), Some(view))))
    }

    /// Merge the active segment with the one before it in the view
    pub fn merge_with_previous(&mut self) -> Result<Command, EditError> {
        let receiver = self.require_active()?;
        let donor = self
            .cursor
            .and_then(|c| c.checked_sub(1))
            .and_then(|i| self.view.get(i))
            .cloned()
            .ok_or(EditError::NotAdjacent)?;
        self.merge(&receiver, &donor)
    }

    /// Remove a segment and every link touching it
    pub fn delete_segment(&mut self, id: &SegmentId) -> Result<Command, EditError> {
        self.require(id)?;
        let full_index = self
            .position(id)
            .ok_or_else(|| EditError::UnknownSegment(id.to_string()))?;
        let view_index = self.view_position(id);

        let mut recorder = Recorder::start(self);
        recorder.touch(self, id);
        recorder.touch_all(self, &self.neighbours(id));

        self.isolate(id);
        self.segments.remove(id);

        let active = self.active_id().cloned().filter(|a| a != id);
        let cursor = self.cursor;
        let order = Splice::new(full_index, vec![id.clone()], Vec::new());
        order.apply(&mut self.order);
        let view = view_index.map(|i| Splice::new(i, vec![id.clone()], Vec::new()));
        if let Some(splice) = &view {
            splice.apply(&mut self.view);
        }
        self.focus(active.as_ref(), cursor);

        log::debug!("Deleted {}", id);
        Ok(Command::Edit(recorder.finish(self, Some(order), view)))
    }

    pub fn delete_active(&mut self) -> Result<Command, EditError> {
        let id = self.require_active()?;
        self.delete_segment(&id)
    }

    // ----- annotation writes -----

    fn write_annotation(
        &mut self,
        id: &SegmentId,
        layer: &str,
        edit: impl FnOnce(&mut Option<Annotation>),
    ) -> Result<Command, EditError> {
        let segment = self.segment_mut(id)?;
        let before = segment.annotation(layer).cloned();
        let mut after = before.clone();
        edit(&mut after);
        let after = after.filter(|a| !a.is_empty());
        segment.set_annotation(layer, after.clone());
        Ok(Command::SetAnnotation {
            segment: id.clone(),
            layer: layer.to_string(),
            before,
            after,
        })
    }

    pub fn set_label(&mut self, id: &SegmentId, layer: &str, label: &str) -> Result<Command, EditError> {
        let taxonomy = self.require_taxonomy()?;
        if !taxonomy.has_layer(layer) {
            return Err(EditError::UnknownLayer(layer.to_string()));
        }
        if !taxonomy.has_label(layer, label) {
            return Err(EditError::UnknownLabel {
                layer: layer.to_string(),
                label: label.to_string(),
            });
        }
        self.write_annotation(id, layer, |a| {
            a.get_or_insert_with(Annotation::default).label = Some(label.to_string());
        })
    }

    pub fn set_qualifier(&mut self, id: &SegmentId, layer: &str, qualifier: &str) -> Result<Command, EditError> {
        let taxonomy = self.require_taxonomy()?;
        if !taxonomy.has_layer(layer) {
            return Err(EditError::UnknownLayer(layer.to_string()));
        }
        if !taxonomy.has_qualifier(layer, qualifier) {
            return Err(EditError::UnknownQualifier {
                layer: layer.to_string(),
                qualifier: qualifier.to_string(),
            });
        }
        self.write_annotation(id, layer, |a| {
            a.get_or_insert_with(Annotation::default).qualifier = Some(qualifier.to_string());
        })
    }

    /// Remove the whole annotation under `layer`
    pub fn erase_annotation(&mut self, id: &SegmentId, layer: &str) -> Result<Command, EditError> {
        if self.require(id)?.annotation(layer).is_none() {
            return Err(EditError::NotAnnotated(layer.to_string()));
        }
        self.write_annotation(id, layer, |a| *a = None)
    }

    pub fn erase_qualifier(&mut self, id: &SegmentId, layer: &str) -> Result<Command, EditError> {
        if self.require(id)?.qualifier(layer).is_none() {
            return Err(EditError::NotAnnotated(layer.to_string()));
        }
        self.write_annotation(id, layer, |a| {
            if let Some(a) = a {
                a.qualifier = None;
            }
        })
    }

    /// Set the note; an empty string clears it
    pub fn set_note(&mut self, id: &SegmentId, note: &str) -> Result<Command, EditError> {
        let segment = self.segment_mut(id)?;
        let after = (!note.is_empty()).then(|| note.to_string());
        let before = std::mem::replace(&mut segment.note, after.clone());
        Ok(Command::SetNote {
            segment: id.clone(),
            before,
            after,
        })
    }

    pub fn set_active_layer(&mut self, layer: &str) -> Result<Command, EditError> {
        if !self.require_taxonomy()?.has_layer(layer) {
            return Err(EditError::UnknownLayer(layer.to_string()));
        }
        let after = Some(layer.to_string());
        let before = std::mem::replace(&mut self.active_layer, after.clone());
        Ok(Command::SetActiveLayer(Change::new(before, after)))
    }

    /// One-time conversion of legacy annotations and links into live ones
    ///
    /// Only entries the taxonomy knows are promoted, and live fields are
    /// never overwritten.
    pub fn promote_legacy(&mut self) -> Result<Command, EditError> {
        let taxonomy = self.require_taxonomy()?.clone();
        let ids = self.order.clone();

        let mut recorder = Recorder::start(self);
        recorder.touch_all(self, &ids);

        let mut promoted = 0usize;
        for (position, id) in ids.iter().enumerate() {
            let Some(segment) = self.segments.get_mut(id) else { continue };
            for (layer, legacy) in segment.legacy.clone() {
                if !taxonomy.has_layer(&layer) {
                    continue;
                }
                let live = segment.annotations.entry(layer.clone()).or_default();
                if let Some(label) = legacy.label.filter(|l| taxonomy.has_label(&layer, l)) {
                    if live.label.is_none() {
                        live.label = Some(label);
                        promoted += 1;
                    }
                }
                if let Some(qualifier) = legacy.qualifier.filter(|q| taxonomy.has_qualifier(&layer, q)) {
                    if live.qualifier.is_none() {
                        live.qualifier = Some(qualifier);
                        promoted += 1;
                    }
                }
                if live.is_empty() {
                    segment.annotations.remove(&layer);
                }
            }

            let legacy_links = segment.legacy_links.clone();
            for link in legacy_links {
                let earlier = self
                    .position(&link.segment)
                    .is_some_and(|target| target < position);
                let duplicate = self
                    .segments
                    .get(id)
                    .is_some_and(|s| s.outgoing.contains(&link));
                if earlier && !duplicate && taxonomy.has_link_type(&link.link_type) {
                    self.attach(id, &link.segment, &link.link_type);
                    promoted += 1;
                }
            }
        }

        log::info!("Promoted {} legacy annotations and links", promoted);
        Ok(Command::Edit(recorder.finish(self, None, None)))
    }
}

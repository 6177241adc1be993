//! Link graph maintenance
//!
//! Links are directed and typed, from a segment to an earlier one. Each
//! link is stored twice: as `(target, type)` in the source's outgoing list
//! and as `(source, type)` in the target's incoming list. The helpers here
//! are the only code that touches those lists, and they always update both
//! ends.

use super::SegmentCollection;
use crate::error::EditError;
use crate::models::{Link, SegmentId};
use crate::undo::{Command, Recorder};

impl SegmentCollection {
    /// Link `source` to the earlier segment `target`
    pub fn create_link(
        &mut self,
        source: &SegmentId,
        target: &SegmentId,
        link_type: &str,
    ) -> Result<Command, EditError> {
        let taxonomy = self.require_taxonomy()?;
        if !taxonomy.has_link_type(link_type) {
            return Err(EditError::UnknownLinkType(link_type.to_string()));
        }
        let source_segment = self.require(source)?;
        self.require(target)?;

        match (self.position(target), self.position(source)) {
            (Some(t), Some(s)) if t < s => {}
            _ => return Err(EditError::LinkNotEarlier),
        }
        if source_segment
            .outgoing
            .iter()
            .any(|l| &l.segment == target && l.link_type == link_type)
        {
            return Err(EditError::DuplicateLink(link_type.to_string()));
        }

        let mut recorder = Recorder::start(self);
        recorder.touch_all(self, [source, target]);
        self.attach(source, target, link_type);
        log::debug!("Linked {} -> {} ({})", source, target, link_type);
        Ok(Command::Edit(recorder.finish(self, None, None)))
    }

    /// Remove every link from `source` to `target`
    pub fn remove_links(&mut self, source: &SegmentId, target: &SegmentId) -> Result<Command, EditError> {
        self.require(source)?;
        self.require(target)?;

        let mut recorder = Recorder::start(self);
        recorder.touch_all(self, [source, target]);
        self.detach(source, target);
        Ok(Command::Edit(recorder.finish(self, None, None)))
    }

    /// Remove every outgoing link of `source`
    pub fn unlink_all(&mut self, source: &SegmentId) -> Result<Command, EditError> {
        let targets = distinct(self.require(source)?.outgoing.iter().map(|l| &l.segment));

        let mut recorder = Recorder::start(self);
        recorder.touch(self, source);
        recorder.touch_all(self, &targets);
        for target in &targets {
            self.detach(source, target);
        }
        Ok(Command::Edit(recorder.finish(self, None, None)))
    }

    /// Point every link `holder -> old_target` at `new_target` instead
    pub fn replace_link_target(
        &mut self,
        holder: &SegmentId,
        old_target: &SegmentId,
        new_target: &SegmentId,
    ) -> Result<Command, EditError> {
        self.require(holder)?;
        self.require(old_target)?;
        self.require(new_target)?;

        let mut recorder = Recorder::start(self);
        recorder.touch_all(self, [holder, old_target, new_target]);
        self.retarget(holder, old_target, new_target);
        Ok(Command::Edit(recorder.finish(self, None, None)))
    }

    // ----- unrecorded primitives -----

    pub(crate) fn attach(&mut self, source: &SegmentId, target: &SegmentId, link_type: &str) {
        if let Some(s) = self.segments.get_mut(source) {
            s.outgoing.push(Link::new(target.clone(), link_type));
        }
        if let Some(t) = self.segments.get_mut(target) {
            t.incoming.push(Link::new(source.clone(), link_type));
        }
    }

    pub(crate) fn detach(&mut self, source: &SegmentId, target: &SegmentId) {
        if let Some(s) = self.segments.get_mut(source) {
            s.outgoing.retain(|l| &l.segment != target);
        }
        if let Some(t) = self.segments.get_mut(target) {
            t.incoming.retain(|l| &l.segment != source);
        }
    }

    /// Remove every link touching `id`, on both ends
    pub(crate) fn isolate(&mut self, id: &SegmentId) {
        for target in self.link_targets(id) {
            self.detach(id, &target);
        }
        for source in self.link_sources(id) {
            self.detach(&source, id);
        }
    }

    /// Retarget `holder`'s links from `old` to `new`, keeping their position
    /// in `holder`'s outgoing list
    pub(crate) fn retarget(&mut self, holder: &SegmentId, old: &SegmentId, new: &SegmentId) {
        if holder == new {
            self.detach(holder, old);
            return;
        }
        let mut moved = Vec::new();
        if let Some(h) = self.segments.get_mut(holder) {
            for link in h.outgoing.iter_mut().filter(|l| &l.segment == old) {
                link.segment = new.clone();
                moved.push(link.link_type.clone());
            }
            dedupe(&mut h.outgoing);
        }
        if let Some(o) = self.segments.get_mut(old) {
            o.incoming.retain(|l| !(&l.segment == holder && moved.contains(&l.link_type)));
        }
        if let Some(n) = self.segments.get_mut(new) {
            n.incoming
                .extend(moved.into_iter().map(|t| Link::new(holder.clone(), t)));
            dedupe(&mut n.incoming);
        }
    }

    /// Mirror side of a retarget: entries `(old, t)` in `target`'s incoming
    /// list become `(new, t)`
    pub(crate) fn resource(&mut self, target: &SegmentId, old: &SegmentId, new: &SegmentId) {
        if let Some(t) = self.segments.get_mut(target) {
            for link in t.incoming.iter_mut().filter(|l| &l.segment == old) {
                link.segment = new.clone();
            }
            dedupe(&mut t.incoming);
        }
    }

    /// Distinct targets of `id`'s outgoing links
    pub(crate) fn link_targets(&self, id: &SegmentId) -> Vec<SegmentId> {
        self.segments
            .get(id)
            .map(|s| distinct(s.outgoing.iter().map(|l| &l.segment)))
            .unwrap_or_default()
    }

    /// Distinct sources of `id`'s incoming links
    pub(crate) fn link_sources(&self, id: &SegmentId) -> Vec<SegmentId> {
        self.segments
            .get(id)
            .map(|s| distinct(s.incoming.iter().map(|l| &l.segment)))
            .unwrap_or_default()
    }

    /// Every segment on the other end of a link with `id`
    pub(crate) fn neighbours(&self, id: &SegmentId) -> Vec<SegmentId> {
        let mut all = self.link_targets(id);
        all.extend(self.link_sources(id));
        distinct(all.iter())
    }
}

fn distinct<'a>(ids: impl Iterator<Item = &'a SegmentId>) -> Vec<SegmentId> {
    let mut out: Vec<SegmentId> = Vec::new();
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

/// Drop repeated links, keeping the first occurrence
pub(crate) fn dedupe(links: &mut Vec<Link>) {
    let mut seen: Vec<Link> = Vec::with_capacity(links.len());
    links.retain(|l| {
        if seen.contains(l) {
            false
        } else {
            seen.push(l.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_create_link_mirrors() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();

        let s0 = c.segment(&id("s0")).unwrap();
        let s1 = c.segment(&id("s1")).unwrap();
        assert_eq!(s1.outgoing(), &[Link::new(id("s0"), "answer")]);
        assert_eq!(s0.incoming(), &[Link::new(id("s1"), "answer")]);
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_link_must_point_backwards() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        let before = c.clone();
        assert_eq!(c.create_link(&id("s0"), &id("s1"), "answer"), Err(EditError::LinkNotEarlier));
        assert_eq!(c.create_link(&id("s0"), &id("s0"), "answer"), Err(EditError::LinkNotEarlier));
        assert_eq!(c, before);
    }

    #[test]
    fn test_duplicate_and_unknown_type_declined() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();
        assert_eq!(
            c.create_link(&id("s1"), &id("s0"), "answer"),
            Err(EditError::DuplicateLink("answer".to_string()))
        );
        assert_eq!(
            c.create_link(&id("s1"), &id("s0"), "nope"),
            Err(EditError::UnknownLinkType("nope".to_string()))
        );
        // Same pair, different type is fine
        c.create_link(&id("s1"), &id("s0"), "reformulation").unwrap();
        assert_eq!(c.segment(&id("s1")).unwrap().outgoing().len(), 2);
    }

    #[test]
    fn test_remove_links_clears_both_ends() {
        let mut c = collection(&[("a", "P1"), ("b", "P2"), ("c", "P1")]);
        c.create_link(&id("s2"), &id("s0"), "answer").unwrap();
        c.create_link(&id("s2"), &id("s0"), "reformulation").unwrap();
        c.create_link(&id("s2"), &id("s1"), "answer").unwrap();

        c.remove_links(&id("s2"), &id("s0")).unwrap();
        assert_eq!(c.segment(&id("s2")).unwrap().outgoing(), &[Link::new(id("s1"), "answer")]);
        assert!(c.segment(&id("s0")).unwrap().incoming().is_empty());
        c.check_invariants().unwrap();

        c.unlink_all(&id("s2")).unwrap();
        assert!(c.segment(&id("s2")).unwrap().outgoing().is_empty());
        assert!(c.segment(&id("s1")).unwrap().incoming().is_empty());
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_replace_link_target_keeps_mirror() {
        let mut c = collection(&[("a", "P1"), ("b", "P2"), ("c", "P1")]);
        c.create_link(&id("s2"), &id("s0"), "answer").unwrap();

        c.replace_link_target(&id("s2"), &id("s0"), &id("s1")).unwrap();
        assert_eq!(c.segment(&id("s2")).unwrap().outgoing(), &[Link::new(id("s1"), "answer")]);
        assert!(c.segment(&id("s0")).unwrap().incoming().is_empty());
        assert_eq!(c.segment(&id("s1")).unwrap().incoming(), &[Link::new(id("s2"), "answer")]);
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_link_command_round_trip() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        let before = c.clone();
        let cmd = c.create_link(&id("s1"), &id("s0"), "answer").unwrap();
        let after = c.clone();

        cmd.undo(&mut c).unwrap();
        assert_eq!(c, before);
        cmd.execute(&mut c).unwrap();
        assert_eq!(c, after);
    }
}

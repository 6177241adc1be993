//! Taxonomy edits propagated to segments
//!
//! Additions are idempotent. Renames keep list positions and rewrite every
//! live annotation or link using the old name; a rename onto an existing
//! name is declined. Deletions strip the deleted entry from every segment.
//! Legacy annotations are never touched.

use super::SegmentCollection;
use crate::error::EditError;
use crate::models::{Segment, SegmentId, Taxonomy};
use crate::undo::{Command, Recorder};

impl SegmentCollection {
    fn segments_where(&self, predicate: impl Fn(&Segment) -> bool) -> Vec<SegmentId> {
        self.order
            .iter()
            .filter(|id| self.segments.get(*id).is_some_and(&predicate))
            .cloned()
            .collect()
    }

    fn taxonomy_edit(&mut self, touched: &[SegmentId], edit: impl FnOnce(&mut Self)) -> Command {
        let mut recorder = Recorder::start(self);
        recorder.track_taxonomy(self);
        recorder.touch_all(self, touched);
        edit(self);
        Command::Edit(recorder.finish(self, None, None))
    }

    fn with_taxonomy(&mut self, edit: impl FnOnce(&mut Taxonomy)) {
        if let Some(taxonomy) = self.taxonomy.as_mut() {
            edit(taxonomy);
        }
    }

    fn require_layer(&self, layer: &str) -> Result<&Taxonomy, EditError> {
        let taxonomy = self.require_taxonomy()?;
        if !taxonomy.has_layer(layer) {
            return Err(EditError::UnknownLayer(layer.to_string()));
        }
        Ok(taxonomy)
    }

    /// Replace the taxonomy wholesale; the active layer moves to its default
    pub fn set_taxonomy(&mut self, taxonomy: Taxonomy) -> Command {
        self.taxonomy_edit(&[], |c| {
            c.active_layer = taxonomy.default_layer.clone();
            c.taxonomy = Some(taxonomy);
        })
    }

    // ----- additions -----

    pub fn add_layer(&mut self, layer: &str) -> Result<Command, EditError> {
        self.require_taxonomy()?;
        Ok(self.taxonomy_edit(&[], |c| {
            c.with_taxonomy(|t| {
                t.add_layer(layer);
            });
            if c.active_layer.is_none() {
                c.active_layer = Some(layer.to_string());
            }
        }))
    }

    pub fn add_label(&mut self, layer: &str, label: &str) -> Result<Command, EditError> {
        self.require_layer(layer)?;
        Ok(self.taxonomy_edit(&[], |c| {
            c.with_taxonomy(|t| {
                t.add_label(layer, label);
            })
        }))
    }

    pub fn add_qualifier(&mut self, layer: &str, qualifier: &str) -> Result<Command, EditError> {
        self.require_layer(layer)?;
        Ok(self.taxonomy_edit(&[], |c| {
            c.with_taxonomy(|t| {
                t.add_qualifier(layer, qualifier);
            })
        }))
    }

    pub fn add_link_type(&mut self, link_type: &str, color: Option<String>) -> Result<Command, EditError> {
        self.require_taxonomy()?;
        Ok(self.taxonomy_edit(&[], |c| {
            c.with_taxonomy(|t| {
                t.add_link_type(link_type, color);
            })
        }))
    }

    // ----- renames -----

    pub fn rename_layer(&mut self, layer: &str, new_layer: &str) -> Result<Command, EditError> {
        let taxonomy = self.require_layer(layer)?;
        if taxonomy.has_layer(new_layer) {
            return Err(EditError::NameCollision(new_layer.to_string()));
        }
        let touched = self.segments_where(|s| s.annotation(layer).is_some());

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.rename_layer(layer, new_layer));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    if let Some(annotation) = s.annotations.remove(layer) {
                        s.annotations.insert(new_layer.to_string(), annotation);
                    }
                }
            }
            if c.active_layer.as_deref() == Some(layer) {
                c.active_layer = Some(new_layer.to_string());
            }
            if let Some(filter) = c.filter.as_mut() {
                filter.rename_layer(layer, new_layer);
            }
            log::debug!("Renamed layer '{}' to '{}' on {} segments", layer, new_layer, touched.len());
        }))
    }

    pub fn rename_label(&mut self, layer: &str, label: &str, new_label: &str) -> Result<Command, EditError> {
        let taxonomy = self.require_layer(layer)?;
        if !taxonomy.has_label(layer, label) {
            return Err(EditError::UnknownLabel {
                layer: layer.to_string(),
                label: label.to_string(),
            });
        }
        if taxonomy.has_label(layer, new_label) {
            return Err(EditError::NameCollision(new_label.to_string()));
        }
        let touched = self.segments_where(|s| s.label(layer) == Some(label));

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.rename_label(layer, label, new_label));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    s.set_label(layer, new_label);
                }
            }
            if let Some(filter) = c.filter.as_mut() {
                filter.rename_label(layer, label, new_label);
            }
            log::debug!("Renamed label '{}' to '{}' on {} segments", label, new_label, touched.len());
        }))
    }

    pub fn rename_qualifier(
        &mut self,
        layer: &str,
        qualifier: &str,
        new_qualifier: &str,
    ) -> Result<Command, EditError> {
        let taxonomy = self.require_layer(layer)?;
        if !taxonomy.has_qualifier(layer, qualifier) {
            return Err(EditError::UnknownQualifier {
                layer: layer.to_string(),
                qualifier: qualifier.to_string(),
            });
        }
        if taxonomy.has_qualifier(layer, new_qualifier) {
            return Err(EditError::NameCollision(new_qualifier.to_string()));
        }
        let touched = self.segments_where(|s| s.qualifier(layer) == Some(qualifier));

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.rename_qualifier(layer, qualifier, new_qualifier));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    s.set_qualifier(layer, new_qualifier);
                }
            }
        }))
    }

    pub fn rename_link_type(&mut self, link_type: &str, new_link_type: &str) -> Result<Command, EditError> {
        let taxonomy = self.require_taxonomy()?;
        if !taxonomy.has_link_type(link_type) {
            return Err(EditError::UnknownLinkType(link_type.to_string()));
        }
        if taxonomy.has_link_type(new_link_type) {
            return Err(EditError::NameCollision(new_link_type.to_string()));
        }
        let touched = self.segments_where(|s| uses_link_type(s, link_type));

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.rename_link_type(link_type, new_link_type));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    for link in s.outgoing.iter_mut().chain(s.incoming.iter_mut()) {
                        if link.link_type == link_type {
                            link.link_type = new_link_type.to_string();
                        }
                    }
                }
            }
        }))
    }

    // ----- deletions -----

    /// Delete a layer and every annotation under it
    ///
    /// The active layer is reset to the (possibly new) default layer.
    pub fn delete_layer(&mut self, layer: &str) -> Result<Command, EditError> {
        let taxonomy = self.require_layer(layer)?;
        if taxonomy.labels.len() == 1 {
            return Err(EditError::LastLayer(layer.to_string()));
        }
        let touched = self.segments_where(|s| s.annotation(layer).is_some());

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.delete_layer(layer));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    s.annotations.remove(layer);
                }
            }
            c.active_layer = c.taxonomy.as_ref().and_then(|t| t.default_layer.clone());
            log::debug!("Deleted layer '{}' ({} segments stripped)", layer, touched.len());
        }))
    }

    pub fn delete_label(&mut self, layer: &str, label: &str) -> Result<Command, EditError> {
        if !self.require_layer(layer)?.has_label(layer, label) {
            return Err(EditError::UnknownLabel {
                layer: layer.to_string(),
                label: label.to_string(),
            });
        }
        let touched = self.segments_where(|s| s.label(layer) == Some(label));

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.delete_label(layer, label));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    s.clear_label(layer);
                }
            }
        }))
    }

    pub fn delete_qualifier(&mut self, layer: &str, qualifier: &str) -> Result<Command, EditError> {
        if !self.require_layer(layer)?.has_qualifier(layer, qualifier) {
            return Err(EditError::UnknownQualifier {
                layer: layer.to_string(),
                qualifier: qualifier.to_string(),
            });
        }
        let touched = self.segments_where(|s| s.qualifier(layer) == Some(qualifier));

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.delete_qualifier(layer, qualifier));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    s.clear_qualifier(layer);
                }
            }
        }))
    }

    /// Delete a link type and every link of that type
    pub fn delete_link_type(&mut self, link_type: &str) -> Result<Command, EditError> {
        if !self.require_taxonomy()?.has_link_type(link_type) {
            return Err(EditError::UnknownLinkType(link_type.to_string()));
        }
        let touched = self.segments_where(|s| uses_link_type(s, link_type));

        Ok(self.taxonomy_edit(&touched, |c| {
            c.with_taxonomy(|t| t.delete_link_type(link_type));
            for id in &touched {
                if let Some(s) = c.segments.get_mut(id) {
                    s.outgoing.retain(|l| l.link_type != link_type);
                    s.incoming.retain(|l| l.link_type != link_type);
                }
            }
        }))
    }
}

fn uses_link_type(segment: &Segment, link_type: &str) -> bool {
    segment
        .outgoing()
        .iter()
        .chain(segment.incoming())
        .any(|l| l.link_type == link_type)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::Link;

    #[test]
    fn test_add_label_then_rename_then_undo() {
        let mut c = collection(&[("a", "P1"), ("b", "P1"), ("c", "P2")]);
        c.add_label("task", "foo").unwrap();
        c.set_label(&id("s0"), "task", "foo").unwrap();
        c.set_label(&id("s2"), "task", "foo").unwrap();
        let before = c.clone();

        let cmd = c.rename_label("task", "foo", "bar").unwrap();
        assert_eq!(c.segment(&id("s0")).unwrap().label("task"), Some("bar"));
        assert_eq!(c.segment(&id("s2")).unwrap().label("task"), Some("bar"));
        assert_eq!(c.taxonomy().unwrap().labels("task").last().map(|s| s.as_str()), Some("bar"));
        c.check_invariants().unwrap();

        cmd.undo(&mut c).unwrap();
        assert_eq!(c, before);
        assert_eq!(c.segment(&id("s0")).unwrap().label("task"), Some("foo"));
    }

    #[test]
    fn test_rename_collision_declined() {
        let mut c = collection(&[("a", "P1")]);
        let before = c.clone();
        assert_eq!(
            c.rename_label("task", "inform", "request"),
            Err(EditError::NameCollision("request".to_string()))
        );
        assert_eq!(
            c.rename_layer("task", "feedback"),
            Err(EditError::NameCollision("feedback".to_string()))
        );
        assert_eq!(
            c.rename_qualifier("task", "partial", "certain"),
            Err(EditError::NameCollision("certain".to_string()))
        );
        assert_eq!(
            c.rename_link_type("answer", "reformulation"),
            Err(EditError::NameCollision("reformulation".to_string()))
        );
        assert_eq!(c, before);
    }

    #[test]
    fn test_rename_layer_moves_pointers() {
        let mut c = collection(&[("a", "P1")]);
        c.set_label(&id("s0"), "task", "inform").unwrap();
        c.rename_layer("task", "dimension").unwrap();

        assert_eq!(c.active_layer(), Some("dimension"));
        assert_eq!(c.taxonomy().unwrap().default_layer.as_deref(), Some("dimension"));
        assert_eq!(c.segment(&id("s0")).unwrap().label("dimension"), Some("inform"));
        assert!(c.segment(&id("s0")).unwrap().annotation("task").is_none());
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_rename_qualifier_and_link_type() {
        let mut c = collection(&[("a", "P1"), ("b", "P2")]);
        c.set_qualifier(&id("s1"), "task", "partial").unwrap();
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();

        c.rename_qualifier("task", "partial", "incomplete").unwrap();
        c.rename_link_type("answer", "response").unwrap();

        assert_eq!(c.segment(&id("s1")).unwrap().qualifier("task"), Some("incomplete"));
        assert_eq!(c.segment(&id("s1")).unwrap().outgoing(), &[Link::new(id("s0"), "response")]);
        assert_eq!(c.segment(&id("s0")).unwrap().incoming(), &[Link::new(id("s1"), "response")]);
        assert_eq!(c.taxonomy().unwrap().link_types().next(), Some("response"));
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_label_and_qualifier_strip_fields() {
        let mut c = collection(&[("a", "P1")]);
        c.set_label(&id("s0"), "task", "inform").unwrap();
        c.set_qualifier(&id("s0"), "task", "partial").unwrap();

        c.delete_label("task", "inform").unwrap();
        assert_eq!(c.segment(&id("s0")).unwrap().label("task"), None);
        assert_eq!(c.segment(&id("s0")).unwrap().qualifier("task"), Some("partial"));

        c.delete_qualifier("task", "partial").unwrap();
        assert!(c.segment(&id("s0")).unwrap().annotation("task").is_none());
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_default_layer_resets_active() {
        let mut c = collection(&[("a", "P1")]);
        c.set_label(&id("s0"), "task", "inform").unwrap();
        let before = c.clone();

        let cmd = c.delete_layer("task").unwrap();
        assert_eq!(c.taxonomy().unwrap().default_layer.as_deref(), Some("feedback"));
        assert_eq!(c.active_layer(), Some("feedback"));
        assert!(c.segment(&id("s0")).unwrap().annotations.is_empty());
        c.check_invariants().unwrap();

        assert_eq!(c.delete_layer("feedback"), Err(EditError::LastLayer("feedback".to_string())));

        cmd.undo(&mut c).unwrap();
        assert_eq!(c, before);
    }

    #[test]
    fn test_delete_link_type_removes_links() {
        let mut c = collection(&[("a", "P1"), ("b", "P2"), ("c", "P1")]);
        c.create_link(&id("s1"), &id("s0"), "answer").unwrap();
        c.create_link(&id("s2"), &id("s0"), "reformulation").unwrap();

        c.delete_link_type("answer").unwrap();
        assert!(c.segment(&id("s1")).unwrap().outgoing().is_empty());
        assert_eq!(c.segment(&id("s0")).unwrap().incoming(), &[Link::new(id("s2"), "reformulation")]);
        c.check_invariants().unwrap();
    }

    #[test]
    fn test_additions_are_idempotent() {
        let mut c = collection(&[("a", "P1")]);
        let cmd = c.add_label("task", "inform").unwrap();
        assert!(matches!(cmd, Command::Edit(ref p) if p.is_empty()));

        c.add_layer("sentiment").unwrap();
        c.add_qualifier("sentiment", "strong").unwrap();
        c.add_link_type("contrast", Some("#123456".to_string())).unwrap();
        let t = c.taxonomy().unwrap();
        assert!(t.has_layer("sentiment"));
        assert!(t.has_qualifier("sentiment", "strong"));
        assert!(t.has_link_type("contrast"));
        assert!(matches!(c.add_label("missing", "x"), Err(EditError::UnknownLayer(_))));
    }
}

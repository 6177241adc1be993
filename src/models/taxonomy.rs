//! Annotation taxonomy
//!
//! Layers, their labels and qualifiers, link types, and the default layer.
//! Insertion order is kept everywhere: a renamed entry stays at its
//! original position.
//!
//! This type knows nothing about segments; propagating renames and
//! deletions to annotated segments is the collection's job.

use crate::error::PersistError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub name: String,
    #[serde(rename = "default")]
    pub default_layer: Option<String>,
    /// Layer -> ordered labels
    #[serde(default)]
    pub labels: IndexMap<String, Vec<String>>,
    /// Layer -> ordered qualifiers (only for layers that define them)
    #[serde(default)]
    pub qualifiers: IndexMap<String, Vec<String>>,
    /// Layer -> color token (presentation only)
    #[serde(default)]
    pub colors: IndexMap<String, String>,
    /// Link type -> color token (presentation only)
    #[serde(default)]
    pub links: IndexMap<String, Option<String>>,
}

impl Taxonomy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, PersistError> {
        let mut taxonomy: Taxonomy = serde_json::from_str(json)?;
        if taxonomy
            .default_layer
            .as_ref()
            .is_some_and(|d| !taxonomy.labels.contains_key(d))
        {
            log::warn!("Default layer {:?} is not a taxonomy layer, using the first layer", taxonomy.default_layer);
            taxonomy.default_layer = taxonomy.labels.keys().next().cloned();
        }
        Ok(taxonomy)
    }

    pub fn to_json_string(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path.as_ref())?;
        let taxonomy = Self::from_json_str(&content)?;
        log::info!("Loaded taxonomy '{}' from {}", taxonomy.name, path.as_ref().display());
        Ok(taxonomy)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        fs::write(path.as_ref(), self.to_json_string()?)?;
        log::info!("Saved taxonomy '{}' to {}", self.name, path.as_ref().display());
        Ok(())
    }

    // ----- queries -----

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(|k| k.as_str())
    }

    pub fn has_layer(&self, layer: &str) -> bool {
        self.labels.contains_key(layer)
    }

    pub fn labels(&self, layer: &str) -> &[String] {
        self.labels.get(layer).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn qualifiers(&self, layer: &str) -> &[String] {
        self.qualifiers.get(layer).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_label(&self, layer: &str, label: &str) -> bool {
        self.labels(layer).iter().any(|l| l == label)
    }

    pub fn has_qualifier(&self, layer: &str, qualifier: &str) -> bool {
        self.qualifiers(layer).iter().any(|q| q == qualifier)
    }

    pub fn link_types(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(|k| k.as_str())
    }

    pub fn has_link_type(&self, link_type: &str) -> bool {
        self.links.contains_key(link_type)
    }

    // ----- additions (idempotent) -----

    pub(crate) fn add_layer(&mut self, layer: &str) -> bool {
        if self.has_layer(layer) {
            return false;
        }
        self.labels.insert(layer.to_string(), Vec::new());
        if self.default_layer.is_none() {
            self.default_layer = Some(layer.to_string());
        }
        true
    }

    pub(crate) fn add_label(&mut self, layer: &str, label: &str) -> bool {
        match self.labels.get_mut(layer) {
            Some(labels) if !labels.iter().any(|l| l == label) => {
                labels.push(label.to_string());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn add_qualifier(&mut self, layer: &str, qualifier: &str) -> bool {
        if !self.has_layer(layer) {
            return false;
        }
        let qualifiers = self.qualifiers.entry(layer.to_string()).or_default();
        if qualifiers.iter().any(|q| q == qualifier) {
            return false;
        }
        qualifiers.push(qualifier.to_string());
        true
    }

    pub(crate) fn add_link_type(&mut self, link_type: &str, color: Option<String>) -> bool {
        if self.has_link_type(link_type) {
            return false;
        }
        self.links.insert(link_type.to_string(), color);
        true
    }

    // ----- renames (position preserving) -----

    pub(crate) fn rename_layer(&mut self, layer: &str, new_layer: &str) {
        rename_key(&mut self.labels, layer, new_layer);
        rename_key(&mut self.qualifiers, layer, new_layer);
        rename_key(&mut self.colors, layer, new_layer);
        if self.default_layer.as_deref() == Some(layer) {
            self.default_layer = Some(new_layer.to_string());
        }
    }

    pub(crate) fn rename_label(&mut self, layer: &str, label: &str, new_label: &str) {
        if let Some(labels) = self.labels.get_mut(layer) {
            rename_entry(labels, label, new_label);
        }
    }

    pub(crate) fn rename_qualifier(&mut self, layer: &str, qualifier: &str, new_qualifier: &str) {
        if let Some(qualifiers) = self.qualifiers.get_mut(layer) {
            rename_entry(qualifiers, qualifier, new_qualifier);
        }
    }

    pub(crate) fn rename_link_type(&mut self, link_type: &str, new_link_type: &str) {
        rename_key(&mut self.links, link_type, new_link_type);
    }

    // ----- deletions -----

    /// Remove a layer; the default moves to the first remaining layer
    pub(crate) fn delete_layer(&mut self, layer: &str) {
        self.labels.shift_remove(layer);
        self.qualifiers.shift_remove(layer);
        self.colors.shift_remove(layer);
        if self.default_layer.as_deref() == Some(layer) {
            self.default_layer = self.labels.keys().next().cloned();
        }
    }

    pub(crate) fn delete_label(&mut self, layer: &str, label: &str) {
        if let Some(labels) = self.labels.get_mut(layer) {
            labels.retain(|l| l != label);
        }
    }

    pub(crate) fn delete_qualifier(&mut self, layer: &str, qualifier: &str) {
        if let Some(qualifiers) = self.qualifiers.get_mut(layer) {
            qualifiers.retain(|q| q != qualifier);
        }
    }

    pub(crate) fn delete_link_type(&mut self, link_type: &str) {
        self.links.shift_remove(link_type);
    }
}

fn rename_key<V>(map: &mut IndexMap<String, V>, old: &str, new: &str) {
    if let Some(index) = map.get_index_of(old) {
        if let Some((_, value)) = map.shift_remove_index(index) {
            map.insert(new.to_string(), value);
            let last = map.len() - 1;
            map.move_index(last, index);
        }
    }
}

fn rename_entry(list: &mut [String], old: &str, new: &str) {
    if let Some(entry) = list.iter_mut().find(|e| e.as_str() == old) {
        *entry = new.to_string();
    }
}

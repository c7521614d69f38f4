//! TemplateStore - In-memory template storage
//!
//! ## Responsibilities
//!
//! - Keep captured templates addressable by caller-chosen ids
//! - Serve templates back for later comparison
//!
//! Storage is process-lifetime only; enrollment databases live upstream.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

pub struct TemplateStore {
    templates: RwLock<HashMap<String, String>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Store a base64 template, replacing any previous one with the same id.
    pub fn store(&self, id: impl Into<String>, template: impl Into<String>) {
        let id = id.into();
        self.templates.write().unwrap().insert(id.clone(), template.into());
        tracing::debug!(template_id = %id, "template stored");
    }

    pub fn fetch(&self, id: &str) -> Result<String> {
        self.templates
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("template '{}'", id)))
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        match self.templates.write().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("template '{}'", id))),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.templates.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.templates.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.templates.write().unwrap().clear();
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

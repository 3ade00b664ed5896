// SPDX-License-Identifier: MIT

use crate::cdk::component::AIComponent;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only lookup of catalog components by id.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    components: Arc<HashMap<String, AIComponent>>,
}

impl ComponentCatalog {
    pub fn new(components: Vec<AIComponent>) -> Self {
        let map = components.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            components: Arc::new(map),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AIComponent> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl From<Vec<AIComponent>> for ComponentCatalog {
    fn from(components: Vec<AIComponent>) -> Self {
        Self::new(components)
    }
}

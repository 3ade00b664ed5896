// SPDX-License-Identifier: MIT

//! Time-bounded in-memory cache of workflow graphs
//!
//! Entries are keyed by workflow id and expire lazily: an expired entry is
//! dropped the next time it is read. The table sits behind a mutex so one
//! cache can be shared across tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::types::{Edge, Node};
use crate::flowforge::config::EngineConfig;

/// Cached bundle for one workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub nodes: HashMap<String, Node>,
    pub edges: HashMap<String, Edge>,
    pub metadata: Value,
    /// Wall-clock time of the last store or metadata update
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    stored_at: Instant,
}

impl CacheEntry {
    fn new(nodes: &[Node], edges: &[Edge], metadata: Value) -> Self {
        Self {
            nodes: nodes.iter().map(|n| (n.id.clone(), n.clone())).collect(),
            edges: edges.iter().map(|e| (e.id.clone(), e.clone())).collect(),
            metadata,
            timestamp: Utc::now(),
            stored_at: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.timestamp = Utc::now();
        self.stored_at = Instant::now();
    }

    fn is_live(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() <= ttl
    }

    /// Approximate size: JSON byte length of nodes, edges and metadata
    fn approximate_size(&self) -> usize {
        json_len(&self.nodes) + json_len(&self.edges) + json_len(&self.metadata)
    }
}

fn json_len<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

#[derive(Debug)]
pub struct WorkflowCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl WorkflowCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a workflow, replacing any existing entry for `id`
    pub fn store(&self, id: &str, nodes: &[Node], edges: &[Edge], metadata: Value) {
        log::debug!(
            "Caching workflow {} ({} nodes, {} edges)",
            id,
            nodes.len(),
            edges.len()
        );
        self.lock()
            .insert(id.to_string(), CacheEntry::new(nodes, edges, metadata));
    }

    /// Fetch a live entry. An expired entry is removed and reported as absent.
    pub fn retrieve(&self, id: &str) -> Option<CacheEntry> {
        let mut entries = self.lock();

        match entries.get(id) {
            Some(entry) if entry.is_live(self.ttl) => {
                log::debug!("Cache hit: {}", id);
                Some(entry.clone())
            }
            Some(_) => {
                log::debug!("Cache entry expired: {}", id);
                entries.remove(id);
                None
            }
            None => {
                log::debug!("Cache miss: {}", id);
                None
            }
        }
    }

    /// Replace the metadata of a live entry and refresh its timestamp.
    /// Returns `false` (and changes nothing) if there is no live entry.
    pub fn update_metadata(&self, id: &str, metadata: Value) -> bool {
        let mut entries = self.lock();

        match entries.get_mut(id) {
            Some(entry) if entry.is_live(self.ttl) => {
                entry.metadata = metadata;
                entry.touch();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// Approximate memory used by live entries, in bytes
    pub fn size(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| e.is_live(self.ttl))
            .map(CacheEntry::approximate_size)
            .sum()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| e.is_live(self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(self.ttl));
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    // A panic while holding the lock cannot leave a half-written entry,
    // so a poisoned table is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<&EngineConfig> for WorkflowCache {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.cache_ttl)
    }
}

impl Default for WorkflowCache {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowforge::workflow::types::NodeType;
    use serde_json::json;

    fn sample() -> (Vec<Node>, Vec<Edge>) {
        (
            vec![
                Node::new("start", NodeType::Start),
                Node::new("end", NodeType::End),
            ],
            vec![Edge::new("e1", "start", "end")],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_then_retrieve() {
        let cache = WorkflowCache::default();
        let (nodes, edges) = sample();
        cache.store("wf", &nodes, &edges, json!({"name": "demo"}));

        let entry = cache.retrieve("wf").unwrap();
        assert_eq!(entry.nodes.len(), 2);
        assert_eq!(entry.edges["e1"].target, "end");
        assert_eq!(entry.metadata, json!({"name": "demo"}));
        assert!(cache.retrieve("other").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = WorkflowCache::new(Duration::from_secs(300));
        let (nodes, edges) = sample();
        cache.store("wf", &nodes, &edges, Value::Null);

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(cache.retrieve("wf").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.retrieve("wf").is_none());
        // removed on read
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_metadata_refreshes_live_entry() {
        let cache = WorkflowCache::new(Duration::from_secs(10));
        let (nodes, edges) = sample();
        cache.store("wf", &nodes, &edges, json!(1));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(cache.update_metadata("wf", json!(2)));

        tokio::time::advance(Duration::from_secs(8)).await;
        let entry = cache.retrieve("wf").unwrap();
        assert_eq!(entry.metadata, json!(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_metadata_after_expiry_is_noop() {
        let cache = WorkflowCache::new(Duration::from_secs(10));
        let (nodes, edges) = sample();
        cache.store("wf", &nodes, &edges, json!(1));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!cache.update_metadata("wf", json!(2)));
        assert!(!cache.update_metadata("missing", json!(2)));
        assert!(cache.retrieve("wf").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_clear_all() {
        let cache = WorkflowCache::default();
        let (nodes, edges) = sample();
        cache.store("a", &nodes, &edges, Value::Null);
        cache.store("b", &nodes, &edges, Value::Null);
        assert_eq!(cache.len(), 2);

        cache.clear("a");
        assert!(cache.retrieve("a").is_none());
        assert_eq!(cache.len(), 1);

        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_counts_only_live_entries() {
        let cache = WorkflowCache::new(Duration::from_secs(10));
        assert_eq!(cache.size(), 0);

        let (nodes, edges) = sample();
        cache.store("old", &nodes, &edges, json!({"v": 1}));
        let one = cache.size();
        assert!(one > 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.store("new", &nodes, &edges, json!({"v": 1}));
        assert_eq!(cache.size(), one * 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.size(), one);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrites() {
        let cache = WorkflowCache::default();
        let (nodes, edges) = sample();
        cache.store("wf", &nodes, &edges, json!("first"));
        cache.store("wf", &nodes[..1], &[], json!("second"));

        let entry = cache.retrieve("wf").unwrap();
        assert_eq!(entry.nodes.len(), 1);
        assert!(entry.edges.is_empty());
        assert_eq!(entry.metadata, json!("second"));
    }
}

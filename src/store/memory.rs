//! In-process replicated store: one JSON tree, serialised writes,
//! ordered push notifications

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::patch::{check_writable, read_at, write_at};
use super::{KeyValueStore, Notification, Patch, StoreError, StorePath, Subscription};

/// Buffered notifications per subscribed path before a subscriber lags
const SUBSCRIBER_BUFFER: usize = 64;

/// In-memory key-value tree shared by every session of this server.
///
/// Notifications are sent while the tree lock is held, so every subscriber
/// sees writes in commit order.
pub struct MemoryStore {
    tree: RwLock<Value>,
    watchers: DashMap<StorePath, broadcast::Sender<Notification>>,
    revision: AtomicU64,
    #[cfg(test)]
    staged_nodes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Value::Object(Default::default())),
            watchers: DashMap::new(),
            revision: AtomicU64::new(0),
            #[cfg(test)]
            staged_nodes: AtomicU64::new(0),
        }
    }

    /// Number of paths with at least one live subscriber
    pub fn watched_paths(&self) -> usize {
        self.watchers
            .iter()
            .filter(|w| w.value().receiver_count() > 0)
            .count()
    }

    /// Commit `writes` atomically and notify overlapping subscribers
    fn commit(&self, writes: Vec<(StorePath, Value)>) -> Result<(), StoreError> {
        let Some(scope) = writes
            .iter()
            .map(|(path, _)| path.clone())
            .reduce(|a, b| a.common_prefix(&b))
        else {
            return Ok(());
        };

        let mut tree = self.tree.write();
        check_writable(&tree, scope.segments())?;

        if let [(path, value)] = writes.as_slice() {
            write_at(&mut tree, path.segments(), value.clone())?;
        } else {
            // Stage on a copy of the written subtree so a failing entry
            // leaves the tree untouched
            let mut staged = read_at(&tree, scope.segments())
                .cloned()
                .unwrap_or(Value::Null);
            #[cfg(test)]
            self.staged_nodes
                .fetch_add(node_count(&staged), Ordering::SeqCst);

            let depth = scope.segments().len();
            for (path, value) in &writes {
                write_at(&mut staged, &path.segments()[depth..], value.clone())?;
            }
            write_at(&mut tree, scope.segments(), staged)?;
        }

        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;

        self.watchers.retain(|_, tx| tx.receiver_count() > 0);
        for watcher in self.watchers.iter() {
            let watched = watcher.key();
            if writes.iter().any(|(path, _)| path.overlaps(watched)) {
                let _ = watcher.value().send(Notification {
                    revision,
                    value: read_at(&tree, watched.segments()).cloned(),
                });
            }
        }

        debug!(revision, writes = writes.len(), "Store commit");
        Ok(())
    }
}

/// Values in `value`, counting containers and leaves
#[cfg(test)]
fn node_count(value: &Value) -> u64 {
    1 + match value {
        Value::Object(map) => map.values().map(node_count).sum(),
        Value::Array(items) => items.iter().map(node_count).sum(),
        _ => 0,
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let tree = self.tree.read();
        Ok(read_at(&tree, path.segments()).cloned())
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.commit(vec![(path.clone(), value)])
    }

    async fn update(&self, path: &StorePath, patch: &Patch) -> Result<(), StoreError> {
        let mut writes = Vec::with_capacity(patch.len());
        for (sub, value) in patch.entries() {
            writes.push((path.join(sub)?, value.clone()));
        }
        self.commit(writes)
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        // Hold the read lock so no commit slips between snapshot and subscribe
        let tree = self.tree.read();
        let rx = self
            .watchers
            .entry(path.clone())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
            .subscribe();

        let initial = Notification {
            revision: self.revision.load(Ordering::SeqCst),
            value: read_at(&tree, path.segments()).cloned(),
        };

        Ok(Subscription::new(path.clone(), initial, rx))
    }
}

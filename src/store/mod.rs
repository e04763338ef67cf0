//! Data store modules: the replicated match store and the Supabase
//! document store used for profiles and ratings

pub mod memory;
pub mod path;
pub mod patch;
pub mod profiles;
pub mod supabase;
pub mod typed;

pub use memory::MemoryStore;
pub use path::StorePath;
pub use patch::Patch;
pub use profiles::ProfileStore;
pub use supabase::SupabaseClient;
pub use typed::{StateStore, TypedSubscription};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

/// Raw hierarchical key-value store with push notifications.
///
/// Writes are last-write-wins. Subscribers to a path receive the full value
/// at that path after every write touching it, in commit order.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value at `path` (`None` when absent)
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Replace the whole value at `path`
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Apply a multi-path partial update relative to `path` in one commit
    async fn update(&self, path: &StorePath, patch: &Patch) -> Result<(), StoreError>;

    /// Subscribe to `path`; the first item yielded is the current value
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError>;
}

/// Change notification delivered to subscribers
#[derive(Debug, Clone)]
pub struct Notification {
    /// Store-wide commit counter at the time of the write
    pub revision: u64,
    /// Value at the subscribed path after the write
    pub value: Option<Value>,
}

/// Live subscription to a store path. Dropping it unsubscribes.
pub struct Subscription {
    path: StorePath,
    initial: Option<Notification>,
    rx: broadcast::Receiver<Notification>,
}

impl Subscription {
    pub(crate) fn new(
        path: StorePath,
        initial: Notification,
        rx: broadcast::Receiver<Notification>,
    ) -> Self {
        Self {
            path,
            initial: Some(initial),
            rx,
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Wait for the next snapshot. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Later snapshots supersede the skipped ones
                    warn!(path = %self.path, skipped = n, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Cannot write below non-container value at {0}")]
    NotAContainer(String),

    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode value at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

//! Typed view of one match record in the key-value store

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::{KeyValueStore, Patch, StoreError, StorePath, Subscription};

/// `get` / `patch` / `subscribe` capability over the record at one path
pub struct StateStore<T> {
    backend: Arc<dyn KeyValueStore>,
    path: StorePath,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for StateStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            path: self.path.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> StateStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(backend: Arc<dyn KeyValueStore>, path: StorePath) -> Self {
        Self {
            backend,
            path,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Current record, `None` when it was never created
    pub async fn get(&self) -> Result<Option<T>, StoreError> {
        match self.backend.get(&self.path).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    path: self.path.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Overwrite the whole record
    pub async fn set(&self, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(StoreError::Encode)?;
        self.backend.set(&self.path, value).await
    }

    /// Apply a partial update relative to the record root
    pub async fn patch(&self, patch: &Patch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.backend.update(&self.path, patch).await
    }

    pub async fn subscribe(&self) -> Result<TypedSubscription<T>, StoreError> {
        let inner = self.backend.subscribe(&self.path).await?;
        Ok(TypedSubscription {
            inner,
            _record: PhantomData,
        })
    }
}

/// Subscription that decodes every snapshot into `T`
pub struct TypedSubscription<T> {
    inner: Subscription,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedSubscription<T> {
    /// Next decodable snapshot. `Some(None)` means the record is absent;
    /// `None` means the store went away.
    pub async fn next(&mut self) -> Option<Option<T>> {
        loop {
            let notification = self.inner.next().await?;
            let Some(value) = notification.value else {
                return Some(None);
            };

            match serde_json::from_value(value) {
                Ok(record) => return Some(Some(record)),
                Err(e) => {
                    warn!(
                        path = %self.inner.path(),
                        revision = notification.revision,
                        error = %e,
                        "Skipping undecodable snapshot"
                    );
                }
            }
        }
    }
}

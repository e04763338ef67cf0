//! Multi-path partial updates and the JSON tree operations behind them

use serde::Serialize;
use serde_json::{Map, Value};

use super::StoreError;

/// An ordered set of `(relative path, value)` writes applied in one commit.
///
/// A `null` value removes the key, matching the hosted store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    entries: Vec<(String, Value)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write of `value` at the relative `path`
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        path: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.entries.push((path.into(), value));
        Ok(self)
    }

    /// Queue a removal of the relative `path`
    pub fn remove(&mut self, path: impl Into<String>) -> &mut Self {
        self.entries.push((path.into(), Value::Null));
        self
    }

    /// Value queued for `path`, last write wins
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Apply every entry to `root` in order
    #[cfg(test)]
    pub fn apply_to(&self, root: &mut Value) -> Result<(), StoreError> {
        for (path, value) in &self.entries {
            let path = super::StorePath::parse(path)?;
            write_at(root, path.segments(), value.clone())?;
        }
        Ok(())
    }
}

/// Read the value at `segments` below `root`
pub(crate) fn read_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Fail exactly when `write_at(root, segments, _)` would, without touching
/// `root`. Missing or scalar nodes are replaced by objects, so only array
/// indices on the live path can refuse a write.
pub(crate) fn check_writable(root: &Value, segments: &[String]) -> Result<(), StoreError> {
    let mut node = root;
    for (depth, segment) in segments.iter().enumerate() {
        node = match node {
            Value::Object(map) => match map.get(segment) {
                Some(child) => child,
                None => return Ok(()),
            },
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| StoreError::NotAContainer(segments[..=depth].join("/")))?,
            _ => return Ok(()),
        };
    }
    Ok(())
}

/// Write `value` at `segments` below `root`, creating objects on the way
pub(crate) fn write_at(
    root: &mut Value,
    segments: &[String],
    value: Value,
) -> Result<(), StoreError> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for (depth, segment) in parents.iter().enumerate() {
        if !(node.is_object() || node.is_array()) {
            if value.is_null() {
                return Ok(());
            }
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert(Value::Null),
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .ok()
                    .filter(|i| *i < items.len())
                    .ok_or_else(|| StoreError::NotAContainer(segments[..=depth].join("/")))?;
                &mut items[index]
            }
            _ => unreachable!("node was normalised to a container"),
        };
    }

    match node {
        Value::Object(map) => {
            if value.is_null() {
                map.remove(last);
            } else {
                map.insert(last.clone(), value);
            }
        }
        Value::Array(items) => {
            let index = last
                .parse::<usize>()
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| StoreError::NotAContainer(segments.join("/")))?;
            items[index] = value;
        }
        other => {
            if !value.is_null() {
                let mut map = Map::new();
                map.insert(last.clone(), value);
                *other = Value::Object(map);
            }
        }
    }

    Ok(())
}

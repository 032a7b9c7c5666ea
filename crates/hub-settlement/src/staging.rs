//! # Staged Writes
//!
//! Write overlay used to run one settlement step atomically.
//!
//! Components read through the overlay, so later reads in the same step
//! observe earlier writes. Nothing reaches the store until the service turns
//! the overlay into a single [`BatchOperation`] list and commits it with
//! `atomic_batch_write`. Dropping the overlay discards the step.

use crate::domain::KVStoreError;
use crate::ports::{BatchOperation, StateReader};
use std::collections::BTreeMap;

/// Pending writes on top of a read-only base.
pub struct StagedWrites<'a, S: StateReader + ?Sized> {
    base: &'a S,
    /// `Some(value)` = put, `None` = delete.
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: StateReader + ?Sized> StagedWrites<'a, S> {
    /// Start a step over `base`.
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            overlay: BTreeMap::new(),
        }
    }

    /// Stage a put.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    /// Stage a delete.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.overlay.insert(key, None);
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.overlay.len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }

    /// Operations to commit, in key order.
    pub fn into_batch(self) -> Vec<BatchOperation> {
        self.overlay
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOperation::Put { key, value },
                None => BatchOperation::Delete { key },
            })
            .collect()
    }
}

impl<S: StateReader + ?Sized> StateReader for StagedWrites<'_, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        match self.overlay.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.base.get(key),
        }
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.base.prefix_scan(prefix)?.into_iter().collect();

        for (key, staged) in self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match staged {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    fn first_key_from(&self, start: &[u8], prefix: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let staged = self
            .overlay
            .range(start.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .find(|(_, v)| v.is_some())
            .map(|(k, _)| k.clone());

        // Skip base keys this step deleted.
        let mut from = start.to_vec();
        let base = loop {
            match self.base.first_key_from(&from, prefix)? {
                Some(key) if matches!(self.overlay.get(&key), Some(None)) => {
                    from = key;
                    from.push(0);
                }
                other => break other,
            }
        };

        Ok(match (base, staged) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }
}

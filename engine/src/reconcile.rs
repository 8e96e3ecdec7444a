//! Reconciliation of a replica against a full snapshot.
//!
//! This is the core of determinism. Given the items currently held by the
//! replica and a new authoritative snapshot, this module computes the batch
//! of change operations that makes the replica match the snapshot.
//!
//! # Algorithm
//!
//! 1. Derive the key of every current item (`local` keys)
//! 2. Emit `Delete` for each local item whose key is absent from the snapshot
//! 3. Walk the snapshot in delivery order, emitting `Update` for keys already
//!    held locally and `Insert` for new ones
//!
//! Snapshot items go through the same key extractor as local items. An item
//! the extractor cannot key, or one whose key disagrees with the key the
//! snapshot was indexed by, aborts the computation: committing it would leave
//! the replica holding an item no later pass can key.
//!
//! Shared keys are always emitted as `Update`, even when the value is
//! unchanged. Detecting no-op updates is left to the replica owner.

use crate::{error::Result, ChangeOp, Error, KeyExtractor, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of reconciliation: the ordered batch plus per-kind counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult<T> {
    /// Operations in application order: deletes first, then snapshot order
    pub ops: Vec<ChangeOp<T>>,
    /// Number of `Insert` operations
    pub inserted: usize,
    /// Number of `Update` operations
    pub updated: usize,
    /// Number of `Delete` operations
    pub deleted: usize,
}

impl<T> ReconcileResult<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
            inserted: 0,
            updated: 0,
            deleted: 0,
        }
    }

    fn push(&mut self, op: ChangeOp<T>) {
        match op {
            ChangeOp::Insert(_) => self.inserted += 1,
            ChangeOp::Update(_) => self.updated += 1,
            ChangeOp::Delete(_) => self.deleted += 1,
        }
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl<T> IntoIterator for ReconcileResult<T> {
    type Item = ChangeOp<T>;
    type IntoIter = std::vec::IntoIter<ChangeOp<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// The reconciler diffs replica contents against snapshots.
///
/// It holds nothing but the key extractor, so a single reconciler can be
/// reused for every snapshot of a query.
pub struct Reconciler<'a, K: ?Sized> {
    key_fn: &'a K,
}

impl<'a, K: ?Sized> Reconciler<'a, K> {
    /// Create a new reconciler.
    pub fn new(key_fn: &'a K) -> Self {
        Self { key_fn }
    }

    /// Compute the change batch turning `current` into `snapshot`.
    ///
    /// A key extraction failure aborts the whole computation; no partial
    /// batch is ever returned.
    pub fn reconcile<T>(
        &self,
        current: impl IntoIterator<Item = T>,
        snapshot: Snapshot<T>,
    ) -> Result<ReconcileResult<T>>
    where
        K: KeyExtractor<T>,
    {
        let mut local_keys = HashSet::new();
        let mut deletes = Vec::new();

        for item in current {
            let key = self.key_fn.key_of(&item)?;
            if !local_keys.insert(key.clone()) {
                // Replica owners keep keys unique; a repeat adds nothing.
                continue;
            }
            if !snapshot.contains_key(&key) {
                deletes.push(ChangeOp::Delete(item));
            }
        }

        let mut result = ReconcileResult::with_capacity(deletes.len() + snapshot.len());
        for op in deletes {
            result.push(op);
        }

        for (key, item) in snapshot {
            let extracted = self.key_fn.key_of(&item)?;
            if extracted != key {
                return Err(Error::KeyMismatch {
                    snapshot: key.to_string(),
                    extracted: extracted.to_string(),
                });
            }
            if local_keys.contains(&key) {
                result.push(ChangeOp::Update(item));
            } else {
                result.push(ChangeOp::Insert(item));
            }
        }

        Ok(result)
    }
}

/// Compute the change batch turning `current` into `snapshot`.
///
/// Shorthand for `Reconciler::new(key_fn).reconcile(current, snapshot)`.
pub fn reconcile<T, K>(
    current: impl IntoIterator<Item = T>,
    snapshot: Snapshot<T>,
    key_fn: &K,
) -> Result<ReconcileResult<T>>
where
    K: KeyExtractor<T> + ?Sized,
{
    Reconciler::new(key_fn).reconcile(current, snapshot)
}

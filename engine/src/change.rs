//! Change operations emitted by the reconciler.
//!
//! Changes are instructions for the owner of the replica, not direct
//! mutations. One batch is produced per snapshot.

use crate::{error::Result, Key, KeyExtractor};
use serde::{Deserialize, Serialize};

/// Kind of a change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single instruction for the replica owner.
///
/// `Delete` carries the full prior item, not just its key, because replica
/// owners commonly need the old value to maintain their indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "item", rename_all = "lowercase")]
pub enum ChangeOp<T> {
    Insert(T),
    Update(T),
    Delete(T),
}

impl<T> ChangeOp<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeOp::Insert(_) => ChangeKind::Insert,
            ChangeOp::Update(_) => ChangeKind::Update,
            ChangeOp::Delete(_) => ChangeKind::Delete,
        }
    }

    /// The item this operation refers to.
    pub fn item(&self) -> &T {
        match self {
            ChangeOp::Insert(item) | ChangeOp::Update(item) | ChangeOp::Delete(item) => item,
        }
    }

    pub fn into_item(self) -> T {
        match self {
            ChangeOp::Insert(item) | ChangeOp::Update(item) | ChangeOp::Delete(item) => item,
        }
    }

    /// Derive the key of the referenced item.
    pub fn key<K>(&self, key_fn: &K) -> Result<Key>
    where
        K: KeyExtractor<T> + ?Sized,
    {
        key_fn.key_of(self.item())
    }
}

//! Mutation intents originating from local application code.
//!
//! Intents are forwarded to the remote source as-is. They never touch the
//! replica directly; local state only changes through a later snapshot.

use crate::Key;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a mutation intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

/// Request to apply partial changes to an existing item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntent<C> {
    /// Key of the item to update
    pub key: Key,
    /// Partial changes; interpretation belongs to the remote source
    pub changes: C,
}

impl<C> UpdateIntent<C> {
    pub fn new(key: impl Into<Key>, changes: C) -> Self {
        Self {
            key: key.into(),
            changes,
        }
    }
}

/// Request to delete an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteIntent {
    /// Key of the item to delete
    pub key: Key,
}

impl DeleteIntent {
    pub fn new(key: impl Into<Key>) -> Self {
        Self { key: key.into() }
    }
}

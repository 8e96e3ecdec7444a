//! # Mirror Engine
//!
//! Deterministic snapshot reconciliation for replicas of push-based sources.
//!
//! This crate provides the pure core of Mirror. A remote source periodically
//! delivers the complete result set of a query; the engine turns each such
//! snapshot into the minimal batch of insert/update/delete instructions that
//! brings a local replica in line with it.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of network, tasks or storage
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//! - **Generic**: Items are any type with a key extractor
//!
//! ## Core Concepts
//!
//! ### Keys
//!
//! Every item is identified by a [`Key`], either a string or an integer,
//! derived through a caller-supplied [`KeyExtractor`]. [`FieldKey`] reads the
//! key from a field of a JSON object.
//!
//! ### Snapshots
//!
//! A [`Snapshot`] is the full authoritative result of a query, in delivery
//! order. Snapshots are never treated as deltas.
//!
//! ### Change Operations
//!
//! Reconciliation yields [`ChangeOp`]s for the replica owner:
//! - [`ChangeOp::Insert`] - key is new
//! - [`ChangeOp::Update`] - key is already held (always emitted, no equality check)
//! - [`ChangeOp::Delete`] - key vanished from the snapshot; carries the prior item
//!
//! ### Mutation Intents
//!
//! Local writes travel the other way, as [`UpdateIntent`] and
//! [`DeleteIntent`] values (inserts carry the full item).
//!
//! ## Quick Start
//!
//! ```rust
//! use mirror_engine::{reconcile, ChangeOp, FieldKey, Snapshot};
//! use serde_json::json;
//!
//! let by_id = FieldKey::new("id");
//! let replica = vec![json!({"id": 1, "title": "a"}), json!({"id": 2, "title": "b"})];
//! let snapshot = Snapshot::from_items(vec![json!({"id": 2, "title": "b"})], &by_id).unwrap();
//!
//! let result = reconcile(replica, snapshot, &by_id).unwrap();
//! assert_eq!(
//!     result.ops,
//!     vec![
//!         ChangeOp::Delete(json!({"id": 1, "title": "a"})),
//!         ChangeOp::Update(json!({"id": 2, "title": "b"})),
//!     ]
//! );
//! ```

pub mod change;
pub mod error;
pub mod key;
pub mod mutation;
pub mod reconcile;
pub mod snapshot;

// Re-export main types at crate root
pub use change::{ChangeKind, ChangeOp};
pub use error::{Error, Result};
pub use key::{FieldKey, Key, KeyExtractor};
pub use mutation::{DeleteIntent, MutationKind, UpdateIntent};
pub use reconcile::{reconcile, ReconcileResult, Reconciler};
pub use snapshot::Snapshot;

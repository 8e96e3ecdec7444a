//! # Mirror Sync
//!
//! Keeps a local replica in step with a push-based remote source that
//! delivers full snapshots, and forwards local writes back to it.
//!
//! - [`SyncSession`] races a one-shot fetch against a live subscription,
//!   reconciles every snapshot into a [`Replica`], and signals readiness once
//! - [`MutationForwarder`] sends insert/update/delete intents to the
//!   [`RemoteSource`] strictly in order and surfaces the first failure
//! - [`Observer`] receives every transport and mutation fault
//!
//! Reconciliation itself lives in `mirror-engine`; this crate adds the
//! async plumbing on top of tokio.
//!
//! ```rust
//! use std::sync::Arc;
//! use mirror_engine::FieldKey;
//! use mirror_sync::{MemoryReplica, MemorySource, Observer, Query, SyncSession};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = MemorySource::new_shared("id");
//! source.replace_all("todos", vec![json!({"id": 1, "title": "write docs"})])?;
//!
//! let replica = Arc::new(MemoryReplica::new(FieldKey::new("id")));
//! let session = SyncSession::start(
//!     source.clone(),
//!     replica.clone(),
//!     Query::new("todos"),
//!     FieldKey::new("id"),
//!     Observer::none(),
//! )?;
//!
//! assert!(session.ready().await);
//! assert_eq!(replica.len(), 1);
//! session.cleanup()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod forwarder;
pub mod memory;
pub mod observer;
pub mod query;
pub mod registry;
pub mod remote;
pub mod replay;
pub mod replica;
pub mod session;

pub use config::{Config, ConfigError};
pub use error::{RemoteError, Result, SyncError};
pub use forwarder::MutationForwarder;
pub use memory::MemorySource;
pub use observer::Observer;
pub use query::{Filter, Query};
pub use registry::SessionRegistry;
pub use remote::{RemoteSource, Subscriber, SubscriptionEvent, Unsubscribe, UnsubscribeHandle};
pub use replay::ReplayError;
pub use replica::{MemoryReplica, Replica};
pub use session::{SessionState, SyncSession};

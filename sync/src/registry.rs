//! Session registry.
//!
//! Enforces at most one live session per query for a client. Claims are
//! released when the owning session stops or is dropped.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mirror_engine::KeyExtractor;

use crate::remote::RemoteSource;
use crate::{Observer, Query, Replica, Result, SyncError, SyncSession};

/// Tracks which queries have a live session.
///
/// Thread-safe and can be shared via `Arc`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session IDs keyed by the query they serve.
    active: Arc<DashMap<String, String>>,
}

impl SessionRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self {
            active: Arc::new(DashMap::new()),
        }
    }

    /// Create a new registry wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Start a session unless one is already live for `query`.
    pub fn start<S, R, K>(
        &self,
        source: Arc<S>,
        replica: Arc<R>,
        query: Query,
        key_fn: K,
        observer: Observer,
    ) -> Result<SyncSession>
    where
        S: RemoteSource,
        R: Replica<Item = S::Item>,
        K: KeyExtractor<S::Item> + Send + Sync + 'static,
    {
        let query_key = query.to_string();
        let session_id = uuid::Uuid::new_v4().to_string();

        // Claim under the new id, releasing the shard lock before the source
        // gets to run its subscribe.
        match self.active.entry(query_key.clone()) {
            Entry::Occupied(entry) => {
                return Err(SyncError::AlreadySyncing {
                    query: query_key,
                    session: entry.get().clone(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(session_id.clone());
            }
        }

        // Dropped on a failed start, which rolls the claim back.
        let claim = RegistryClaim {
            active: self.active.clone(),
            query_key,
            session_id: session_id.clone(),
        };
        let session =
            SyncSession::start_with_id(session_id, source, replica, query, key_fn, observer)?;

        tracing::debug!(
            session = %session.id(),
            query = %claim.query_key,
            active = self.active.len(),
            "Session registered"
        );

        Ok(session.with_claim(claim))
    }

    /// Whether a live session serves `query`.
    pub fn is_syncing(&self, query: &Query) -> bool {
        self.active.contains_key(&query.to_string())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.active.len()
    }
}

/// Registration held by a session; releases its query on drop.
#[derive(Debug)]
pub(crate) struct RegistryClaim {
    active: Arc<DashMap<String, String>>,
    query_key: String,
    session_id: String,
}

impl Drop for RegistryClaim {
    fn drop(&mut self) {
        self.active
            .remove_if(&self.query_key, |_, id| *id == self.session_id);
        tracing::debug!(session = %self.session_id, "Session unregistered");
    }
}

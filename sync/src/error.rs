//! Unified error handling for sync sessions and mutation forwarding.

use mirror_engine::MutationKind;

/// A fault reported by the remote source.
///
/// Remote sources are black boxes, so the fault is carried as an opaque
/// message. It is cloneable: the same value is handed to the observer and
/// returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Sync error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The one-shot bootstrap read was rejected.
    #[error("fetch failed: {0}")]
    Fetch(RemoteError),

    /// The subscription delivered an error.
    #[error("subscription error: {0}")]
    Subscription(RemoteError),

    /// The remote source refused to open a subscription.
    #[error("subscribe failed: {0}")]
    Subscribe(RemoteError),

    /// A forwarded create/update/delete was rejected.
    #[error("{kind} #{index} failed: {source}")]
    Mutation {
        kind: MutationKind,
        /// Position of the failing intent within its batch
        index: usize,
        source: RemoteError,
    },

    #[error("unsubscribe failed: {0}")]
    Unsubscribe(RemoteError),

    /// A live session already serves this query.
    #[error("query '{query}' is already synced by session {session}")]
    AlreadySyncing { query: String, session: String },

    /// Key extraction failed while reconciling.
    #[error("reconciliation failed: {0}")]
    Engine(#[from] mirror_engine::Error),
}

impl SyncError {
    /// The underlying remote fault, if this error came from the remote source.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Fetch(e)
            | SyncError::Subscription(e)
            | SyncError::Subscribe(e)
            | SyncError::Unsubscribe(e) => Some(e),
            SyncError::Mutation { source, .. } => Some(source),
            SyncError::AlreadySyncing { .. } | SyncError::Engine(_) => None,
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

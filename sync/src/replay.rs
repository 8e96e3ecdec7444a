//! Library side of the `mirror` command.
//!
//! `diff` is a single reconciliation over two item lists. `replay` pushes a
//! sequence of full snapshots through a live session over the in-memory
//! source and replica, waiting for each one to land before the next.

use std::sync::Arc;
use std::time::Duration;

use mirror_engine::{reconcile, FieldKey, ReconcileResult, Snapshot};
use serde_json::Value;

use crate::{
    Config, MemoryReplica, MemorySource, Observer, Query, RemoteError, Replica, SyncError,
    SyncSession,
};

type JsonReplica = MemoryReplica<Value, FieldKey>;

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("session not ready after {0:?}")]
    NotReady(Duration),

    #[error("line {line}: snapshot not applied within {timeout:?}")]
    Stalled { line: usize, timeout: Duration },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Compute the change batch turning `current` into `snapshot`, both keyed by
/// `key_field`.
pub fn diff(
    current: Vec<Value>,
    snapshot: Vec<Value>,
    key_field: &str,
) -> mirror_engine::Result<ReconcileResult<Value>> {
    let key_fn = FieldKey::new(key_field);
    let snapshot = Snapshot::from_items(snapshot, &key_fn)?;
    reconcile(current, snapshot, &key_fn)
}

/// Stream snapshots, one JSON array per line, through a sync session.
///
/// Blank lines are skipped. Returns the replica contents, in key order,
/// once every line has been applied.
pub async fn replay(text: &str, config: &Config) -> Result<Vec<Value>, ReplayError> {
    let source = MemorySource::new_shared(config.key_field.as_str());
    let replica: Arc<JsonReplica> = Arc::new(MemoryReplica::new(FieldKey::new(&config.key_field)));
    let query = Query::new(&config.namespace);
    let observer = Observer::new(|e| tracing::warn!(error = %e, "Sync fault"));

    let session = SyncSession::start(
        source.clone(),
        replica.clone(),
        query.clone(),
        FieldKey::new(&config.key_field),
        observer,
    )?;

    // The bootstrap fetch must be out of the way, or its result could land
    // on top of a replayed line.
    let bootstrapped = tokio::time::timeout(config.ready_timeout, async {
        let ready = session.ready().await;
        while !session.fetch_settled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        ready
    })
    .await
    .unwrap_or(false);
    if !bootstrapped {
        return Err(ReplayError::NotReady(config.ready_timeout));
    }

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let items: Vec<Value> = serde_json::from_str(line).map_err(|e| ReplayError::Parse {
            line: line_no,
            message: e.to_string(),
        })?;

        source.replace_all(&config.namespace, items)?;
        let expected: Vec<Value> = source.snapshot(&query).into_items().collect();
        if !converge(&replica, &expected, config.ready_timeout).await {
            return Err(ReplayError::Stalled {
                line: line_no,
                timeout: config.ready_timeout,
            });
        }

        tracing::info!(
            line = line_no,
            commits = replica.commit_count(),
            replica_size = replica.len(),
            "Applied snapshot"
        );
    }

    for fault in session.take_faults() {
        tracing::error!(error = %fault, "Reconciliation fault during replay");
    }
    session.cleanup()?;

    Ok(replica.items())
}

/// Wait until the replica holds exactly `expected`.
async fn converge(replica: &JsonReplica, expected: &[Value], limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
        while replica.items() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

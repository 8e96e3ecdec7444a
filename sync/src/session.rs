//! Sync sessions.
//!
//! A session owns the lifecycle of one subscription:
//!
//! 1. Opens a subscription and, concurrently, issues a one-shot fetch
//! 2. Reconciles whichever delivers first into the replica and signals
//!    readiness exactly once
//! 3. Reconciles every later snapshot
//! 4. Releases the subscription on cleanup
//!
//! ```text
//! Bootstrapping --first data--> Active --cleanup--> Stopped
//!       |                                             ^
//!       +-------------------cleanup-------------------+
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mirror_engine::{KeyExtractor, Reconciler, Snapshot};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::RegistryClaim;
use crate::remote::{RemoteSource, Subscriber, SubscriptionEvent, UnsubscribeHandle};
use crate::{Observer, Query, Replica, Result, SyncError};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Waiting for the first snapshot from either bootstrap path
    Bootstrapping,
    /// Replica populated; snapshots keep flowing
    Active,
    /// Subscription released
    Stopped,
}

/// Which path delivered a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Fetch,
    Subscription,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Fetch => "fetch",
            Origin::Subscription => "subscription",
        })
    }
}

/// State shared by the fetch and subscription tasks of one session.
struct Shared<R, K> {
    session_id: String,
    query: Query,
    replica: Arc<R>,
    key_fn: K,
    observer: Observer,
    ready: Arc<AtomicBool>,
    state: Arc<watch::Sender<SessionState>>,
    /// Serializes passes; held only across synchronous code.
    pass_lock: Mutex<()>,
    faults: Arc<Mutex<Vec<SyncError>>>,
}

impl<R, K> Shared<R, K>
where
    R: Replica,
    K: KeyExtractor<R::Item>,
{
    /// Run one reconciliation pass.
    ///
    /// The batch is computed in full before `begin`, so a key failure leaves
    /// the replica untouched.
    fn apply(&self, snapshot: Snapshot<R::Item>, origin: Origin) -> Result<()> {
        let _pass = self.pass_lock.lock();

        if !self.replica.is_available() {
            tracing::debug!(
                session = %self.session_id,
                %origin,
                "Replica unavailable, dropping snapshot"
            );
            return Ok(());
        }

        let result = Reconciler::new(&self.key_fn).reconcile(self.replica.items(), snapshot)?;
        let (inserted, updated, deleted) = (result.inserted, result.updated, result.deleted);

        self.replica.begin();
        for op in result {
            self.replica.write(op);
        }
        self.replica.commit();

        tracing::debug!(
            session = %self.session_id,
            query = %self.query,
            %origin,
            inserted,
            updated,
            deleted,
            "Reconciled snapshot"
        );

        // Readiness is the one Bootstrapping -> Active transition. A stopped
        // session still applies an in-flight fetch but never becomes ready.
        // Waiters wake only after the replica has been told.
        let became_ready = self.state.send_if_modified(|state| {
            if *state != SessionState::Bootstrapping {
                return false;
            }
            self.ready.store(true, Ordering::Release);
            self.replica.mark_ready();
            *state = SessionState::Active;
            true
        });

        if became_ready {
            tracing::info!(
                session = %self.session_id,
                query = %self.query,
                %origin,
                "Replica ready"
            );
        }

        Ok(())
    }

    /// Record a programming fault that aborted a pass.
    fn record_fault(&self, error: SyncError, origin: Origin) {
        tracing::error!(
            session = %self.session_id,
            %origin,
            error = %error,
            "Reconciliation aborted"
        );
        self.faults.lock().push(error);
    }

    /// Report a transport fault to the observer; the session carries on.
    fn report(&self, error: SyncError) {
        tracing::warn!(
            session = %self.session_id,
            query = %self.query,
            error = %error,
            "Transport fault"
        );
        self.observer.notify(&error);
    }

    fn handle(&self, snapshot: Snapshot<R::Item>, origin: Origin) {
        if let Err(e) = self.apply(snapshot, origin) {
            self.record_fault(e, origin);
        }
    }
}

/// A running sync session.
///
/// Dropping the session releases the subscription as well, but an
/// unsubscribe failure can then only be logged; call [`SyncSession::cleanup`]
/// to observe it.
pub struct SyncSession {
    id: String,
    query: Query,
    ready: Arc<AtomicBool>,
    fetch_settled: Arc<AtomicBool>,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    faults: Arc<Mutex<Vec<SyncError>>>,
    unsubscribe: Option<UnsubscribeHandle>,
    pump: Option<JoinHandle<()>>,
    claim: Option<RegistryClaim>,
}

impl SyncSession {
    /// Start synchronizing `query` from `source` into `replica`.
    ///
    /// Must be called within a tokio runtime. Fails only if the source
    /// refuses the subscription; fetch failures arrive at the observer.
    pub fn start<S, R, K>(
        source: Arc<S>,
        replica: Arc<R>,
        query: Query,
        key_fn: K,
        observer: Observer,
    ) -> Result<Self>
    where
        S: RemoteSource,
        R: Replica<Item = S::Item>,
        K: KeyExtractor<S::Item> + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        Self::start_with_id(id, source, replica, query, key_fn, observer)
    }

    /// Start a session under an id chosen by the caller.
    pub(crate) fn start_with_id<S, R, K>(
        id: String,
        source: Arc<S>,
        replica: Arc<R>,
        query: Query,
        key_fn: K,
        observer: Observer,
    ) -> Result<Self>
    where
        S: RemoteSource,
        R: Replica<Item = S::Item>,
        K: KeyExtractor<S::Item> + Send + Sync + 'static,
    {
        let (state_tx, state_rx) = watch::channel(SessionState::Bootstrapping);
        let state_tx = Arc::new(state_tx);
        let ready = Arc::new(AtomicBool::new(false));
        let fetch_settled = Arc::new(AtomicBool::new(false));
        let faults = Arc::new(Mutex::new(Vec::new()));

        let (subscriber, mut events) = Subscriber::channel();
        let unsubscribe = source
            .subscribe(&query, subscriber)
            .map_err(SyncError::Subscribe)?;

        let shared = Arc::new(Shared {
            session_id: id.clone(),
            query: query.clone(),
            replica,
            key_fn,
            observer,
            ready: ready.clone(),
            state: state_tx.clone(),
            pass_lock: Mutex::new(()),
            faults: faults.clone(),
        });

        // Fire-and-forget: cleanup never cancels it.
        tokio::spawn({
            let shared = shared.clone();
            let query = query.clone();
            let settled = fetch_settled.clone();
            async move {
                match source.fetch(&query).await {
                    Ok(snapshot) => shared.handle(snapshot, Origin::Fetch),
                    Err(e) => shared.report(SyncError::Fetch(e)),
                }
                settled.store(true, Ordering::Release);
            }
        });

        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SubscriptionEvent::Data(snapshot) => {
                        shared.handle(snapshot, Origin::Subscription)
                    }
                    SubscriptionEvent::Error(e) => shared.report(SyncError::Subscription(e)),
                }
            }
            tracing::debug!(session = %shared.session_id, "Subscription stream ended");
        });

        tracing::info!(session = %id, query = %query, "Sync session started");

        Ok(Self {
            id,
            query,
            ready,
            fetch_settled,
            state_tx,
            state_rx,
            faults,
            unsubscribe: Some(unsubscribe),
            pump: Some(pump),
            claim: None,
        })
    }

    pub(crate) fn with_claim(mut self, claim: RegistryClaim) -> Self {
        self.claim = Some(claim);
        self
    }

    /// Unique identifier of this session, used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Whether the replica has received its first population.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Whether the bootstrap fetch has finished, applied or reported.
    ///
    /// Until it has, a stale fetch result may still overwrite newer pushes.
    pub fn fetch_settled(&self) -> bool {
        self.fetch_settled.load(Ordering::Acquire)
    }

    /// Wait until the session leaves `Bootstrapping`.
    ///
    /// Returns `true` if the replica became ready, `false` if the session was
    /// stopped first.
    pub async fn ready(&self) -> bool {
        let mut state = self.state_rx.clone();
        let settled = state
            .wait_for(|s| *s != SessionState::Bootstrapping)
            .await
            .map(|s| *s == SessionState::Active);
        settled.unwrap_or(false)
    }

    /// Drain the programming faults recorded by background passes.
    pub fn take_faults(&self) -> Vec<SyncError> {
        std::mem::take(&mut *self.faults.lock())
    }

    /// Stop the session and release the subscription.
    ///
    /// The unsubscribe handle runs exactly once; its failure is returned. An
    /// in-flight bootstrap fetch is not cancelled.
    pub fn cleanup(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(unsubscribe) = self.unsubscribe.take() else {
            return Ok(());
        };

        self.state_tx.send_replace(SessionState::Stopped);
        // Passes never await, so the pump can only be parked on `recv` here.
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.claim = None;

        let result = unsubscribe.unsubscribe().map_err(SyncError::Unsubscribe);
        match &result {
            Ok(()) => tracing::info!(session = %self.id, query = %self.query, "Sync session stopped"),
            Err(e) => tracing::warn!(session = %self.id, error = %e, "Unsubscribe failed"),
        }
        result
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if self.unsubscribe.is_some() {
            // Errors are already logged by `stop`.
            let _ = self.stop();
        }
    }
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("state", &self.state())
            .finish()
    }
}

//! Replica owner interface and an in-memory implementation.
//!
//! The replica is owned by the reactive collection. Sessions never mutate it
//! directly; they hand it batches of change operations bracketed by
//! `begin`/`commit` and signal readiness once.

use std::collections::BTreeMap;

use mirror_engine::{ChangeOp, Key, KeyExtractor};
use parking_lot::Mutex;

/// Capabilities a session needs from the owner of the replica.
pub trait Replica: Send + Sync + 'static {
    type Item;

    /// Current contents, in the owner's iteration order.
    fn items(&self) -> Vec<Self::Item>;

    /// Start a batch.
    fn begin(&self);

    /// Stage one operation of the current batch.
    fn write(&self, op: ChangeOp<Self::Item>);

    /// Apply the current batch.
    fn commit(&self);

    /// Signal that the replica received its first authoritative population.
    fn mark_ready(&self);

    /// Whether the owner still accepts batches. A torn-down owner returns
    /// `false` and late deliveries are dropped.
    fn is_available(&self) -> bool {
        true
    }
}

struct Inner<T> {
    items: BTreeMap<Key, T>,
    pending: Option<Vec<ChangeOp<T>>>,
    batches: Vec<Vec<ChangeOp<T>>>,
    ready_signals: usize,
    open: bool,
}

/// A replica held in memory, ordered by key.
///
/// Writes are staged until `commit` and then applied in write order. Every
/// committed batch is kept so callers can inspect what was applied.
pub struct MemoryReplica<T, K> {
    key_fn: K,
    inner: Mutex<Inner<T>>,
}

impl<T, K> MemoryReplica<T, K>
where
    T: Clone,
    K: KeyExtractor<T>,
{
    /// Create an empty replica.
    pub fn new(key_fn: K) -> Self {
        Self {
            key_fn,
            inner: Mutex::new(Inner {
                items: BTreeMap::new(),
                pending: None,
                batches: Vec::new(),
                ready_signals: 0,
                open: true,
            }),
        }
    }

    /// Get an item by key.
    pub fn get(&self, key: &Key) -> Option<T> {
        self.inner.lock().items.get(key).cloned()
    }

    /// Keys currently held, in order.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.lock().items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Number of committed batches.
    pub fn commit_count(&self) -> usize {
        self.inner.lock().batches.len()
    }

    /// All committed batches, oldest first.
    pub fn committed_batches(&self) -> Vec<Vec<ChangeOp<T>>> {
        self.inner.lock().batches.clone()
    }

    /// How many times readiness was signalled.
    pub fn ready_signals(&self) -> usize {
        self.inner.lock().ready_signals
    }

    pub fn is_ready(&self) -> bool {
        self.ready_signals() > 0
    }

    /// Tear the replica down. Later batches are refused.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.open = false;
        inner.pending = None;
    }

    fn apply(&self, items: &mut BTreeMap<Key, T>, op: &ChangeOp<T>) {
        let key = match op.key(&self.key_fn) {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(error = %e, "Dropping change with unreadable key");
                return;
            }
        };

        match op {
            ChangeOp::Insert(item) | ChangeOp::Update(item) => {
                items.insert(key, item.clone());
            }
            ChangeOp::Delete(_) => {
                items.remove(&key);
            }
        }
    }
}

impl<T, K> Replica for MemoryReplica<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: KeyExtractor<T> + Send + Sync + 'static,
{
    type Item = T;

    fn items(&self) -> Vec<T> {
        self.inner.lock().items.values().cloned().collect()
    }

    fn begin(&self) {
        let mut inner = self.inner.lock();
        if inner.pending.is_some() {
            tracing::warn!("Batch started while another was open; discarding staged writes");
        }
        inner.pending = Some(Vec::new());
    }

    fn write(&self, op: ChangeOp<T>) {
        match self.inner.lock().pending.as_mut() {
            Some(pending) => pending.push(op),
            None => tracing::warn!(kind = ?op.kind(), "Write outside of a batch ignored"),
        }
    }

    fn commit(&self) {
        let mut inner = self.inner.lock();
        let Some(batch) = inner.pending.take() else {
            tracing::warn!("Commit without an open batch ignored");
            return;
        };

        let mut items = std::mem::take(&mut inner.items);
        for op in &batch {
            self.apply(&mut items, op);
        }
        inner.items = items;
        inner.batches.push(batch);
    }

    fn mark_ready(&self) {
        self.inner.lock().ready_signals += 1;
    }

    fn is_available(&self) -> bool {
        self.inner.lock().open
    }
}

//! Shared fixtures for mirror-sync integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirror_engine::{FieldKey, Key, Snapshot};
use mirror_sync::{
    MemoryReplica, Observer, Query, RemoteError, RemoteSource, Subscriber, SyncError,
    UnsubscribeHandle,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

pub type FetchReply = Result<Snapshot<Value>, RemoteError>;
pub type JsonReplica = MemoryReplica<Value, FieldKey>;

/// A mutation the scripted source received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(Value),
    Update(String, Value),
    Delete(String),
}

/// A remote source driven step by step from the test body.
///
/// The fetch resolves only when the test sends a reply; subscription events
/// are pushed by hand. Mutations are recorded and can be rejected per key.
#[derive(Default)]
pub struct ScriptedSource {
    fetch_reply: Mutex<Option<oneshot::Receiver<FetchReply>>>,
    fetch_calls: AtomicUsize,
    subscribers: Mutex<Vec<Subscriber<Value>>>,
    fail_subscribe: AtomicBool,
    unsubscribes: Arc<AtomicUsize>,
    fail_unsubscribe: Arc<AtomicBool>,
    calls: Mutex<Vec<Call>>,
    rejected: Mutex<HashSet<String>>,
    subscribe_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl ScriptedSource {
    /// Create a source and the sender that answers its first fetch.
    ///
    /// Dropping the sender leaves the fetch pending forever.
    pub fn new() -> (Arc<Self>, oneshot::Sender<FetchReply>) {
        let (tx, rx) = oneshot::channel();
        let source = Self {
            fetch_reply: Mutex::new(Some(rx)),
            ..Self::default()
        };
        (Arc::new(source), tx)
    }

    pub fn push_data(&self, items: Vec<Value>) {
        let snapshot = snapshot(items);
        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_data(snapshot.clone());
        }
    }

    pub fn push_error(&self, message: &str) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.on_error(RemoteError::new(message));
        }
    }

    pub fn fail_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    /// Run `hook` inside every later `subscribe` call.
    pub fn on_subscribe(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.subscribe_hook.lock() = Some(Box::new(hook));
    }

    pub fn fail_unsubscribe(&self) {
        self.fail_unsubscribe.store(true, Ordering::SeqCst);
    }

    /// Reject every mutation addressed to `key`.
    pub fn reject(&self, key: &str) {
        self.rejected.lock().insert(key.to_string());
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, call: Call, key: &str) -> Result<(), RemoteError> {
        self.calls.lock().push(call);
        if self.rejected.lock().contains(key) {
            Err(RemoteError::new(format!("{key} rejected")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    type Item = Value;
    type Changes = Value;

    async fn fetch(&self, _query: &Query) -> Result<Snapshot<Value>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.fetch_reply.lock().take();
        match reply {
            Some(rx) => match rx.await {
                Ok(reply) => reply,
                Err(_) => std::future::pending().await,
            },
            None => std::future::pending().await,
        }
    }

    fn subscribe(
        &self,
        _query: &Query,
        subscriber: Subscriber<Value>,
    ) -> Result<UnsubscribeHandle, RemoteError> {
        if let Some(hook) = self.subscribe_hook.lock().as_ref() {
            hook();
        }
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(RemoteError::new("permission denied"));
        }
        self.subscribers.lock().push(subscriber);

        let unsubscribes = self.unsubscribes.clone();
        let fail = self.fail_unsubscribe.clone();
        Ok(Box::new(move || -> Result<(), RemoteError> {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
            if fail.load(Ordering::SeqCst) {
                Err(RemoteError::new("already closed"))
            } else {
                Ok(())
            }
        }))
    }

    async fn create(&self, _namespace: &str, item: &Value) -> Result<(), RemoteError> {
        let key = Key::from_json(&item["id"])
            .map(|k| k.to_string())
            .unwrap_or_default();
        self.record(Call::Create(item.clone()), &key)
    }

    async fn update(&self, _namespace: &str, key: &str, changes: &Value) -> Result<(), RemoteError> {
        self.record(Call::Update(key.to_string(), changes.clone()), key)
    }

    async fn delete(&self, _namespace: &str, key: &str) -> Result<(), RemoteError> {
        self.record(Call::Delete(key.to_string()), key)
    }
}

pub fn by_id() -> FieldKey {
    FieldKey::new("id")
}

pub fn snapshot(items: Vec<Value>) -> Snapshot<Value> {
    Snapshot::from_items(items, &by_id()).unwrap()
}

pub fn replica() -> Arc<JsonReplica> {
    Arc::new(MemoryReplica::new(by_id()))
}

/// An observer that keeps every error it is handed.
pub fn recording_observer() -> (Observer, Arc<Mutex<Vec<SyncError>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer = Observer::new(move |e: &SyncError| sink.lock().push(e.clone()));
    (observer, seen)
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give background tasks time to run before asserting that nothing happened.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

//! In-memory remote source.
//!
//! Holds JSON items per namespace and pushes a full filtered snapshot to
//! every matching subscriber after each write, the way push-based backends
//! do. Useful for tests, demos, and the `mirror replay` command.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mirror_engine::{FieldKey, Key, KeyExtractor, Snapshot};
use serde_json::{Map, Value};

use crate::remote::{RemoteSource, Subscriber, UnsubscribeHandle};
use crate::{Query, RemoteError};

/// A single live subscription.
#[derive(Debug)]
struct Subscription {
    query: Query,
    subscriber: Subscriber<Value>,
}

/// A push-based source backed by memory.
#[derive(Debug)]
pub struct MemorySource {
    key_fn: FieldKey,
    /// Items by namespace, then by key.
    collections: DashMap<String, BTreeMap<Key, Value>>,
    /// Live subscriptions, keyed by subscription ID.
    subscriptions: Arc<DashMap<String, Subscription>>,
    offline: AtomicBool,
}

impl MemorySource {
    /// Create an empty source whose items are keyed by `key_field`.
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_fn: FieldKey::new(key_field),
            collections: DashMap::new(),
            subscriptions: Arc::new(DashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Create a new source wrapped in Arc for sharing.
    pub fn new_shared(key_field: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(key_field))
    }

    /// Replace the whole content of `namespace` and push the new state.
    pub fn replace_all(&self, namespace: &str, items: Vec<Value>) -> Result<(), RemoteError> {
        let mut collection = BTreeMap::new();
        for item in items {
            let key = self.key_of(&item)?;
            collection.insert(key, item);
        }
        self.collections.insert(namespace.to_string(), collection);

        self.broadcast(namespace);
        Ok(())
    }

    /// Current result of `query`, ordered by key.
    pub fn snapshot(&self, query: &Query) -> Snapshot<Value> {
        match self.collections.get(&query.namespace) {
            Some(collection) => collection
                .iter()
                .filter(|(_, item)| query.matches(item))
                .map(|(key, item)| (key.clone(), item.clone()))
                .collect(),
            None => Snapshot::new(),
        }
    }

    /// Simulate losing or regaining connectivity.
    ///
    /// While offline, fetches and writes fail and nothing is pushed. Coming
    /// back online pushes a fresh snapshot to every subscriber.
    pub fn set_offline(&self, offline: bool) {
        let was_offline = self.offline.swap(offline, Ordering::AcqRel);
        tracing::info!(offline, "Memory source connectivity changed");

        if was_offline && !offline {
            let namespaces: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
            for namespace in namespaces {
                self.broadcast(&namespace);
            }
        }
    }

    /// Push a transport fault to every subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit_error(&self, error: RemoteError) -> usize {
        let mut sent_count = 0;
        for entry in self.subscriptions.iter() {
            if entry.value().subscriber.on_error(error.clone()) {
                sent_count += 1;
            }
        }
        sent_count
    }

    /// Drop every subscription without telling the subscribers, as a
    /// server-side eviction would. Later unsubscribe calls fail.
    pub fn drop_subscriptions(&self) -> usize {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        tracing::info!(count, "Memory source dropped all subscriptions");
        count
    }

    /// Get the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn key_of(&self, item: &Value) -> Result<Key, RemoteError> {
        self.key_fn
            .key_of(item)
            .map_err(|e| RemoteError::new(format!("invalid item: {e}")))
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::Acquire) {
            Err(RemoteError::new("offline"))
        } else {
            Ok(())
        }
    }

    /// Push the current snapshot of `namespace` to its subscribers.
    fn broadcast(&self, namespace: &str) -> usize {
        if self.offline.load(Ordering::Acquire) {
            return 0;
        }

        let mut sent_count = 0;
        for entry in self.subscriptions.iter() {
            let subscription = entry.value();
            if subscription.query.namespace != namespace {
                continue;
            }
            if subscription
                .subscriber
                .on_data(self.snapshot(&subscription.query))
            {
                sent_count += 1;
            }
        }

        tracing::debug!(namespace, recipients = sent_count, "Pushed snapshot");
        sent_count
    }
}

/// Find the stored key a string-form key refers to.
fn resolve_key(collection: &BTreeMap<Key, Value>, key: &str) -> Option<Key> {
    let as_int = key
        .parse::<i64>()
        .ok()
        .map(Key::Int)
        .filter(|k| collection.contains_key(k));
    as_int.or_else(|| Some(Key::from(key)).filter(|k| collection.contains_key(k)))
}

#[async_trait]
impl RemoteSource for MemorySource {
    type Item = Value;
    type Changes = Map<String, Value>;

    async fn fetch(&self, query: &Query) -> Result<Snapshot<Value>, RemoteError> {
        self.ensure_online()?;
        Ok(self.snapshot(query))
    }

    fn subscribe(
        &self,
        query: &Query,
        subscriber: Subscriber<Value>,
    ) -> Result<UnsubscribeHandle, RemoteError> {
        let id = uuid::Uuid::new_v4().to_string();

        {
            // Registered before the first push. Holding the entry makes any
            // concurrent broadcast queue its newer snapshot behind this one.
            let subscription = self.subscriptions.entry(id.clone()).or_insert(Subscription {
                query: query.clone(),
                subscriber,
            });
            if !self.offline.load(Ordering::Acquire) {
                subscription.subscriber.on_data(self.snapshot(query));
            }
        }
        tracing::debug!(subscription = %id, query = %query, "Subscription opened");

        let subscriptions = self.subscriptions.clone();
        Ok(Box::new(move || -> Result<(), RemoteError> {
            match subscriptions.remove(&id) {
                Some(_) => {
                    tracing::debug!(subscription = %id, "Subscription closed");
                    Ok(())
                }
                None => Err(RemoteError::new(format!("subscription {id} not found"))),
            }
        }))
    }

    async fn create(&self, namespace: &str, item: &Value) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let key = self.key_of(item)?;

        {
            let mut collection = self.collections.entry(namespace.to_string()).or_default();
            if collection.contains_key(&key) {
                return Err(RemoteError::new(format!("{namespace}/{key} already exists")));
            }
            collection.insert(key, item.clone());
        }

        self.broadcast(namespace);
        Ok(())
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        changes: &Map<String, Value>,
    ) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let not_found = || RemoteError::new(format!("{namespace}/{key} not found"));

        {
            let mut collection = self.collections.get_mut(namespace).ok_or_else(not_found)?;
            let stored_key = resolve_key(&collection, key).ok_or_else(not_found)?;
            let item = collection.get_mut(&stored_key).ok_or_else(not_found)?;

            let Some(fields) = item.as_object_mut() else {
                return Err(RemoteError::new(format!("{namespace}/{key} is not an object")));
            };
            let key_field = self.key_fn.field();
            if let Some(new_key) = changes.get(key_field) {
                if Key::from_json(new_key).as_ref() != Some(&stored_key) {
                    return Err(RemoteError::new(format!(
                        "field '{key_field}' of {namespace}/{key} cannot change"
                    )));
                }
            }
            for (field, value) in changes {
                fields.insert(field.clone(), value.clone());
            }
        }

        self.broadcast(namespace);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let not_found = || RemoteError::new(format!("{namespace}/{key} not found"));

        {
            let mut collection = self.collections.get_mut(namespace).ok_or_else(not_found)?;
            let stored_key = resolve_key(&collection, key).ok_or_else(not_found)?;
            collection.remove(&stored_key);
        }

        self.broadcast(namespace);
        Ok(())
    }
}

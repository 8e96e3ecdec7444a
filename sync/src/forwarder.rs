//! Mutation forwarding.
//!
//! Local write intents are sent to the remote source one at a time, in
//! batch order. The first rejection stops the batch, is reported to the
//! observer, and is returned to the caller so it can roll back optimistic
//! state. The replica is never touched here.

use std::sync::Arc;

use mirror_engine::{DeleteIntent, MutationKind, UpdateIntent};

use crate::remote::RemoteSource;
use crate::{Observer, RemoteError, Result, SyncError};

/// Forwards mutation intents for one namespace to a remote source.
pub struct MutationForwarder<S> {
    source: Arc<S>,
    namespace: String,
    observer: Observer,
}

impl<S: RemoteSource> MutationForwarder<S> {
    /// Create a forwarder writing into `namespace`.
    pub fn new(source: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
            observer: Observer::none(),
        }
    }

    /// Report mutation failures to `observer` as well.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Create every item, in order.
    pub async fn forward_insert(&self, items: &[S::Item]) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            let outcome = self.source.create(&self.namespace, item).await;
            self.check(MutationKind::Insert, index, outcome)?;
        }
        self.log_batch(MutationKind::Insert, items.len());
        Ok(())
    }

    /// Apply partial changes, in order. Keys are sent in string form.
    pub async fn forward_update(&self, intents: &[UpdateIntent<S::Changes>]) -> Result<()> {
        for (index, intent) in intents.iter().enumerate() {
            let key = intent.key.to_string();
            let outcome = self
                .source
                .update(&self.namespace, &key, &intent.changes)
                .await;
            self.check(MutationKind::Update, index, outcome)?;
        }
        self.log_batch(MutationKind::Update, intents.len());
        Ok(())
    }

    /// Delete every key, in order. Keys are sent in string form.
    pub async fn forward_delete(&self, intents: &[DeleteIntent]) -> Result<()> {
        for (index, intent) in intents.iter().enumerate() {
            let key = intent.key.to_string();
            let outcome = self.source.delete(&self.namespace, &key).await;
            self.check(MutationKind::Delete, index, outcome)?;
        }
        self.log_batch(MutationKind::Delete, intents.len());
        Ok(())
    }

    fn check(
        &self,
        kind: MutationKind,
        index: usize,
        outcome: std::result::Result<(), RemoteError>,
    ) -> Result<()> {
        outcome.map_err(|source| {
            let error = SyncError::Mutation {
                kind,
                index,
                source,
            };
            tracing::warn!(
                namespace = %self.namespace,
                %kind,
                index,
                error = %error,
                "Mutation rejected"
            );
            self.observer.notify(&error);
            error
        })
    }

    fn log_batch(&self, kind: MutationKind, count: usize) {
        tracing::debug!(namespace = %self.namespace, %kind, count, "Forwarded mutations");
    }
}

impl<S> Clone for MutationForwarder<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            namespace: self.namespace.clone(),
            observer: self.observer.clone(),
        }
    }
}

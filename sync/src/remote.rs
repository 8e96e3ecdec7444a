//! Remote push source interface.
//!
//! The remote source is an external collaborator: it owns transport,
//! persistence, offline queues and retries. Mirror only needs a one-shot
//! read, a full-snapshot subscription, and the three write operations.

use async_trait::async_trait;
use mirror_engine::Snapshot;
use tokio::sync::mpsc;

use crate::{Query, RemoteError};

/// Something delivered on a subscription.
#[derive(Debug)]
pub enum SubscriptionEvent<T> {
    /// A complete snapshot of the query result
    Data(Snapshot<T>),
    /// A transport fault; the subscription stays open
    Error(RemoteError),
}

/// The receiving end handed to [`RemoteSource::subscribe`].
///
/// Plays the role of the data and error callbacks. Delivery never blocks;
/// events queue until the session gets to them.
#[derive(Debug)]
pub struct Subscriber<T> {
    sender: mpsc::UnboundedSender<SubscriptionEvent<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Subscriber<T> {
    /// Create a subscriber and the stream of events it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SubscriptionEvent<T>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Deliver a snapshot. Returns `false` once the session is gone.
    pub fn on_data(&self, snapshot: Snapshot<T>) -> bool {
        self.sender.send(SubscriptionEvent::Data(snapshot)).is_ok()
    }

    /// Deliver a transport fault. Returns `false` once the session is gone.
    pub fn on_error(&self, error: RemoteError) -> bool {
        self.sender.send(SubscriptionEvent::Error(error)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Releases a subscription.
///
/// Consumed on use, so it can run at most once. Failures are returned to the
/// caller, never swallowed.
pub trait Unsubscribe: Send {
    fn unsubscribe(self: Box<Self>) -> Result<(), RemoteError>;
}

impl<F> Unsubscribe for F
where
    F: FnOnce() -> Result<(), RemoteError> + Send,
{
    fn unsubscribe(self: Box<Self>) -> Result<(), RemoteError> {
        (*self)()
    }
}

/// Boxed unsubscribe handle returned by [`RemoteSource::subscribe`].
pub type UnsubscribeHandle = Box<dyn Unsubscribe>;

/// A push-based remote data source.
#[async_trait]
pub trait RemoteSource: Send + Sync + 'static {
    /// Items held by the source
    type Item: Clone + Send + Sync + 'static;
    /// Partial changes accepted by `update`
    type Changes: Send + Sync;

    /// One-shot read of the full query result.
    async fn fetch(&self, query: &Query) -> Result<Snapshot<Self::Item>, RemoteError>;

    /// Open a subscription delivering full snapshots of `query`.
    ///
    /// An error here means the query itself was unacceptable; transport
    /// trouble after this point arrives through [`Subscriber::on_error`].
    fn subscribe(
        &self,
        query: &Query,
        subscriber: Subscriber<Self::Item>,
    ) -> Result<UnsubscribeHandle, RemoteError>;

    async fn create(&self, namespace: &str, item: &Self::Item) -> Result<(), RemoteError>;

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        changes: &Self::Changes,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RemoteError>;
}

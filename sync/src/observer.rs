//! Error observer callback.
//!
//! Applications may register a single callback that sees every transport and
//! mutation fault. Key-extraction faults never reach it; they propagate as
//! errors from the call that hit them.

use std::fmt;
use std::sync::Arc;

use crate::SyncError;

type Callback = dyn Fn(&SyncError) + Send + Sync;

/// Optional error callback shared between a session and its forwarder.
#[derive(Clone, Default)]
pub struct Observer {
    callback: Option<Arc<Callback>>,
}

impl Observer {
    /// An observer that discards every error.
    pub fn none() -> Self {
        Self { callback: None }
    }

    pub fn new(callback: impl Fn(&SyncError) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn is_set(&self) -> bool {
        self.callback.is_some()
    }

    /// Report an error to the callback, if one is registered.
    pub fn notify(&self, error: &SyncError) {
        if let Some(callback) = &self.callback {
            callback(error);
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteError;
    use parking_lot::Mutex;

    #[test]
    fn notify_reaches_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = Observer::new(move |e| sink.lock().push(e.clone()));

        let err = SyncError::Fetch(RemoteError::new("net down"));
        observer.notify(&err);

        assert_eq!(*seen.lock(), vec![err]);
    }

    #[test]
    fn unset_observer_is_a_no_op() {
        let observer = Observer::none();
        assert!(!observer.is_set());
        observer.notify(&SyncError::Fetch(RemoteError::new("ignored")));
    }
}

//! # Completion Bridge
//!
//! Turns a callback-driven [`Pending`] completion into a blocking call.
//!
//! ## How It Works
//!
//! ```text
//! settle(pending)
//!   ├─ oneshot pair: fulfilled / rejected
//!   ├─ Registration wraps both senders, hands out one-shot callbacks
//!   ├─ pending.then(on_fulfilled, on_rejected)
//!   ├─ block until the first channel fires
//!   └─ Registration dropped: both callback slots released
//! ```
//!
//! The caller blocks only its own thread. The storage side settles from
//! wherever it runs (inline inside `then`, or on an event-loop thread), and
//! each call owns its channel pair, so concurrent callers never receive each
//! other's results.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::{self, Either};
use tracing::trace;

use crate::FsError;
use crate::storage::{Callback, Pending, StorageError, StorageErrorKind};

/// Block until `pending` settles, translating a rejection into [`FsError`].
///
/// `path` only provides context for the returned error.
///
/// # Errors
///
/// - [`FsError::NotFound`] if the backend rejected with a not-found error
/// - [`FsError::Backend`] for every other rejection
/// - [`FsError::Unsettled`] if the backend dropped both callbacks
pub fn settle<T: Send + 'static>(pending: Pending<T>, path: &Path) -> Result<T, FsError> {
    let (fulfilled_tx, fulfilled_rx) = oneshot::channel::<T>();
    let (rejected_tx, rejected_rx) = oneshot::channel::<StorageError>();
    let (registration, on_fulfilled, on_rejected) = Registration::new(fulfilled_tx, rejected_tx);

    pending.then(on_fulfilled, on_rejected);
    let outcome = block_on(first_settled(fulfilled_rx, rejected_rx));
    drop(registration);

    match outcome {
        Some(Ok(value)) => {
            trace!(target: "opfs::bridge", event = "fulfilled", path = %path.display());
            Ok(value)
        }
        Some(Err(error)) => {
            trace!(
                target: "opfs::bridge",
                event = "rejected",
                path = %path.display(),
                kind = error.kind().name()
            );
            Err(classify(error, path))
        }
        None => Err(FsError::Unsettled {
            path: path.to_path_buf(),
        }),
    }
}

/// Map a backend rejection onto the crate's error taxonomy.
pub(crate) fn classify(error: StorageError, path: &Path) -> FsError {
    match error.kind() {
        StorageErrorKind::NotFound => FsError::NotFound {
            path: path.to_path_buf(),
        },
        _ => FsError::Backend {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

async fn first_settled<T>(
    fulfilled: oneshot::Receiver<T>,
    rejected: oneshot::Receiver<StorageError>,
) -> Option<Result<T, StorageError>> {
    // A cancelled receiver means its callback was dropped unused; the other
    // one may still fire.
    match future::select(fulfilled, rejected).await {
        Either::Left((Ok(value), _)) => Some(Ok(value)),
        Either::Right((Ok(error), _)) => Some(Err(error)),
        Either::Left((Err(oneshot::Canceled), rejected)) => rejected.await.ok().map(Err),
        Either::Right((Err(oneshot::Canceled), fulfilled)) => fulfilled.await.ok().map(Ok),
    }
}

/// The pair of callback registrations for one [`settle`] call.
///
/// Callbacks own their sender slot; the registration only keeps weak
/// references. Dropping the registration empties whichever slots are still
/// alive, so a callback firing after `settle` returned is a no-op, and a
/// callback the backend discards closes its channel.
pub(crate) struct Registration<T> {
    fulfilled: Weak<Mutex<Option<oneshot::Sender<T>>>>,
    rejected: Weak<Mutex<Option<oneshot::Sender<StorageError>>>>,
}

impl<T: Send + 'static> Registration<T> {
    fn new(
        fulfilled: oneshot::Sender<T>,
        rejected: oneshot::Sender<StorageError>,
    ) -> (Self, Callback<T>, Callback<StorageError>) {
        let fulfilled = Arc::new(Mutex::new(Some(fulfilled)));
        let rejected = Arc::new(Mutex::new(Some(rejected)));
        let registration = Self {
            fulfilled: Arc::downgrade(&fulfilled),
            rejected: Arc::downgrade(&rejected),
        };
        let on_fulfilled: Callback<T> = Box::new(move |value| forward(&fulfilled, value));
        let on_rejected: Callback<StorageError> = Box::new(move |error| forward(&rejected, error));
        (registration, on_fulfilled, on_rejected)
    }
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.fulfilled.upgrade() {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
        if let Some(slot) = self.rejected.upgrade() {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
    }
}

fn forward<V>(slot: &Mutex<Option<oneshot::Sender<V>>>, value: V) {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        // The receiver is gone once settle returned.
        let _ = sender.send(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn on_thread<T: Send + 'static>(result: Result<T, StorageError>) -> Pending<T> {
        Pending::new(move |on_fulfilled, on_rejected| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                match result {
                    Ok(value) => on_fulfilled(value),
                    Err(error) => on_rejected(error),
                }
            });
        })
    }

    #[test]
    fn settle_returns_inline_fulfillment() {
        let value = settle(Pending::resolved(42u32), Path::new("/x")).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn settle_waits_for_fulfillment_from_other_thread() {
        let value = settle(on_thread(Ok("done".to_string())), Path::new("/x")).unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn settle_maps_not_found_rejection() {
        let err = settle(
            on_thread::<()>(Err(StorageError::from_host("NotFoundError", "missing"))),
            Path::new("/a/b"),
        )
        .unwrap_err();
        match err {
            FsError::NotFound { path } => assert_eq!(path, PathBuf::from("/a/b")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn settle_keeps_other_rejections_as_backend_errors() {
        let err = settle(
            Pending::<()>::rejected(StorageError::from_host("QuotaExceededError", "full")),
            Path::new("/big"),
        )
        .unwrap_err();
        let source = err.storage_error().expect("backend error");
        assert_eq!(source.kind(), StorageErrorKind::Other);
        assert_eq!(source.message(), "full");
    }

    #[test]
    fn settle_reports_dropped_callbacks() {
        let pending = Pending::<u8>::new(|on_fulfilled, on_rejected| {
            drop(on_fulfilled);
            drop(on_rejected);
        });
        let err = settle(pending, Path::new("/lost")).unwrap_err();
        assert!(matches!(err, FsError::Unsettled { .. }));
    }

    #[test]
    fn late_callback_after_settle_is_ignored() {
        let (keep_tx, keep_rx) = mpsc::channel();
        let pending = Pending::<u8>::new(move |on_fulfilled, on_rejected| {
            on_rejected(StorageError::from_host("TypeMismatchError", "dir"));
            keep_tx.send(on_fulfilled).unwrap();
        });
        let err = settle(pending, Path::new("/d")).unwrap_err();
        assert!(matches!(err, FsError::Backend { .. }));

        // The stale fulfillment callback finds its slot released.
        let stale = keep_rx.recv().unwrap();
        stale(9);
    }

    #[test]
    fn concurrent_settles_do_not_cross_deliver() {
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                thread::spawn(move || settle(on_thread(Ok(i)), Path::new("/c")).unwrap())
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), i as u32);
        }
    }
}

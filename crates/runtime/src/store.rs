use std::sync::Arc;

use tokio::sync::watch;

/// Immutable-snapshot state store.
///
/// Every update replaces the current snapshot with a new `Arc<S>`; readers
/// holding an older snapshot keep seeing it unchanged. Subscribers are woken
/// only when the new value differs from the current one.
#[derive(Debug)]
pub struct Store<S> {
    tx: watch::Sender<Arc<S>>,
}

impl<S> Store<S>
where
    S: PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    pub fn get(&self) -> Arc<S> {
        self.tx.borrow().clone()
    }

    /// Replace the snapshot with `f(current)`.
    ///
    /// Returns `true` if the state changed and subscribers were notified.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&S) -> S,
    {
        self.tx.send_if_modified(|current| {
            let next = f(current);
            if **current == next {
                return false;
            }
            *current = Arc::new(next);
            true
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.tx.subscribe()
    }
}

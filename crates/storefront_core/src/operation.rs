//! crates/storefront_core/src/operation.rs
//!
//! A generic wrapper around one asynchronous call that tracks its loading,
//! result and error state and publishes every change to subscribers.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::ports::{ClientError, ClientResult};

/// Snapshot of an `AsyncOperation`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub data: Option<T>,
    pub error: Option<ClientError>,
    pub loading: bool,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
        }
    }
}

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct AsyncOperation<T> {
    state: watch::Sender<OperationState<T>>,
    on_success: Option<SuccessCallback<T>>,
}

/// Clears `loading` if the call never reached settlement, e.g. because the
/// caller dropped the `execute` future mid-flight.
struct SettleGuard<'a, T> {
    state: &'a watch::Sender<OperationState<T>>,
    armed: bool,
}

impl<T> Drop for SettleGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(|s| s.loading = false);
        }
    }
}

impl<T> Default for AsyncOperation<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncOperation<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (state, _) = watch::channel(OperationState::default());
        Self {
            state,
            on_success: None,
        }
    }

    /// Registers a callback fired with the fresh result after every success.
    pub fn with_on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn snapshot(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ClientError> {
        self.state.borrow().error.clone()
    }

    /// Runs `op`, recording its outcome. A failure leaves the previous `data`
    /// in place and is handed back to the caller after being recorded.
    ///
    /// Overlapping calls are not serialized; whichever settles last decides
    /// the final state.
    pub async fn execute<F, Fut>(&self, op: F) -> ClientResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        self.state.send_modify(|s| s.loading = true);
        let mut guard = SettleGuard {
            state: &self.state,
            armed: true,
        };

        let result = op().await;

        match &result {
            Ok(value) => {
                self.state.send_modify(|s| {
                    s.data = Some(value.clone());
                    s.error = None;
                    s.loading = false;
                });
                guard.armed = false;
                if let Some(callback) = &self.on_success {
                    callback(value);
                }
            }
            Err(e) => {
                self.state.send_modify(|s| {
                    s.error = Some(e.clone());
                    s.loading = false;
                });
                guard.armed = false;
            }
        }
        result
    }

    /// Drops any recorded data and error.
    pub fn reset(&self) {
        self.state.send_modify(|s| {
            s.data = None;
            s.error = None;
            s.loading = false;
        });
    }
}

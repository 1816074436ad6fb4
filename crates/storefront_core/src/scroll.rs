//! crates/storefront_core/src/scroll.rs
//!
//! The infinite scroll controller. It pages through a `PageSource`,
//! accumulating results in fetch order, and uses a `VisibilitySignal` on the
//! last rendered element to decide when to ask for the next page.

use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::ports::{
    ClientError, ElementHandle, PageSource, VisibilityObservation, VisibilitySignal,
    VisibleCallback,
};

//=========================================================================================
// Public State
//=========================================================================================

/// Snapshot of one scroll session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollState<T> {
    pub items: Vec<T>,
    /// Next 1-indexed page to request.
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<ClientError>,
}

impl<T> Default for ScrollState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_more: true,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Exhausted,
    Disposed,
    NoFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Fetched { count: usize },
    Failed,
    Skipped(SkipReason),
}

//=========================================================================================
// Internals
//=========================================================================================

#[derive(Default)]
struct Control {
    loading: bool,
    disposed: bool,
    last_element: Option<ElementHandle>,
    observation: Option<Box<dyn VisibilityObservation>>,
}

struct Inner<T> {
    source: Arc<dyn PageSource<T>>,
    signal: Arc<dyn VisibilitySignal>,
    threshold: f64,
    state: watch::Sender<ScrollState<T>>,
    control: Mutex<Control>,
}

/// Releases the fetch slot if the fetch future is dropped before it settles,
/// and puts the observation back on the last element.
struct FetchGuard<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: &'a Arc<Inner<T>>,
    armed: bool,
}

impl<T> Drop for FetchGuard<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.armed {
            self.inner.control().loading = false;
            self.inner.state.send_modify(|s| s.loading = false);
            self.inner.attach();
        }
    }
}

impl<T> Inner<T> {
    fn control(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let observation = match self.control.get_mut() {
            Ok(control) => control.observation.take(),
            Err(poisoned) => poisoned.into_inner().observation.take(),
        };
        if let Some(observation) = observation {
            observation.dispose();
        }
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load_more(self: &Arc<Self>) -> LoadOutcome {
        // Check and claim the slot before the first await.
        let (page, observation) = {
            let mut control = self.control();
            if control.disposed {
                return LoadOutcome::Skipped(SkipReason::Disposed);
            }
            if control.loading {
                return LoadOutcome::Skipped(SkipReason::InFlight);
            }
            let (page, has_more) = {
                let state = self.state.borrow();
                (state.page, state.has_more)
            };
            if !has_more {
                return LoadOutcome::Skipped(SkipReason::Exhausted);
            }
            control.loading = true;
            (page, control.observation.take())
        };
        if let Some(observation) = observation {
            observation.dispose();
        }
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        let mut guard = FetchGuard {
            inner: self,
            armed: true,
        };

        debug!(page, "Fetching page");
        let result = self.source.fetch_page(page).await;

        let disposed = {
            let mut control = self.control();
            control.loading = false;
            control.disposed
        };
        guard.armed = false;
        if disposed {
            debug!(page, "Dropping page fetched after teardown");
            return LoadOutcome::Skipped(SkipReason::Disposed);
        }

        let outcome = match result {
            Ok(fetched) => {
                let count = fetched.data.len();
                self.state.send_modify(|s| {
                    s.items.extend(fetched.data);
                    s.has_more = fetched.has_more;
                    s.page += 1;
                    s.loading = false;
                });
                debug!(page, count, has_more = fetched.has_more, "Page appended");
                LoadOutcome::Fetched { count }
            }
            Err(e) => {
                warn!(page, "Page fetch failed: {}", e);
                self.state.send_modify(|s| {
                    s.error = Some(e);
                    s.loading = false;
                });
                LoadOutcome::Failed
            }
        };
        self.attach();
        outcome
    }

    /// (Re)establishes the observation on the last element when a fetch is
    /// allowed to happen.
    fn attach(self: &Arc<Self>) {
        let element = {
            let control = self.control();
            if control.disposed || control.loading || !self.state.borrow().has_more {
                return;
            }
            match &control.last_element {
                Some(element) => element.clone(),
                None => return,
            }
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let callback: VisibleCallback = Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.load_more().await;
                }
            }
            .boxed()
        });
        let observation = self.signal.on_visible(&element, self.threshold, callback);

        let stale = {
            let mut control = self.control();
            if control.disposed || control.loading {
                Some(observation)
            } else {
                control.observation.replace(observation)
            }
        };
        if let Some(stale) = stale {
            stale.dispose();
        }
    }

    fn detach(&self) {
        let observation = self.control().observation.take();
        if let Some(observation) = observation {
            observation.dispose();
        }
    }
}

//=========================================================================================
// The Controller
//=========================================================================================

/// Handle to one scroll session. Clones share the same session.
pub struct InfiniteScroll<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for InfiniteScroll<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> InfiniteScroll<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `threshold` is the distance in pixels from the viewport edge at which
    /// the last element counts as visible.
    pub fn new<S>(source: S, signal: Arc<dyn VisibilitySignal>, threshold: f64) -> Self
    where
        S: PageSource<T> + 'static,
    {
        let (state, _) = watch::channel(ScrollState::default());
        Self {
            inner: Arc::new(Inner {
                source: Arc::new(source),
                signal,
                threshold,
                state,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    /// Mount: fetches the first page.
    pub async fn start(&self) -> LoadOutcome {
        self.inner.load_more().await
    }

    /// Fetches the next page unless one is in flight or the list is exhausted.
    pub async fn load_more(&self) -> LoadOutcome {
        self.inner.load_more().await
    }

    /// Re-requests the page whose fetch failed last.
    pub async fn retry(&self) -> LoadOutcome {
        if self.inner.state.borrow().error.is_none() {
            return LoadOutcome::Skipped(SkipReason::NoFailure);
        }
        self.inner.load_more().await
    }

    /// Reports the element currently rendered last. The observation moves to
    /// it, or is removed when `element` is `None`.
    pub fn last_element(&self, element: Option<ElementHandle>) {
        {
            let mut control = self.inner.control();
            if control.disposed {
                return;
            }
            control.last_element = element;
        }
        self.inner.detach();
        self.inner.attach();
    }

    /// Unmount: stops observing and ignores any fetch still in flight.
    pub fn dispose(&self) {
        self.inner.control().disposed = true;
        self.inner.detach();
    }

    pub fn snapshot(&self) -> ScrollState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScrollState<T>> {
        self.inner.state.subscribe()
    }

    pub fn items(&self) -> Vec<T> {
        self.inner.state.borrow().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.inner.state.borrow().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<ClientError> {
        self.inner.state.borrow().error.clone()
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Page;
    use crate::ports::{ClientResult, HttpMethod};
    use crate::visibility::ManualVisibility;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    type Calls = Arc<Mutex<Vec<u32>>>;

    fn page(data: &[&'static str], has_more: bool) -> ClientResult<Page<&'static str>> {
        Ok(Page {
            data: data.to_vec(),
            has_more,
        })
    }

    fn two_page_scroll(signal: &ManualVisibility) -> (InfiniteScroll<&'static str>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let log = calls.clone();
        let source = move |n: u32| {
            log.lock().unwrap().push(n);
            let result = match n {
                1 => page(&["a", "b"], true),
                2 => page(&["c"], false),
                _ => panic!("page {} requested past the end", n),
            };
            async move { result }
        };
        let scroll = InfiniteScroll::new(source, Arc::new(signal.clone()), 100.0);
        (scroll, calls)
    }

    #[tokio::test]
    async fn visibility_triggers_pages_until_exhausted() {
        let signal = ManualVisibility::new();
        let (scroll, calls) = two_page_scroll(&signal);

        assert_eq!(scroll.start().await, LoadOutcome::Fetched { count: 2 });
        scroll.last_element(Some(ElementHandle::new("b")));
        assert_eq!(signal.observed(), vec![ElementHandle::new("b")]);

        assert_eq!(signal.trigger().await, 1);

        let state = scroll.snapshot();
        assert_eq!(state.items, vec!["a", "b", "c"]);
        assert!(!state.has_more);
        assert_eq!(state.page, 3);

        // Exhausted: nothing is observed and no further call is made.
        scroll.last_element(Some(ElementHandle::new("c")));
        assert!(signal.observed().is_empty());
        assert_eq!(signal.trigger().await, 0);
        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped(SkipReason::Exhausted));
        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn items_accumulate_in_fetch_order() {
        let signal = ManualVisibility::new();
        let source = |n: u32| {
            let result: ClientResult<Page<u32>> = Ok(Page {
                data: (0..n).map(|i| n * 10 + i).collect(),
                has_more: n < 4,
            });
            async move { result }
        };
        let scroll = InfiniteScroll::new(source, Arc::new(signal), 0.0);

        let mut expected_len = 0;
        while let LoadOutcome::Fetched { count } = scroll.load_more().await {
            expected_len += count;
        }

        let items = scroll.items();
        assert_eq!(items.len(), expected_len);
        assert_eq!(items, vec![10, 20, 21, 30, 31, 32, 40, 41, 42, 43]);
    }

    #[tokio::test]
    async fn one_fetch_in_flight_at_a_time() {
        let signal = ManualVisibility::new();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (gate_in, calls_in) = (gate.clone(), calls.clone());
        let source = move |_n: u32| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            let gate = gate_in.clone();
            async move {
                gate.notified().await;
                page(&["x"], true)
            }
        };
        let scroll = InfiniteScroll::new(source, Arc::new(signal.clone()), 100.0);
        scroll.last_element(Some(ElementHandle::new("x")));
        assert_eq!(signal.observed().len(), 1);

        let competing = async {
            tokio::task::yield_now().await;
            assert!(scroll.is_loading());
            // Observation is torn down while the fetch is outstanding.
            assert!(signal.observed().is_empty());
            let outcome = scroll.load_more().await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(scroll.load_more(), competing);

        assert_eq!(first, LoadOutcome::Fetched { count: 1 });
        assert_eq!(second, LoadOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!scroll.is_loading());
        assert_eq!(signal.observed(), vec![ElementHandle::new("x")]);
    }

    #[tokio::test]
    async fn dropped_fetch_restores_the_observation() {
        let signal = ManualVisibility::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let source = move |_n: u32| {
            let first = calls_in.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    futures::future::pending::<()>().await;
                }
                page(&["x"], true)
            }
        };
        let scroll = InfiniteScroll::new(source, Arc::new(signal.clone()), 100.0);
        scroll.last_element(Some(ElementHandle::new("x")));

        let cancelled = tokio::time::timeout(Duration::from_millis(20), scroll.load_more()).await;

        assert!(cancelled.is_err());
        assert!(!scroll.is_loading());
        assert_eq!(signal.observed(), vec![ElementHandle::new("x")]);
        assert_eq!(scroll.snapshot().page, 1);

        assert_eq!(signal.trigger().await, 1);
        assert_eq!(scroll.items(), vec!["x"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_requests_the_failed_page_again() {
        let signal = ManualVisibility::new();
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(AtomicUsize::new(0));
        let (log, failed) = (calls.clone(), failures.clone());
        let source = move |n: u32| {
            log.lock().unwrap().push(n);
            let result = if n == 2 && failed.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ClientError::Network {
                    method: HttpMethod::Get,
                    path: "/api/products".to_string(),
                    message: "connection reset".to_string(),
                })
            } else {
                page(&["p"], n < 3)
            };
            async move { result }
        };
        let scroll = InfiniteScroll::new(source, Arc::new(signal), 100.0);

        assert_eq!(scroll.retry().await, LoadOutcome::Skipped(SkipReason::NoFailure));
        assert_eq!(scroll.start().await, LoadOutcome::Fetched { count: 1 });
        assert_eq!(scroll.load_more().await, LoadOutcome::Failed);

        let failed_state = scroll.snapshot();
        assert_eq!(failed_state.page, 2);
        assert_eq!(failed_state.error.as_ref().map(ClientError::status), Some(0));

        assert_eq!(scroll.retry().await, LoadOutcome::Fetched { count: 1 });
        assert_eq!(scroll.error(), None);
        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 2]);
        assert_eq!(scroll.items(), vec!["p", "p"]);
    }

    #[tokio::test]
    async fn results_after_dispose_are_ignored() {
        let signal = ManualVisibility::new();
        let gate = Arc::new(Notify::new());
        let gate_in = gate.clone();
        let source = move |_n: u32| {
            let gate = gate_in.clone();
            async move {
                gate.notified().await;
                page(&["late"], true)
            }
        };
        let scroll = InfiniteScroll::new(source, Arc::new(signal.clone()), 100.0);
        scroll.last_element(Some(ElementHandle::new("late")));

        let unmount = async {
            tokio::task::yield_now().await;
            scroll.dispose();
            gate.notify_one();
        };
        let (outcome, _) = tokio::join!(scroll.start(), unmount);

        assert_eq!(outcome, LoadOutcome::Skipped(SkipReason::Disposed));
        assert!(scroll.items().is_empty());
        assert!(signal.observed().is_empty());
        assert_eq!(scroll.load_more().await, LoadOutcome::Skipped(SkipReason::Disposed));
    }

    #[tokio::test]
    async fn dropping_the_controller_silences_its_observation() {
        let signal = ManualVisibility::new();
        let (scroll, calls) = two_page_scroll(&signal);
        scroll.last_element(Some(ElementHandle::new("first")));
        assert_eq!(signal.observed().len(), 1);

        drop(scroll);

        assert!(signal.observed().is_empty());
        assert_eq!(signal.trigger().await, 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn moving_the_last_element_replaces_the_observation() {
        let signal = ManualVisibility::new();
        let (scroll, _calls) = two_page_scroll(&signal);

        scroll.last_element(Some(ElementHandle::new("one")));
        scroll.last_element(Some(ElementHandle::new("two")));
        assert_eq!(signal.observed(), vec![ElementHandle::new("two")]);

        scroll.last_element(None);
        assert!(signal.observed().is_empty());
    }
}

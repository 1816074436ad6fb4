//! crates/storefront_core/src/visibility.rs
//!
//! A `VisibilitySignal` driven by explicit calls rather than a viewport.
//! Terminal front ends call `trigger` when they want the next page, and tests
//! use it to simulate an element scrolling into view.

use std::sync::{Arc, Mutex};

use crate::ports::{ElementHandle, VisibilityObservation, VisibilitySignal, VisibleCallback};

struct Registration {
    id: u64,
    element: ElementHandle,
    callback: VisibleCallback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    live: Vec<Registration>,
}

#[derive(Clone, Default)]
pub struct ManualVisibility {
    registry: Arc<Mutex<Registry>>,
}

impl ManualVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements that currently have a live observation, oldest first.
    pub fn observed(&self) -> Vec<ElementHandle> {
        match self.registry.lock() {
            Ok(registry) => registry.live.iter().map(|r| r.element.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Reports every observed element as visible and waits for the work each
    /// callback started. Returns how many callbacks fired.
    pub async fn trigger(&self) -> usize {
        // Snapshot first; callbacks re-register observations while they run.
        let pending: Vec<(u64, VisibleCallback)> = match self.registry.lock() {
            Ok(registry) => registry
                .live
                .iter()
                .map(|r| (r.id, r.callback.clone()))
                .collect(),
            Err(_) => return 0,
        };
        let mut fired = 0;
        for (id, callback) in pending {
            // An earlier callback may have disposed this observation.
            if !self.is_live(id) {
                continue;
            }
            callback().await;
            fired += 1;
        }
        fired
    }

    fn is_live(&self, id: u64) -> bool {
        match self.registry.lock() {
            Ok(registry) => registry.live.iter().any(|r| r.id == id),
            Err(_) => false,
        }
    }
}

impl VisibilitySignal for ManualVisibility {
    fn on_visible(
        &self,
        element: &ElementHandle,
        _threshold: f64,
        callback: VisibleCallback,
    ) -> Box<dyn VisibilityObservation> {
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.next_id += 1;
        let id = registry.next_id;
        registry.live.push(Registration {
            id,
            element: element.clone(),
            callback,
        });
        Box::new(ManualObservation {
            id,
            registry: self.registry.clone(),
        })
    }
}

struct ManualObservation {
    id: u64,
    registry: Arc<Mutex<Registry>>,
}

impl VisibilityObservation for ManualObservation {
    fn dispose(self: Box<Self>) {
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.live.retain(|r| r.id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(hits: &Arc<AtomicUsize>) -> VisibleCallback {
        let hits = hits.clone();
        Arc::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
            async {}.boxed()
        })
    }

    #[tokio::test]
    async fn trigger_fires_every_live_observation() {
        let signal = ManualVisibility::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = signal.on_visible(&ElementHandle::new("a"), 0.0, counting(&hits));
        let b = signal.on_visible(&ElementHandle::new("b"), 0.0, counting(&hits));
        b.dispose();

        assert_eq!(signal.observed(), vec![ElementHandle::new("a")]);
        assert_eq!(signal.trigger().await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn observation_disposed_during_trigger_does_not_fire() {
        let signal = ManualVisibility::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let later: Arc<Mutex<Option<Box<dyn VisibilityObservation>>>> =
            Arc::new(Mutex::new(None));

        let slot = later.clone();
        let first: VisibleCallback = Arc::new(move || {
            if let Some(observation) = slot.lock().unwrap().take() {
                observation.dispose();
            }
            async {}.boxed()
        });
        let _first = signal.on_visible(&ElementHandle::new("first"), 0.0, first);
        let second = signal.on_visible(&ElementHandle::new("second"), 0.0, counting(&hits));
        *later.lock().unwrap() = Some(second);

        assert_eq!(signal.trigger().await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(signal.observed(), vec![ElementHandle::new("first")]);
    }
}

//! Process-wide publish/subscribe bus.
//!
//! Delivery is synchronous on the publisher's task and globally
//! serialized: one event at a time, High handlers before Low handlers,
//! registration order within a tier. The table is owned by the bus
//! instance, so independent bots in one process do not share handlers.

mod event;

pub use event::{Event, EventKind};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, error, warn};

/// Delivery tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Low,
}

/// Callback invoked for each delivered event.
pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Registration {
    id: SubscriptionId,
    handler: EventHandler,
}

#[derive(Clone, Default)]
struct Tiers {
    high: Vec<Registration>,
    low: Vec<Registration>,
}

impl Tiers {
    fn tier_mut(&mut self, priority: Priority) -> &mut Vec<Registration> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Low => &mut self.low,
        }
    }

    fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }
}

struct Inner {
    table: RwLock<HashMap<EventKind, Tiers>>,
    /// Held for the whole of one delivery. Reentrant so a handler may
    /// publish a follow-up event from the same thread.
    delivery: ReentrantMutex<()>,
    next_id: AtomicU64,
    stopped: AtomicBool,
}

/// Cloneable handle to one bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                table: RwLock::new(HashMap::new()),
                delivery: ReentrantMutex::new(()),
                next_id: AtomicU64::new(1),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Register `handler` for `kind`.
    ///
    /// Safe to call at any time, including from inside a handler; the
    /// new registration is seen from the next publish on.
    pub fn subscribe<F>(&self, kind: EventKind, priority: Priority, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .table
            .write()
            .entry(kind)
            .or_default()
            .tier_mut(priority)
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        debug!(event = %kind, ?priority, id = id.0, "event handler registered");
        id
    }

    /// Remove a registration. Returns false if it was not present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.inner.table.write();
        for tiers in table.values_mut() {
            for tier in [&mut tiers.high, &mut tiers.low] {
                if let Some(pos) = tier.iter().position(|r| r.id == id) {
                    tier.remove(pos);
                    return true;
                }
            }
        }
        false
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.table.read().get(&kind).map_or(0, Tiers::len)
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Handler errors and panics are logged and do not stop delivery to
    /// the remaining handlers. Returns how many handlers succeeded.
    pub fn publish(&self, event: Event) -> usize {
        let kind = event.kind();
        if self.inner.stopped.load(Ordering::Acquire) {
            debug!(event = %kind, "bus stopped, event dropped");
            return 0;
        }

        let _order = self.inner.delivery.lock();

        let Some(tiers) = self.inner.table.read().get(&kind).cloned() else {
            debug!(event = %kind, network = %event.network(), "no handlers for event");
            return 0;
        };

        let mut delivered = 0;
        for reg in tiers.high.iter().chain(tiers.low.iter()) {
            match panic::catch_unwind(AssertUnwindSafe(|| (reg.handler)(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(event = %kind, id = reg.id.0, error = %e, "event handler failed")
                }
                Err(_) => error!(event = %kind, id = reg.id.0, "event handler panicked"),
            }
        }
        delivered
    }

    /// Stop delivering. Later publishes are dropped.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        debug!("event bus stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }
}

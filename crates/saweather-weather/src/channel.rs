//! Latest-value result channel.
//!
//! Holds a single [`ResultState`] slot. Every emit overwrites the slot and
//! synchronously calls each registered listener; new listeners are called
//! once with the current value when they subscribe. Async consumers can
//! use [`ResultChannel::watch`] instead and only ever see the newest value.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

use crate::types::ResultState;

type Listener = Arc<dyn Fn(&ResultState) + Send + Sync>;

struct Shared {
    slot: watch::Sender<ResultState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    /// Held for the whole emit so listeners see states in emission order.
    emit_order: Mutex<()>,
}

/// Cloneable handle to one latest-value slot.
///
/// Listeners run on the emitting thread and must not emit on the same
/// channel.
#[derive(Clone)]
pub struct ResultChannel {
    shared: Arc<Shared>,
}

impl ResultChannel {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(ResultState::default());
        Self {
            shared: Arc::new(Shared {
                slot,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                emit_order: Mutex::new(()),
            }),
        }
    }

    /// The most recently emitted state.
    pub fn latest(&self) -> ResultState {
        self.shared.slot.borrow().clone()
    }

    /// Replace the current state and deliver it to every listener.
    pub fn emit(&self, state: ResultState) {
        let _order = self.shared.emit_order.lock();
        self.shared.slot.send_replace(state.clone());

        let listeners: Vec<Listener> = self
            .shared
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&state);
        }
    }

    /// Register a listener. It is called immediately with the latest state,
    /// then on every later emit until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ResultState) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        // Replay under the emit lock so no emission slips in between.
        let _order = self.shared.emit_order.lock();
        listener(&self.latest());
        self.shared.listeners.lock().push((id, listener));

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
            active: true,
        }
    }

    /// Receiver that always yields the newest state.
    pub fn watch(&self) -> watch::Receiver<ResultState> {
        self.shared.slot.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }
}

impl Default for ResultChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResultChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultChannel")
            .field("latest", &*self.shared.slot.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by [`ResultChannel::subscribe`]. Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
    active: bool,
}

impl Subscription {
    /// Stop delivery. Calling it more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

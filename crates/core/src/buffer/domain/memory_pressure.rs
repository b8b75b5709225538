use std::sync::{Arc, Mutex, PoisonError, Weak};

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

/// In-process broadcast of "available memory is critically low".
///
/// Cloning shares the same subscriber list. Handlers run on whichever
/// thread calls [`MemoryPressureSignal::notify`] and must not block.
#[derive(Clone, Default)]
pub struct MemoryPressureSignal {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl MemoryPressureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` until the returned subscription is dropped.
    pub fn subscribe(&self, handler: impl Fn() + Send + Sync + 'static) -> PressureSubscription {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.handlers.push((id, Arc::new(handler)));
        PressureSubscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Invokes every current handler. Handlers are called outside the lock
    /// so they may subscribe or unsubscribe.
    pub fn notify(&self) {
        let handlers: Vec<Handler> = {
            let subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            subs.handlers.iter().map(|(_, h)| h.clone()).collect()
        };
        log::debug!("Memory pressure signalled to {} subscribers", handlers.len());
        for handler in handlers {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }
}

/// Keeps a handler registered; unsubscribes on drop.
pub struct PressureSubscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Drop for PressureSubscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            let mut subs = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            subs.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

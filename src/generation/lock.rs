use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// In-process mutual exclusion of generation runs, keyed by event id.
/// An entry lives only as long as someone holds or is acquiring it.
#[derive(Clone, Default)]
pub struct EventLocks {
    locks: LockMap,
}

/// Held for the whole run; dropping it releases the event.
pub struct EventLockGuard {
    event_id: String,
    locks: LockMap,
    _guard: OwnedMutexGuard<()>,
}

impl EventLockGuard {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }
}

impl Drop for EventLockGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // one reference in the map, one inside `_guard`
        if locks
            .get(&self.event_id)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            locks.remove(&self.event_id);
        }
        log::debug!("Released generation lock of event {}", self.event_id);
    }
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when a run for the event is already in progress.
    pub fn try_acquire(&self, event_id: &str) -> Option<EventLockGuard> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(event_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.try_lock_owned().ok()?;
        log::debug!("Acquired generation lock of event {}", event_id);
        Some(EventLockGuard {
            event_id: event_id.to_string(),
            locks: self.locks.clone(),
            _guard: guard,
        })
    }

    pub fn is_locked(&self, event_id: &str) -> bool {
        self.locks
            .lock()
            .get(event_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

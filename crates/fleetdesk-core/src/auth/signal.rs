//! Session lifecycle signal shared by the session controller and the API client.
//!
//! The controller arms the signal when a session starts and disarms it when
//! the session ends. Every armed session gets a fresh epoch. The API client
//! records the epoch at dispatch time and, on an authentication failure,
//! invalidates that epoch. Only the first invalidation of the current epoch
//! has any effect, so concurrent 401s tear the session down exactly once and a
//! late 401 from an earlier session is ignored.
//!
//! Work that must not outlive its session (storing a rotated token) runs
//! through [`SessionSignal::while_current`], which holds the same gate that
//! arming, disarming and invalidation take.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Buffer for the broadcast channel. Events are rare (one per session end).
const EVENT_BUFFER_SIZE: usize = 16;

/// Epoch value meaning "no session armed"
const DISARMED: u64 = 0;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend rejected the token of session `epoch`
    Invalidated { status: u16, epoch: u64 },
    /// The user logged out explicitly
    LoggedOut,
}

struct SignalInner {
    tx: broadcast::Sender<SessionEvent>,
    current: AtomicU64,
    next: AtomicU64,
    gate: Mutex<()>,
}

/// Cloneable handle to the session signal. Clones share state.
#[derive(Clone)]
pub struct SessionSignal {
    inner: Arc<SignalInner>,
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            inner: Arc::new(SignalInner {
                tx,
                current: AtomicU64::new(DISARMED),
                next: AtomicU64::new(1),
                gate: Mutex::new(()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session epoch and return it
    pub fn arm(&self) -> u64 {
        let _gate = self.lock();
        let epoch = self.inner.next.fetch_add(1, Ordering::SeqCst);
        self.inner.current.store(epoch, Ordering::SeqCst);
        debug!(epoch, "Session signal armed");
        epoch
    }

    /// End the current epoch without emitting anything
    pub fn disarm(&self) {
        let _gate = self.lock();
        self.inner.current.store(DISARMED, Ordering::SeqCst);
    }

    /// Current epoch, or `None` when no session is armed
    pub fn epoch(&self) -> Option<u64> {
        match self.inner.current.load(Ordering::SeqCst) {
            DISARMED => None,
            epoch => Some(epoch),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.epoch().is_some()
    }

    /// Invalidate `epoch` if it is still the current one.
    ///
    /// On the winning call `teardown` runs first and the `Invalidated` event is
    /// broadcast after it. Returns whether this call did the invalidation.
    pub fn invalidate<F>(&self, epoch: u64, status: u16, teardown: F) -> bool
    where
        F: FnOnce(),
    {
        if epoch == DISARMED {
            return false;
        }
        let gate = self.lock();
        let won = self
            .inner
            .current
            .compare_exchange(epoch, DISARMED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !won {
            debug!(epoch, status, "Session already invalidated, ignoring");
            return false;
        }

        teardown();
        drop(gate);
        info!(status, "Session invalidated by backend");
        self.emit(SessionEvent::Invalidated { status, epoch });
        true
    }

    /// Run `f` only if `epoch` is still the current session.
    ///
    /// Arming, disarming and invalidation wait until `f` returns, so the
    /// session cannot end halfway through it.
    pub fn while_current<R, F>(&self, epoch: u64, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let _gate = self.lock();
        if epoch == DISARMED || self.inner.current.load(Ordering::SeqCst) != epoch {
            return None;
        }
        Some(f())
    }

    /// Broadcast an event to all subscribers
    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine: nobody is listening yet
        if self.inner.tx.send(event).is_err() {
            debug!("Session event dropped, no subscribers");
        }
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

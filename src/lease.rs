//! Per-request session lease.
//!
//! A [`Lease`] is a single-slot, lazily filled cache: the first
//! [`acquire`](Lease::acquire) copies a session from the parent factory and
//! applies the socket deadline; every later acquire returns the same handle.
//! [`release`](Lease::release) closes the handle exactly once, whether the
//! race was won or lost, and is a no-op when the handler never asked for a
//! session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::session::{RawSession, SessionFactory};

struct Slot {
    session: Option<Arc<dyn RawSession>>,
    released: bool,
}

/// At-most-once session creation for the lifetime of one request.
pub(crate) struct Lease {
    parent: Arc<dyn SessionFactory>,
    timeout: Duration,
    slot: Mutex<Slot>,
}

impl Lease {
    pub(crate) fn new(parent: Arc<dyn SessionFactory>, timeout: Duration) -> Self {
        Self {
            parent,
            timeout,
            slot: Mutex::new(Slot { session: None, released: false }),
        }
    }

    /// Returns the request's session, creating it on the first call.
    ///
    /// Safe to call concurrently — the handler may resolve the capability
    /// from nested tasks. All callers observe the identical handle.
    pub(crate) fn acquire(&self) -> Arc<dyn RawSession> {
        let mut slot = self.slot.lock().expect("lease lock poisoned");
        if let Some(session) = &slot.session {
            return Arc::clone(session);
        }

        let session = self.parent.copy();
        // The socket deadline guarantees no single operation on this session
        // can outlive the configured request timeout.
        session.set_timeout(self.timeout);
        if slot.released {
            // The coordinator already tore the lease down; an abandoned
            // handler poll raced us here. Hand back a closed session rather
            // than leaking a live one.
            session.close();
        }
        slot.session = Some(Arc::clone(&session));
        session
    }

    /// Closes the session if one was ever created. Idempotent.
    pub(crate) fn release(&self) {
        let mut slot = self.slot.lock().expect("lease lock poisoned");
        if slot.released {
            return;
        }
        slot.released = true;
        if let Some(session) = &slot.session {
            session.close();
        }
    }
}

// Last-resort teardown. The coordinator releases explicitly right after the
// race, but the coordinator future itself can be cancelled mid-race — an
// enclosing guard's timeout aborts the task driving it, or hyper drops the
// dispatch future when the client disconnects. The last holder of the lease
// (often the abandoned handler's accessor) then closes the session here.
impl Drop for Lease {
    fn drop(&mut self) {
        self.release();
    }
}

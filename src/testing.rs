//! Test doubles and request fabrication.
//!
//! This module is public on purpose, the way `net/http/httptest` is: test
//! wiring should be easy to reach and look out of place anywhere else. It
//! provides two things:
//!
//! - [`request`] — build a [`Request`] by hand, optionally injecting session
//!   factories directly so a handler can be exercised without standing up a
//!   [`SessionGuard`](crate::SessionGuard). Injected accessors hand out a
//!   *fresh* session copy on every resolution and nothing closes them —
//!   fine for tests, which is exactly why this lives here and not in the
//!   guard.
//! - [`StubFactory`] — an in-memory driver double with a configurable
//!   per-operation delay and counters for copies made, closes observed, and
//!   the socket timeout applied. Stub operations sleep their full delay
//!   regardless of the recorded socket timeout, so tests that race a
//!   deadline are deterministic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::Db;
use crate::request::Request;
use crate::session::{BoxFuture, RawDatabase, RawSession, SessionError, SessionFactory};

/// Starts building a synthetic [`Request`]. Defaults to `GET /`.
pub fn request() -> RequestBuilder {
    RequestBuilder {
        method: "GET".to_owned(),
        path: "/".to_owned(),
        headers: Vec::new(),
        body: Vec::new(),
        sessions: Vec::new(),
    }
}

/// Builder returned by [`request`].
pub struct RequestBuilder {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    sessions: Vec<(String, Arc<dyn SessionFactory>)>,
}

impl RequestBuilder {
    pub fn method(mut self, method: &str) -> Self {
        self.method = method.to_owned();
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_owned();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Registers `factory` under the logical name `name`, bypassing any
    /// guard. Each resolution copies a fresh session.
    pub fn session(mut self, name: &str, factory: Arc<dyn SessionFactory>) -> Self {
        self.sessions.push((name.to_owned(), factory));
        self
    }

    pub fn build(self) -> Request {
        let mut req = Request::new(self.method, self.path, self.headers, self.body);
        for (name, factory) in self.sessions {
            let label: Arc<str> = name.clone().into();
            req.handles.insert(
                name,
                Arc::new(move || Db::new(Arc::clone(&label), factory.copy())),
            );
        }
        req
    }
}

// ── Stub driver ───────────────────────────────────────────────────────────────

struct StubState {
    op_delay: Duration,
    copies: AtomicUsize,
    closes: AtomicUsize,
    applied_timeout: Mutex<Option<Duration>>,
}

/// An in-memory [`SessionFactory`] double.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the guard owns another.
#[derive(Clone)]
pub struct StubFactory {
    state: Arc<StubState>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::with_op_delay(Duration::ZERO)
    }

    /// Every ping and command on sessions from this factory takes `delay`.
    pub fn with_op_delay(delay: Duration) -> Self {
        Self {
            state: Arc::new(StubState {
                op_delay: delay,
                copies: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                applied_timeout: Mutex::new(None),
            }),
        }
    }

    /// How many session copies were created.
    pub fn copies(&self) -> usize {
        self.state.copies.load(Ordering::SeqCst)
    }

    /// How many sessions were closed.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// The socket timeout recorded by the most recent `set_timeout`.
    pub fn applied_timeout(&self) -> Option<Duration> {
        *self.state.applied_timeout.lock().expect("stub lock poisoned")
    }
}

impl Default for StubFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for StubFactory {
    fn copy(&self) -> Arc<dyn RawSession> {
        self.state.copies.fetch_add(1, Ordering::SeqCst);
        Arc::new(StubSession {
            state: Arc::clone(&self.state),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

struct StubSession {
    state: Arc<StubState>,
    closed: Arc<AtomicBool>,
}

impl RawSession for StubSession {
    fn set_timeout(&self, timeout: Duration) {
        *self.state.applied_timeout.lock().expect("stub lock poisoned") = Some(timeout);
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        let delay = self.state.op_delay;
        let closed = Arc::clone(&self.closed);
        Box::pin(async move {
            if closed.load(Ordering::SeqCst) {
                return Err("session closed".into());
            }
            tokio::time::sleep(delay).await;
            Ok(())
        })
    }

    fn database(&self, _name: &str) -> Box<dyn RawDatabase> {
        Box::new(StubDatabase {
            state: Arc::clone(&self.state),
            closed: Arc::clone(&self.closed),
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct StubDatabase {
    state: Arc<StubState>,
    closed: Arc<AtomicBool>,
}

impl RawDatabase for StubDatabase {
    fn run(&self, _command: &[u8]) -> BoxFuture<'_, Result<Vec<u8>, SessionError>> {
        let delay = self.state.op_delay;
        let closed = Arc::clone(&self.closed);
        Box::pin(async move {
            if closed.load(Ordering::SeqCst) {
                return Err("session closed".into());
            }
            tokio::time::sleep(delay).await;
            Ok(Vec::new())
        })
    }
}

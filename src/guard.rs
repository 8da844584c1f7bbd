//! The session guard — middleware that leases a database session to one
//! request and races the handler against a deadline.
//!
//! # Per-request lifecycle
//!
//! 1. A session lease and a buffering [`ResponseWriter`] are allocated, and
//!    the lease's accessor is registered on the request under the configured
//!    logical name.
//! 2. The wrapped handler runs on its own task against the writer and the
//!    augmented request.
//! 3. The guard waits on a two-way `select!`: handler done vs. deadline
//!    fired. The select is what guarantees the client-visible response is
//!    produced by exactly one branch — there is no flag to get wrong.
//! 4. Handler first: the buffered status, headers, and body are delivered
//!    verbatim. Deadline first: the writer is marked timed out (all the
//!    handler's further writes fail with [`Error::Timeout`](crate::Error::Timeout)),
//!    the handler
//!    task is aborted, and the client gets the configured error status with
//!    an empty body.
//! 5. Either way, the lease is released — closing the session copy iff one
//!    was ever created.
//!
//! # What bounds an abandoned handler
//!
//! On timeout the handler task is cancelled at its next yield point. Driver
//! I/O already in flight cannot be interrupted from here; that is what the
//! socket deadline applied at session creation is for — no single operation
//! on the leased session can outlive the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tracing::Instrument;

use crate::db::Db;
use crate::handler::{BoxedHandler, ErasedHandler, Handler, HandlerFuture, private};
use crate::lease::Lease;
use crate::request::Request;
use crate::response::Response;
use crate::session::SessionFactory;
use crate::writer::ResponseWriter;

/// Configuration for a [`SessionGuard`].
pub struct SessionGuardConfig<H: Handler> {
    /// Source of per-request session copies.
    pub factory: Arc<dyn SessionFactory>,
    /// Logical name the session is registered under — what handlers pass to
    /// [`Request::db`].
    pub database: String,
    /// Both the request deadline and the socket deadline applied to the
    /// leased session.
    pub timeout: Duration,
    /// The wrapped handler.
    pub handler: H,
}

/// Middleware that injects a leased database session into each request and
/// enforces its deadline.
///
/// Cloning shares the same configuration and wrapped handler. A guard is
/// itself a [`Handler`], so guards for different stores stack:
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use lien::{Request, ResponseWriter, SessionGuard, SessionGuardConfig};
/// # fn factory() -> Arc<dyn lien::SessionFactory> { unimplemented!() }
/// async fn handler(req: Request, w: ResponseWriter) -> Result<(), lien::Error> {
///     req.db("accounts").ping().await.ok();
///     req.db("audit").ping().await.ok();
///     w.write(b"ok")?;
///     Ok(())
/// }
///
/// let inner = SessionGuard::new(SessionGuardConfig {
///     factory: factory(),
///     database: "audit".to_owned(),
///     timeout: Duration::from_secs(1),
///     handler,
/// });
/// let app = SessionGuard::new(SessionGuardConfig {
///     factory: factory(),
///     database: "accounts".to_owned(),
///     timeout: Duration::from_secs(2),
///     handler: inner,
/// });
/// ```
#[derive(Clone)]
pub struct SessionGuard {
    factory: Arc<dyn SessionFactory>,
    database: Arc<str>,
    timeout: Duration,
    handler: BoxedHandler,
    error_code: StatusCode,
}

impl SessionGuard {
    pub fn new<H: Handler>(cfg: SessionGuardConfig<H>) -> Self {
        Self {
            factory: cfg.factory,
            database: cfg.database.into(),
            timeout: cfg.timeout,
            handler: cfg.handler.into_boxed_handler(),
            error_code: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Overrides the status written on the timeout branch (default 503).
    ///
    /// Mainly for tests and interop — e.g. distinguishing this guard's
    /// timeouts from an outer timeout middleware's 503s.
    pub fn error_code(mut self, code: StatusCode) -> Self {
        self.error_code = code;
        self
    }

    /// Runs one request through the guard and resolves the race.
    pub async fn handle(&self, mut req: Request) -> Response {
        let lease = Arc::new(Lease::new(Arc::clone(&self.factory), self.timeout));
        let writer = ResponseWriter::new();

        // Repeated resolutions by the same request all hit this one lease.
        let accessor_lease = Arc::clone(&lease);
        let name = Arc::clone(&self.database);
        req.handles.insert(
            self.database.to_string(),
            Arc::new(move || {
                let raw = tracing::debug_span!("session-acquire", db = %name)
                    .in_scope(|| accessor_lease.acquire());
                Db::new(Arc::clone(&name), raw)
            }),
        );

        let span = tracing::info_span!("session-guard", db = %self.database);
        let mut task = tokio::spawn(self.handler.call(req, writer.clone()).instrument(span));

        let response = tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(())) => writer.take_response(),
                Ok(Err(err)) => {
                    // The handler bailed out, most often because an enclosing
                    // deadline already answered. Its buffer still stands.
                    tracing::debug!(db = %self.database, error = %err, "handler returned an error");
                    writer.take_response()
                }
                Err(join_err) if join_err.is_panic() => {
                    // A panic in the handler is a programming error (e.g. an
                    // unregistered database name). Re-raise it on this path
                    // once the lease is safely released.
                    lease.release();
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(join_err) => {
                    tracing::error!(db = %self.database, error = %join_err, "handler task failed");
                    Response::from_parts(StatusCode::INTERNAL_SERVER_ERROR, Vec::new(), Vec::new())
                }
            },
            _ = tokio::time::sleep(self.timeout) => {
                // Order matters: make the writer inert before cancelling, so
                // a poll already past its last yield point still cannot touch
                // the response.
                writer.time_out();
                task.abort();
                tracing::error!(
                    db = %self.database,
                    timeout = ?self.timeout,
                    "session deadline exceeded, handler abandoned"
                );
                Response::from_parts(self.error_code, Vec::new(), Vec::new())
            }
        };

        lease.release();
        response
    }
}

// A guard nests inside another guard like any handler: it resolves its own
// race, then delivers the result through the enclosing writer.
impl private::Sealed for SessionGuard {}

impl Handler for SessionGuard {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

impl ErasedHandler for SessionGuard {
    fn call(&self, req: Request, w: ResponseWriter) -> HandlerFuture {
        let guard = self.clone();
        Box::pin(async move { w.send(guard.handle(req).await) })
    }
}

//! Driver-facing capability traits.
//!
//! lien never talks to a database driver directly. It consumes the driver
//! through the three narrow, object-safe traits below — enough surface to
//! copy a session, bound its socket, ping it, reach a named database, and
//! close it. Everything else the driver can do stays the driver's business.
//!
//! To plug a driver in, write a small adapter:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lien::{BoxFuture, RawDatabase, RawSession, SessionError, SessionFactory};
//!
//! struct MyPool(/* driver client */);
//! struct MySession(/* driver session */);
//! struct MyDatabase(/* driver database handle */);
//!
//! impl SessionFactory for MyPool {
//!     fn copy(&self) -> Arc<dyn RawSession> {
//!         Arc::new(MySession(/* self.0.new_session() */))
//!     }
//! }
//!
//! impl RawSession for MySession {
//!     fn set_timeout(&self, _timeout: Duration) { /* socket deadline */ }
//!     fn ping(&self) -> BoxFuture<'_, Result<(), SessionError>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!     fn database(&self, _name: &str) -> Box<dyn RawDatabase> {
//!         Box::new(MyDatabase(/* handle */))
//!     }
//!     fn close(&self) { /* return connection */ }
//! }
//!
//! impl RawDatabase for MyDatabase {
//!     fn run(&self, _command: &[u8]) -> BoxFuture<'_, Result<Vec<u8>, SessionError>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A heap-allocated, type-erased future.
///
/// The session traits must be object-safe (lien stores them behind `dyn`), so
/// their async methods return boxed futures instead of using `async fn`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An opaque error from the backing store.
///
/// lien never inspects these — interpreting query failures is the wrapped
/// handler's responsibility.
pub type SessionError = Box<dyn std::error::Error + Send + Sync>;

/// Source of fresh session copies — typically a parent session or pool held
/// for the lifetime of the process.
///
/// `copy` is called at most once per request, lazily, the first time the
/// handler asks for the database. Copies are preferred over sharing the
/// parent's socket: each request gets its own socket and expensive queries
/// on one request cannot bottleneck another.
pub trait SessionFactory: Send + Sync + 'static {
    /// Creates a new session copy with its own connection.
    fn copy(&self) -> Arc<dyn RawSession>;
}

/// One copied session, owned by a single request.
///
/// `close` is called exactly once by the lease that created the session,
/// never by handler code. The handle itself must tolerate concurrent use —
/// that is the driver's contract, lien does not re-verify it.
pub trait RawSession: Send + Sync + 'static {
    /// Applies a socket deadline: no single operation on this session may
    /// exceed `timeout`. Called once, immediately after creation.
    fn set_timeout(&self, timeout: Duration);

    /// Round-trips to the server to verify the session is alive.
    fn ping(&self) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Returns a handle scoped to the named database.
    fn database(&self, name: &str) -> Box<dyn RawDatabase>;

    /// Releases the session's resources. Operations issued after `close`
    /// fail with a driver error.
    fn close(&self);
}

/// A database-scoped handle obtained from [`RawSession::database`].
pub trait RawDatabase: Send + Sync + 'static {
    /// Runs an opaque command against the database and returns its opaque
    /// reply. lien forwards bytes in both directions without interpreting
    /// them.
    fn run(&self, command: &[u8]) -> BoxFuture<'_, Result<Vec<u8>, SessionError>>;
}

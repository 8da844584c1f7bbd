//! # lien
//!
//! Per-request database session leasing with deadline enforcement.
//! A lien is a temporary claim on property — here, one request's claim on
//! one database session.
//!
//! ## The contract
//!
//! Your driver owns connections, pooling, and query semantics. Your handler
//! owns interpreting query results. lien owns the part in between that is
//! easy to get wrong: making sure each request gets **at most one** session
//! copy no matter how many times it asks, that the session is **always
//! closed** no matter how the request ends, and that a request which blows
//! its deadline produces **exactly one** response — never a late handler and
//! a timeout error interleaved on the same connection.
//!
//! The mechanism is a race: each wrapped handler runs on its own task,
//! writing into an in-memory buffer instead of the real connection. The
//! guard waits for whichever comes first — handler done, or deadline fired.
//! Handler first: the buffer is flushed verbatim. Deadline first: the buffer
//! is marked inert (every later write by the abandoned handler fails with
//! [`Error::Timeout`]), the handler task is cancelled, and the client gets a
//! bodiless 503. Either way the leased session is released, and the socket
//! deadline stamped on it at creation bounds any driver I/O the cancellation
//! could not reach.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use lien::{Request, ResponseWriter, Server, SessionGuard, SessionGuardConfig};
//!
//! # fn my_driver_adapter() -> Arc<dyn lien::SessionFactory> { unimplemented!() }
//! #[tokio::main]
//! async fn main() {
//!     let app = SessionGuard::new(SessionGuardConfig {
//!         factory: my_driver_adapter(),
//!         database: "accounts".to_owned(),
//!         timeout: Duration::from_millis(500),
//!         handler,
//!     });
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn handler(req: Request, w: ResponseWriter) -> Result<(), lien::Error> {
//!     let db = req.db("accounts");
//!     if db.ping().await.is_err() {
//!         w.write_header(http::StatusCode::INTERNAL_SERVER_ERROR);
//!         return Ok(());
//!     }
//!     w.write(b"ok")?;
//!     Ok(())
//! }
//! ```
//!
//! Plugging in a driver means implementing three small traits — see the
//! [`session`] module. Test doubles and request fabrication live in
//! [`testing`].

mod db;
mod error;
mod guard;
mod handler;
mod lease;
mod registry;
mod request;
mod response;
mod server;
pub mod session;
mod writer;

pub mod testing;

pub use db::{Database, Db};
pub use error::Error;
pub use guard::{SessionGuard, SessionGuardConfig};
pub use handler::{Handler, IntoOutcome};
pub use request::Request;
pub use response::Response;
pub use server::Server;
pub use session::{BoxFuture, RawDatabase, RawSession, SessionError, SessionFactory};
pub use writer::ResponseWriter;

//! The restricted session capability handed to handlers.
//!
//! [`Db`] deliberately exposes a subset of [`RawSession`]: handlers can ping
//! and reach named databases, but closing the session and setting its socket
//! deadline belong to the guard that leased it. Every operation runs inside
//! a `tracing` span tagged with the logical name, and failures are recorded
//! on the span before being returned — never swallowed, never double-raised.

use std::sync::Arc;

use tracing::Instrument;

use crate::session::{RawDatabase, RawSession, SessionError};

/// A leased database session, scoped to one request.
///
/// Obtained via [`Request::db`](crate::Request::db). Every call within the
/// same request resolves to the same underlying session copy.
pub struct Db {
    name: Arc<str>,
    raw: Arc<dyn RawSession>,
}

impl Db {
    pub(crate) fn new(name: Arc<str>, raw: Arc<dyn RawSession>) -> Self {
        Self { name, raw }
    }

    /// Round-trips to the backing store to verify the session is alive.
    pub async fn ping(&self) -> Result<(), SessionError> {
        let span = tracing::debug_span!("db-ping", db = %self.name);
        let result = self.raw.ping().instrument(span).await;
        if let Err(err) = &result {
            tracing::error!(db = %self.name, error = %err, "ping failed");
        }
        result
    }

    /// Returns a handle scoped to the named database on this session.
    pub fn database(&self, name: &str) -> Database {
        Database {
            logical: Arc::clone(&self.name),
            name: name.to_owned(),
            raw: self.raw.database(name),
        }
    }
}

/// A database-scoped view of a leased session.
pub struct Database {
    logical: Arc<str>,
    name: String,
    raw: Box<dyn RawDatabase>,
}

impl Database {
    /// Runs an opaque command and returns its opaque reply.
    ///
    /// Interpreting the reply — and any error — is the caller's job; lien
    /// only records the outcome on the operation's span.
    pub async fn run(&self, command: &[u8]) -> Result<Vec<u8>, SessionError> {
        let span = tracing::debug_span!("db-run", db = %self.logical, database = %self.name);
        let result = self.raw.run(command).instrument(span).await;
        if let Err(err) = &result {
            tracing::error!(
                db = %self.logical,
                database = %self.name,
                error = %err,
                "command failed"
            );
        }
        result
    }
}

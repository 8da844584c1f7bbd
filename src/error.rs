//! Unified error type.

use std::fmt;

/// The error type returned by lien's fallible operations.
///
/// Query-level failures from the backing store are the handler's business and
/// travel as [`SessionError`](crate::SessionError) values. This type covers
/// the two failures lien itself produces: a write attempted after the
/// request's deadline already decided the response, and infrastructure I/O
/// (binding to a port, accepting a connection).
#[derive(Debug)]
pub enum Error {
    /// The request's deadline fired before the handler finished. Returned by
    /// every [`ResponseWriter`](crate::ResponseWriter) write once the race is
    /// lost — someone already answered this request, stop writing.
    Timeout,
    /// Server-side I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request handler timed out"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout => None,
            Self::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

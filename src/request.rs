//! Incoming HTTP request type.

use crate::db::Db;
use crate::registry::DbHandles;

/// An incoming HTTP request, plus the database capabilities the wrapping
/// session guards registered for it.
pub struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    pub(crate) handles: DbHandles,
}

impl Request {
    pub(crate) fn new(
        method: String,
        path: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self { method, path, headers, body, handles: DbHandles::default() }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the leased session registered under the logical name `name`.
    ///
    /// Calling this any number of times within one request resolves to the
    /// same session copy — the lease is created on the first call and reused
    /// afterwards.
    ///
    /// # Panics
    ///
    /// Panics if no [`SessionGuard`](crate::SessionGuard) for `name` wraps
    /// this handler. That is a misconfigured middleware stack, not a
    /// recoverable condition.
    pub fn db(&self, name: &str) -> Db {
        self.handles.resolve(name)
    }
}

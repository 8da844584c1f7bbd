//! Outgoing HTTP response type.
//!
//! Handlers do not build `Response` values directly — they write through a
//! [`ResponseWriter`](crate::ResponseWriter) and the coordinator drains the
//! buffer into one of these after the race resolves. The type exists so the
//! resolved outcome can travel to the serving layer (and to assertions in
//! tests) as a plain value.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

/// A fully resolved HTTP response: status, headers, body.
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    pub(crate) fn from_parts(
        status: StatusCode,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self { status, headers, body }
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Vec<(String, String)>, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the hyper response written to the wire.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                // A handler smuggled an invalid header name or value into the
                // buffer. Refuse to guess: plain 500, no headers.
                tracing::error!("invalid response header: {e}");
                http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::new()))
                    .expect("empty 500 response is always valid")
            })
    }
}

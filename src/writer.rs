//! Buffering response writer.
//!
//! # Why handlers don't get the real connection
//!
//! A handler races against its request's deadline on a separate task. If both
//! the handler and the timeout path could touch the network connection, a
//! slow handler and a firing timer would write interleaved garbage to the
//! client. [`ResponseWriter`] removes the race structurally: the handler
//! writes into an in-memory buffer, and after the race resolves exactly one
//! actor either drains that buffer to the client or discards it.
//!
//! Once the deadline fires the writer is permanently inert — every further
//! [`write`](ResponseWriter::write) returns [`Error::Timeout`] and leaves the
//! buffer untouched. A handler seeing that error should stop: someone already
//! answered the request.

use std::sync::{Arc, Mutex, MutexGuard};

use http::StatusCode;

use crate::error::Error;
use crate::response::Response;

struct State {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    status: StatusCode,
    wrote_header: bool,
    timed_out: bool,
}

/// The buffered writer handed to wrapped handlers.
///
/// Cloning is cheap and every clone writes into the same buffer; a single
/// internal lock serializes the handler's task and the coordinator.
#[derive(Clone)]
pub struct ResponseWriter {
    state: Arc<Mutex<State>>,
}

impl ResponseWriter {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                headers: Vec::new(),
                body: Vec::new(),
                status: StatusCode::OK,
                wrote_header: false,
                timed_out: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("response writer lock poisoned")
    }

    /// Appends a response header. No effect once the request has timed out.
    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut state = self.lock();
        if state.timed_out {
            return;
        }
        state.headers.push((name.into(), value.into()));
    }

    /// Records the response status. Only the first call counts; later calls —
    /// and calls after a timeout — are no-ops, matching the one-shot
    /// semantics of a real HTTP status line.
    pub fn write_header(&self, status: StatusCode) {
        let mut state = self.lock();
        if state.timed_out || state.wrote_header {
            return;
        }
        state.status = status;
        state.wrote_header = true;
    }

    /// Appends bytes to the response body and returns how many were written.
    ///
    /// The first write locks in `200 OK` if no status was set explicitly.
    /// Returns [`Error::Timeout`] — with no buffer effect — once the deadline
    /// has fired.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, Error> {
        let mut state = self.lock();
        if state.timed_out {
            return Err(Error::Timeout);
        }
        if !state.wrote_header {
            state.status = StatusCode::OK;
            state.wrote_header = true;
        }
        state.body.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Copies a complete response into the buffer in one locked step.
    ///
    /// This is how a nested [`SessionGuard`](crate::SessionGuard) delivers
    /// its already-resolved response through an enclosing guard's writer.
    pub fn send(&self, response: Response) -> Result<(), Error> {
        let mut state = self.lock();
        if state.timed_out {
            return Err(Error::Timeout);
        }
        if !state.wrote_header {
            state.status = response.status();
            state.wrote_header = true;
        }
        let (_, headers, body) = response.into_parts();
        state.headers.extend(headers);
        state.body.extend_from_slice(&body);
        Ok(())
    }

    /// Marks the writer timed out. There is no way back: every subsequent
    /// write is rejected.
    pub(crate) fn time_out(&self) {
        self.lock().timed_out = true;
    }

    /// Drains the buffer into the response the client will see. Called once,
    /// and only on the branch where the handler won the race.
    pub(crate) fn take_response(&self) -> Response {
        let mut state = self.lock();
        Response::from_parts(
            state.status,
            std::mem::take(&mut state.headers),
            std::mem::take(&mut state.body),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_write_defaults_to_200() {
        let w = ResponseWriter::new();
        assert_eq!(w.write(b"hello").unwrap(), 5);

        let resp = w.take_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), b"hello");
    }

    #[test]
    fn first_status_wins() {
        let w = ResponseWriter::new();
        w.write_header(StatusCode::CREATED);
        w.write_header(StatusCode::NOT_FOUND);
        w.write(b"x").unwrap();

        assert_eq!(w.take_response().status(), StatusCode::CREATED);
    }

    #[test]
    fn empty_handler_output_is_200_no_body() {
        let w = ResponseWriter::new();
        let resp = w.take_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn writes_after_timeout_are_rejected() {
        let w = ResponseWriter::new();
        w.write(b"before").unwrap();
        w.time_out();

        assert!(matches!(w.write(b"after"), Err(Error::Timeout)));
        w.write_header(StatusCode::IM_A_TEAPOT);
        w.header("x-late", "1");

        // Buffer is untouched by everything after the timeout.
        let resp = w.take_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), b"before");
        assert!(resp.header("x-late").is_none());
    }

    #[test]
    fn send_copies_status_headers_and_body() {
        let w = ResponseWriter::new();
        let inner = Response::from_parts(
            StatusCode::ACCEPTED,
            vec![("content-type".into(), "text/plain".into())],
            b"done".to_vec(),
        );
        w.send(inner).unwrap();

        let resp = w.take_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.body(), b"done");
    }

    #[test]
    fn send_after_timeout_is_rejected() {
        let w = ResponseWriter::new();
        w.time_out();
        let inner = Response::from_parts(StatusCode::OK, Vec::new(), Vec::new());
        assert!(matches!(w.send(inner), Err(Error::Timeout)));
    }
}

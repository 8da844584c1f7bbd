//! HTTP server and graceful shutdown.
//!
//! The server is deliberately thin: it accepts connections, turns each hyper
//! request into a [`Request`] plus a fresh root [`ResponseWriter`], runs the
//! root handler — typically a [`SessionGuard`](crate::SessionGuard) — and
//! writes whatever the writer holds once the handler's race has resolved.
//! Routing is not lien's job; bring your own dispatch inside the handler.
//!
//! # Graceful shutdown
//!
//! On SIGTERM (what Kubernetes sends) or Ctrl-C the server stops accepting
//! immediately and lets every in-flight connection task drain before
//! [`Server::serve`] returns. Size `terminationGracePeriodSeconds` above your
//! guards' slowest timeout so abandoned handlers have time to unwind.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;
use crate::writer::ResponseWriter;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching every request through
    /// `root`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, root: impl Handler) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let root: BoxedHandler = root.into_boxed_handler();

        info!(addr = %self.addr, "lien listening");

        // Every connection task lands in the JoinSet so shutdown can wait
        // for the stragglers.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` checks arms top-to-bottom: a shutdown signal must
                // stop the accept loop even when connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let root = Arc::clone(&root);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // The closure runs once per request on the
                        // connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let root = Arc::clone(&root);
                            async move { dispatch(root, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays bounded on
                // long-running processes.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("lien stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Hot path: one hyper request in, one buffered response out.
///
/// The error type is [`Infallible`](std::convert::Infallible) — whatever the
/// handler does (including panicking its own task), hyper never sees an
/// error from here except the unwound panic itself.
async fn dispatch(
    root: BoxedHandler,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            let resp = Response::from_parts(StatusCode::BAD_REQUEST, Vec::new(), Vec::new());
            return Ok(resp.into_http());
        }
    };

    let headers = parts
        .headers
        .iter()
        .map(|(k, v)| {
            (k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned())
        })
        .collect();

    let request = Request::new(
        parts.method.as_str().to_owned(),
        parts.uri.path().to_owned(),
        headers,
        body,
    );

    let writer = ResponseWriter::new();
    if let Err(err) = root.call(request, writer.clone()).await {
        // The root handler has no enclosing guard to log for it.
        tracing::debug!(error = %err, "root handler returned an error");
    }

    Ok(writer.take_response().into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// Ctrl-C on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

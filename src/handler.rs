//! Handler trait and type erasure.
//!
//! A wrapped handler is any async function of the shape:
//!
//! ```text
//! async fn name(req: Request, w: ResponseWriter) -> impl IntoOutcome
//! ```
//!
//! The handler receives the request (carrying its database capabilities) and
//! the buffering writer — never the real connection. The guard needs to hold
//! handlers of *different* concrete types behind one field, so the concrete
//! type is erased behind `dyn ErasedHandler` exactly once at construction:
//!
//! ```text
//! async fn hello(req, w) -> Result<(), Error> { … }   ← user writes this
//!        ↓ SessionGuard::new(cfg)
//! hello.into_boxed_handler()                          ← Handler blanket impl
//!        ↓ stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req, w)  at request time               ← one vtable dispatch
//! ```
//!
//! The per-request cost is one `Arc` clone plus one virtual call — noise next
//! to the database I/O the handler is about to do.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::writer::ResponseWriter;

/// A heap-allocated, type-erased handler future.
pub(crate) type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, w: ResponseWriter) -> HandlerFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid wrapped handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn(Request, ResponseWriter)` returning `()` or
/// `Result<(), Error>` (the latter lets the handler use `?` on writer
/// calls), and for [`SessionGuard`](crate::SessionGuard) itself so guards
/// for different stores can stack.
///
/// The trait is **sealed**: only the impls in this crate can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

/// Conversion of a handler's return value into the uniform outcome the
/// coordinator observes. The guard logs an `Err` outcome; it never turns it
/// into a response — what the client sees is decided by the writer and the
/// race alone.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<(), Error>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), Error> {
        Ok(())
    }
}

impl IntoOutcome for Result<(), Error> {
    fn into_outcome(self) -> Result<(), Error> {
        self
    }
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper bridging a concrete handler `F` into the trait-object
/// world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request, w: ResponseWriter) -> HandlerFuture {
        let fut = (self.0)(req, w);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

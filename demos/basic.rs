//! Minimal lien example — an in-memory driver adapter behind a session guard.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl -d 'some command' http://localhost:3000/

use std::sync::Arc;
use std::time::Duration;

use lien::{
    BoxFuture, Error, RawDatabase, RawSession, Request, ResponseWriter, Server, SessionError,
    SessionFactory, SessionGuard, SessionGuardConfig,
};

// A driver adapter is three small impls. A real one would wrap your driver's
// pool, session, and database handles; this one just answers from memory.

struct MemoryStore;
struct MemorySession;
struct MemoryDatabase;

impl SessionFactory for MemoryStore {
    fn copy(&self) -> Arc<dyn RawSession> {
        Arc::new(MemorySession)
    }
}

impl RawSession for MemorySession {
    fn set_timeout(&self, _timeout: Duration) {}

    fn ping(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async { Ok(()) })
    }

    fn database(&self, _name: &str) -> Box<dyn RawDatabase> {
        Box::new(MemoryDatabase)
    }

    fn close(&self) {}
}

impl RawDatabase for MemoryDatabase {
    fn run(&self, command: &[u8]) -> BoxFuture<'_, Result<Vec<u8>, SessionError>> {
        let reply = format!("ran a {}-byte command\n", command.len()).into_bytes();
        Box::pin(async move { Ok(reply) })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(MemoryStore),
        database: "maindb".to_owned(),
        timeout: Duration::from_millis(500),
        handler,
    });

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

async fn handler(req: Request, w: ResponseWriter) -> Result<(), Error> {
    // Same session copy on both calls — the guard's lease guarantees it.
    let db = req.db("maindb");
    if db.ping().await.is_err() {
        w.write_header(http::StatusCode::SERVICE_UNAVAILABLE);
        return Ok(());
    }

    match db.database("demo").run(req.body()).await {
        Ok(reply) => {
            w.header("content-type", "text/plain; charset=utf-8");
            w.write(&reply)?;
        }
        Err(_) => w.write_header(http::StatusCode::INTERNAL_SERVER_ERROR),
    }
    Ok(())
}

//! End-to-end tests for the session guard: the deadline race, session
//! lifecycle across both branches, and guard stacking.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use lien::testing::{StubFactory, request};
use lien::{Error, Request, ResponseWriter, SessionGuard, SessionGuardConfig};

const DEADLINE: Duration = Duration::from_millis(50);

// Overriding the timeout status lets assertions distinguish this guard's
// timeouts from any real 503 a handler might write.
const TEST_CODE: StatusCode = StatusCode::IM_A_TEAPOT;

fn guard(factory: &StubFactory, handler: impl lien::Handler) -> SessionGuard {
    SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(factory.clone()),
        database: "maindb".to_owned(),
        timeout: DEADLINE,
        handler,
    })
    .error_code(TEST_CODE)
}

async fn ping_twice(req: Request, w: ResponseWriter) -> Result<(), Error> {
    for _ in 0..2 {
        let db = req.db("maindb");
        if db.ping().await.is_err() {
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            return Ok(());
        }
    }
    w.write(b"pong")?;
    Ok(())
}

async fn one_slow_query(req: Request, w: ResponseWriter) -> Result<(), Error> {
    let db = req.db("maindb");
    match db.database("test").run(b"sleep").await {
        // Differentiates handler-written statuses from the guard's timeout
        // code: neither arm should ever reach the client in these tests.
        Ok(_) => w.write(b"finished").map(|_| ()),
        Err(_) => {
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(())
        }
    }
}

async fn many_small_queries(req: Request, w: ResponseWriter) -> Result<(), Error> {
    for _ in 0..1000 {
        let db = req.db("maindb");
        if db.database("test").run(b"sleep").await.is_err() {
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            return Ok(());
        }
    }
    w.write(b"finished")?;
    Ok(())
}

#[tokio::test]
async fn fast_handler_wins_the_race() {
    let factory = StubFactory::new();
    let g = guard(&factory, ping_twice);

    let resp = g.handle(request().build()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.body(), b"pong");
    // Two capability resolutions, one session copy, closed exactly once.
    assert_eq!(factory.copies(), 1);
    assert_eq!(factory.closes(), 1);
    assert_eq!(factory.applied_timeout(), Some(DEADLINE));
}

#[tokio::test]
async fn single_blocking_query_times_out() {
    let factory = StubFactory::with_op_delay(Duration::from_secs(10));
    let g = guard(&factory, one_slow_query);

    let resp = g.handle(request().build()).await;

    assert_eq!(resp.status(), TEST_CODE);
    assert!(resp.body().is_empty());
    assert_eq!(factory.copies(), 1);
    assert_eq!(factory.closes(), 1);
}

#[tokio::test]
async fn cumulative_small_queries_time_out() {
    let factory = StubFactory::with_op_delay(Duration::from_millis(5));
    let g = guard(&factory, many_small_queries);

    let resp = g.handle(request().build()).await;

    // Not a partial 200: the buffer is discarded wholesale on timeout.
    assert_eq!(resp.status(), TEST_CODE);
    assert!(resp.body().is_empty());
    assert_eq!(factory.closes(), 1);
}

#[tokio::test]
#[should_panic(expected = "no database registered under \"reports\"")]
async fn unregistered_database_name_panics() {
    async fn wrong_name(req: Request, _w: ResponseWriter) {
        let _ = req.db("reports");
    }

    let factory = StubFactory::new();
    guard(&factory, wrong_name).handle(request().build()).await;
}

#[tokio::test]
async fn handler_that_never_asks_for_a_session() {
    async fn no_db(_req: Request, w: ResponseWriter) -> Result<(), Error> {
        w.write_header(StatusCode::NO_CONTENT);
        Ok(())
    }

    let factory = StubFactory::new();
    let resp = guard(&factory, no_db).handle(request().build()).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    // No copy was ever made, and release was a no-op.
    assert_eq!(factory.copies(), 0);
    assert_eq!(factory.closes(), 0);
}

#[tokio::test]
async fn handler_output_is_delivered_verbatim() {
    async fn created(_req: Request, w: ResponseWriter) -> Result<(), Error> {
        w.header("location", "/users/42");
        w.write_header(StatusCode::CREATED);
        w.write(br#"{"id":42}"#)?;
        Ok(())
    }

    let factory = StubFactory::new();
    let resp = guard(&factory, created).handle(request().build()).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.header("location"), Some("/users/42"));
    assert_eq!(resp.body(), br#"{"id":42}"#);
}

#[tokio::test]
async fn timeout_status_defaults_to_503() {
    let factory = StubFactory::with_op_delay(Duration::from_secs(10));
    let g = SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(factory.clone()),
        database: "maindb".to_owned(),
        timeout: DEADLINE,
        handler: one_slow_query,
    });

    let resp = g.handle(request().build()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn outer_timeout_still_closes_the_inner_session() {
    async fn slow_inner(req: Request, w: ResponseWriter) -> Result<(), Error> {
        let db = req.db("audit");
        db.ping().await.ok();
        w.write(b"late")?;
        Ok(())
    }

    let audit = StubFactory::with_op_delay(Duration::from_millis(200));
    let inner = SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(audit.clone()),
        database: "audit".to_owned(),
        timeout: Duration::from_secs(1),
        handler: slow_inner,
    });
    let accounts = StubFactory::new();
    let outer = SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(accounts.clone()),
        database: "accounts".to_owned(),
        timeout: DEADLINE,
        handler: inner,
    })
    .error_code(TEST_CODE);

    // The outer deadline fires while the inner guard's race is still in
    // flight, cancelling the task that drives it — the inner guard never
    // reaches its own release.
    let resp = outer.handle(request().build()).await;
    assert_eq!(resp.status(), TEST_CODE);

    // The abandoned inner handler finishes its 200ms ping on its own; when
    // the last holder of the inner lease goes away, the session must still
    // be closed exactly once.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(audit.copies(), 1);
    assert_eq!(audit.closes(), 1);
    // The outer store was never asked for a session.
    assert_eq!(accounts.copies(), 0);
    assert_eq!(accounts.closes(), 0);
}

#[tokio::test]
async fn stacked_guards_expose_both_stores() {
    async fn both(req: Request, w: ResponseWriter) -> Result<(), Error> {
        // Resolve "accounts" twice on purpose — same lease both times.
        if req.db("accounts").ping().await.is_err()
            || req.db("accounts").ping().await.is_err()
            || req.db("audit").ping().await.is_err()
        {
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            return Ok(());
        }
        w.write(b"both")?;
        Ok(())
    }

    let accounts = StubFactory::new();
    let audit = StubFactory::new();

    let inner = SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(audit.clone()),
        database: "audit".to_owned(),
        timeout: DEADLINE,
        handler: both,
    });
    let outer = SessionGuard::new(SessionGuardConfig {
        factory: Arc::new(accounts.clone()),
        database: "accounts".to_owned(),
        timeout: DEADLINE * 2,
        handler: inner,
    });

    let resp = outer.handle(request().build()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.body(), b"both");
    // One copy and one close per store, despite repeated resolutions.
    assert_eq!(accounts.copies(), 1);
    assert_eq!(accounts.closes(), 1);
    assert_eq!(audit.copies(), 1);
    assert_eq!(audit.closes(), 1);
}

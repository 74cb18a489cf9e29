//! # Comandos de Estado
//! src/commands/status.rs
//!
//! - GET /status: el servidor está vivo
//! - GET /stats: snapshot del pool de workers y del pool de conexiones

use crate::db::{ConnectionPool, PoolStats, SqliteManager};
use crate::http::{Request, Response, StatusCode};
use crate::workers::{WorkerPool, WorkerPoolStats};
use serde::Serialize;
use std::sync::Weak;
use std::time::Instant;

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    pid: u32,
}

#[derive(Serialize)]
struct StatsBody {
    workers: Option<WorkerPoolStats>,
    database: Option<PoolStats>,
}

/// Handler para GET /status
///
/// ```json
/// {"status": "running", "version": "0.1.0", "uptime_secs": 12, "pid": 4242}
/// ```
pub fn status_handler(started: Instant, _req: &Request) -> Response {
    let body = StatusBody {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: started.elapsed().as_secs(),
        pid: std::process::id(),
    };
    Response::json(StatusCode::Ok, &body)
}

/// Handler para GET /stats
///
/// Un pool que ya no existe aparece como `null`.
pub fn stats_handler(
    workers: &Weak<WorkerPool>,
    db: &Weak<ConnectionPool<SqliteManager>>,
    _req: &Request,
) -> Response {
    let body = StatsBody {
        workers: workers.upgrade().map(|pool| pool.stats()),
        database: db.upgrade().map(|pool| pool.stats()),
    };
    Response::json(StatusCode::Ok, &body)
}

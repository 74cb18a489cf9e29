//! # Comandos del Servidor
//!
//! Handlers de las rutas del servidor y armado del router.
//!
//! | Ruta             | Módulo    |
//! |------------------|-----------|
//! | POST /register   | `users`   |
//! | POST /login      | `users`   |
//! | GET /status      | `status`  |
//! | GET /stats       | `status`  |
//!
//! Cualquier otro GET cae en los archivos estáticos de `resource_dir`.

pub mod status;
pub mod users;

pub use status::{stats_handler, status_handler};
pub use users::{login_handler, register_handler};

use crate::config::Config;
use crate::db::{ConnectionPool, SqliteManager, UserManager};
use crate::http::Method;
use crate::router::Router;
use crate::workers::WorkerPool;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Registra todas las rutas del servidor
pub fn build_router(
    config: &Config,
    users: Arc<UserManager>,
    workers: Weak<WorkerPool>,
    db: Weak<ConnectionPool<SqliteManager>>,
) -> Router {
    let mut router = Router::new().with_resource_dir(&config.resource_dir);

    let login_users = Arc::clone(&users);
    router.register(Method::POST, "/login", move |req| login_handler(&login_users, req));
    router.register(Method::POST, "/register", move |req| register_handler(&users, req));

    let started = Instant::now();
    router.register(Method::GET, "/status", move |req| status_handler(started, req));
    router.register(Method::GET, "/stats", move |req| stats_handler(&workers, &db, req));

    router
}

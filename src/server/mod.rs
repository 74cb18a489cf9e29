//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! `Server` arma todos los componentes y los conecta:
//!
//! ```text
//! Config ─► WorkerPool ◄── TimerScheduler (stats periódicas)
//!              ▲
//!              │ una tarea por evento
//!           EventLoop ─► Router ─► UserManager ─► ConnectionPool ─► SQLite
//! ```
//!
//! No hay estado global: cada componente recibe explícitamente lo que usa.

pub mod event_loop;

pub use event_loop::{respond, EventLoop, EventLoopConfig};

use crate::commands;
use crate::config::Config;
use crate::db::{ConnectionPool, PoolConfig, SqliteManager, UserManager};
use crate::error::{Result, ServerError};
use crate::timer::{TimerId, TimerScheduler};
use crate::workers::{Executor, WorkerPool, WorkerPoolConfig};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{info, warn};

pub struct Server {
    // Orden de drop: primero deja de aceptar, después timers, después pools
    event_loop: EventLoop,
    timer: TimerScheduler,
    stats_timer: Option<TimerId>,
    workers: Arc<WorkerPool>,
    db: Arc<ConnectionPool<SqliteManager>>,
}

impl Server {
    pub fn new(config: &Config) -> Result<Self> {
        let workers = Arc::new(WorkerPool::new(WorkerPoolConfig::from_config(config))?);

        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ServerError::ConnectionCreateFailed(format!("{}: {}", parent.display(), e))
                })?;
            }
        }
        let db = Arc::new(ConnectionPool::new(
            SqliteManager::new(&config.db_path),
            PoolConfig::from_config(config),
        )?);

        let users = Arc::new(UserManager::new(Arc::clone(&db))?);
        if let Err(e) = users.ensure_schema() {
            // Sin base el resto del servidor sigue funcionando
            warn!(error = %e, "Could not create users table");
        }

        let router = Arc::new(commands::build_router(
            config,
            users,
            Arc::downgrade(&workers),
            Arc::downgrade(&db),
        ));

        let executor: Arc<dyn Executor> = workers.clone();
        let timer = TimerScheduler::new(Arc::clone(&executor))?;
        let stats_timer = if config.stats_interval > 0 {
            let id = timer.add_timer(
                stats_logger(Arc::downgrade(&workers), Arc::downgrade(&db)),
                Duration::from_secs(config.stats_interval),
                true,
            )?;
            Some(id)
        } else {
            None
        };

        let event_loop = EventLoop::bind(
            &config.address(),
            EventLoopConfig::from_config(config),
            executor,
            router,
        )?;

        Ok(Self {
            event_loop,
            timer,
            stats_timer,
            workers,
            db,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.event_loop.local_addr()
    }

    pub fn workers(&self) -> &Arc<WorkerPool> {
        &self.workers
    }

    pub fn db(&self) -> &Arc<ConnectionPool<SqliteManager>> {
        &self.db
    }

    /// Bloquea el thread actual corriendo el event loop
    pub fn run(mut self) -> Result<()> {
        info!(address = %self.local_addr(), "Server started");
        let result = self.event_loop.run();
        if let Some(id) = self.stats_timer.take() {
            self.timer.remove_timer(id);
        }
        result
    }
}

fn stats_logger(
    workers: Weak<WorkerPool>,
    db: Weak<ConnectionPool<SqliteManager>>,
) -> impl Fn() + Send + Sync + 'static {
    move || {
        if let Some(workers) = workers.upgrade() {
            let s = workers.stats();
            info!(
                workers = s.workers,
                idle = s.idle_workers,
                queued = s.queued,
                completed = s.completed,
                panicked = s.panicked,
                "Worker pool stats"
            );
        }
        if let Some(db) = db.upgrade() {
            let s = db.stats();
            info!(
                size = s.current_size,
                idle = s.idle,
                in_use = s.in_use,
                max_in_use = s.max_in_use,
                allocations = s.total_allocations,
                releases = s.total_releases,
                "Connection pool stats"
            );
        }
    }
}

//! # Pool de Conexiones
//! src/db/pool.rs
//!
//! Pool acotado de conexiones vivas. Las conexiones se prestan con un
//! `PooledConnection` que las devuelve al pool al salir de scope, incluso
//! cuando el código que la usa retorna con error.
//!
//! ## Mantenimiento
//!
//! Un thread revisa cada `check_interval` las conexiones ociosas:
//!
//! 1. Las que superan `idle_timeout` o fallan la prueba de vida se destruyen.
//! 2. Si quedan más de `2 × init_size` ociosas, se recorta a `init_size`.
//!
//! Las conexiones se prueban de a una; mientras tanto las demás siguen
//! disponibles para `acquire`, y cada una que vuelve despierta a un waiter.
//!
//! El lock solo protege la contabilidad del pool; nunca se mantiene
//! durante I/O contra la base de datos.

use crate::config::Config;
use crate::db::manager::ManageConnection;
use crate::error::{Result, ServerError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// === Configuración ===

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Conexiones creadas al arrancar, y piso del recorte
    pub init_size: usize,
    /// Techo de conexiones vivas (prestadas + ociosas)
    pub max_size: usize,
    /// Tiempo máximo que una conexión puede quedar ociosa
    pub idle_timeout: Duration,
    /// Periodo del ciclo de mantenimiento
    pub check_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            init_size: 4,
            max_size: 10,
            idle_timeout: Duration::from_secs(3600),
            check_interval: Duration::from_secs(1),
        }
    }
}

impl PoolConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            init_size: config.db_init_size,
            max_size: config.db_max_size,
            idle_timeout: Duration::from_secs(config.db_idle_timeout),
            check_interval: Duration::from_millis(config.db_check_interval_ms),
        }
    }
}

// === Estado interno ===

struct IdleConnection<C> {
    conn: C,
    returned_at: Instant,
}

struct PoolState<C> {
    idle: VecDeque<IdleConnection<C>>,
    current_size: usize,
    running: bool,
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Connection>>,
    /// Se notifica cuando vuelve una conexión o se libera un lugar
    available: Condvar,
    maintenance_wakeup: Condvar,
    total_allocations: AtomicU64,
    total_releases: AtomicU64,
    max_in_use: AtomicUsize,
}

/// Snapshot de las estadísticas del pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub current_size: usize,
    pub idle: usize,
    pub in_use: usize,
    /// Máximo histórico de conexiones prestadas al mismo tiempo
    pub max_in_use: usize,
    pub total_allocations: u64,
    pub total_releases: u64,
}

/// Resultado de un ciclo de mantenimiento
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired: usize,
    pub unhealthy: usize,
    pub trimmed: usize,
}

// === Pool ===

pub struct ConnectionPool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Crea `init_size` conexiones y arranca el thread de mantenimiento.
    ///
    /// Una conexión inicial que falla se registra y se omite: el pool la
    /// vuelve a intentar en el próximo `acquire`.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self> {
        if config.max_size == 0 {
            return Err(ServerError::Config("db max size must be greater than 0".to_string()));
        }
        if config.init_size > config.max_size {
            return Err(ServerError::Config(format!(
                "db init size ({}) cannot exceed max size ({})",
                config.init_size, config.max_size
            )));
        }

        let mut idle = VecDeque::with_capacity(config.max_size);
        for _ in 0..config.init_size {
            match manager.connect() {
                Ok(conn) => idle.push_back(IdleConnection {
                    conn,
                    returned_at: Instant::now(),
                }),
                Err(e) => warn!(error = %e, "Failed to create initial connection"),
            }
        }
        let current_size = idle.len();

        let inner = Arc::new(PoolInner {
            manager,
            config,
            state: Mutex::new(PoolState {
                idle,
                current_size,
                running: true,
            }),
            available: Condvar::new(),
            maintenance_wakeup: Condvar::new(),
            total_allocations: AtomicU64::new(0),
            total_releases: AtomicU64::new(0),
            max_in_use: AtomicUsize::new(0),
        });

        let thread_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name("db-maintenance".to_string())
            .spawn(move || maintenance_loop(thread_inner))
            .map_err(ServerError::Spawn)?;

        info!(
            connections = current_size,
            max = inner.config.max_size,
            "Connection pool initialized"
        );

        Ok(Self {
            inner,
            maintenance: Mutex::new(Some(handle)),
        })
    }

    /// Presta una conexión.
    ///
    /// Usa una ociosa si hay; si no, crea una mientras `current_size < max`;
    /// si no, bloquea hasta que alguien devuelva o destruya una. No llamar
    /// desde el thread del event loop.
    pub fn acquire(&self) -> Result<PooledConnection<M>> {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        loop {
            if !state.running {
                return Err(ServerError::PoolClosed);
            }

            if let Some(idle) = state.idle.pop_back() {
                let in_use = state.current_size - state.idle.len();
                drop(state);
                return Ok(self.lend(idle.conn, in_use));
            }

            if state.current_size < inner.config.max_size {
                // Reservamos el lugar antes de soltar el lock
                state.current_size += 1;
                let in_use = state.current_size - state.idle.len();
                drop(state);

                return match inner.manager.connect() {
                    Ok(conn) => {
                        debug!("Created new database connection");
                        Ok(self.lend(conn, in_use))
                    }
                    Err(e) => {
                        inner.state.lock().current_size -= 1;
                        inner.available.notify_one();
                        warn!(error = %e, "Failed to create database connection");
                        Err(e)
                    }
                };
            }

            inner.available.wait(&mut state);
        }
    }

    fn lend(&self, conn: M::Connection, in_use: usize) -> PooledConnection<M> {
        self.inner.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.inner.max_in_use.fetch_max(in_use, Ordering::Relaxed);
        PooledConnection {
            pool: Arc::clone(&self.inner),
            conn: Some(conn),
            broken: false,
        }
    }

    /// Corre un ciclo de mantenimiento ahora mismo
    pub fn run_maintenance(&self) -> MaintenanceReport {
        self.inner.maintain()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            current_size: state.current_size,
            idle: state.idle.len(),
            in_use: state.current_size - state.idle.len(),
            max_in_use: self.inner.max_in_use.load(Ordering::Relaxed),
            total_allocations: self.inner.total_allocations.load(Ordering::Relaxed),
            total_releases: self.inner.total_releases.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Detiene el mantenimiento y destruye las conexiones ociosas.
    ///
    /// Las conexiones prestadas se destruyen cuando vuelven.
    pub fn shutdown(&self) {
        let drained: Vec<IdleConnection<M::Connection>> = {
            let mut state = self.inner.state.lock();
            state.running = false;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.current_size -= drained.len();
            drained
        };
        self.inner.maintenance_wakeup.notify_all();
        self.inner.available.notify_all();

        if let Some(handle) = self.maintenance.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
            info!(closed = drained.len(), "Connection pool shut down");
        }
        drop(drained);
    }
}

impl<M: ManageConnection> Drop for ConnectionPool<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<M: ManageConnection> PoolInner<M> {
    fn release(&self, conn: M::Connection) {
        let mut state = self.state.lock();
        self.total_releases.fetch_add(1, Ordering::Relaxed);

        if !state.running {
            state.current_size -= 1;
            drop(state);
            drop(conn);
            return;
        }

        state.idle.push_back(IdleConnection {
            conn,
            returned_at: Instant::now(),
        });
        drop(state);
        self.available.notify_one();
    }

    fn destroy(&self, conn: M::Connection) {
        let mut state = self.state.lock();
        self.total_releases.fetch_add(1, Ordering::Relaxed);
        state.current_size -= 1;
        drop(state);
        drop(conn);
        // El lugar liberado permite crear otra
        self.available.notify_one();
    }

    fn maintain(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();
        let pending = {
            let state = self.state.lock();
            if !state.running {
                return report;
            }
            state.idle.len()
        };

        // De a una: el resto de las ociosas sigue disponible para acquire
        for _ in 0..pending {
            let mut idle = {
                let mut state = self.state.lock();
                if !state.running {
                    break;
                }
                let Some(idle) = state.idle.pop_front() else {
                    break;
                };
                if idle.returned_at.elapsed() > self.config.idle_timeout {
                    report.expired += 1;
                    state.current_size -= 1;
                    drop(state);
                    drop(idle);
                    self.available.notify_one();
                    continue;
                }
                idle
            };

            // Sin lock: la prueba de vida hace I/O
            let healthy = self.manager.check(&mut idle.conn).is_ok();

            let mut state = self.state.lock();
            if !healthy {
                report.unhealthy += 1;
                state.current_size -= 1;
            } else if !state.running {
                // shutdown corrió mientras probábamos
                state.current_size -= 1;
            } else {
                state.idle.push_back(idle);
                drop(state);
                self.available.notify_one();
                continue;
            }
            drop(state);
            drop(idle);
            self.available.notify_one();
        }

        let (trimmed, size) = {
            let mut state = self.state.lock();
            let mut trimmed = Vec::new();
            if state.running && state.idle.len() > 2 * self.config.init_size {
                while state.idle.len() > self.config.init_size {
                    match state.idle.pop_front() {
                        Some(idle) => trimmed.push(idle),
                        None => break,
                    }
                }
                state.current_size -= trimmed.len();
            }
            (trimmed, state.current_size)
        };
        report.trimmed = trimmed.len();
        drop(trimmed);

        if report != MaintenanceReport::default() {
            self.available.notify_all();
            info!(
                expired = report.expired,
                unhealthy = report.unhealthy,
                trimmed = report.trimmed,
                current_size = size,
                "Connection pool maintenance"
            );
        }
        report
    }
}

fn maintenance_loop<M: ManageConnection>(inner: Arc<PoolInner<M>>) {
    let mut state = inner.state.lock();
    loop {
        if !state.running {
            break;
        }
        inner
            .maintenance_wakeup
            .wait_for(&mut state, inner.config.check_interval);
        if !state.running {
            break;
        }
        MutexGuard::unlocked(&mut state, || {
            inner.maintain();
        });
    }
    debug!("Connection pool maintenance thread stopped");
}

// === Conexión prestada ===

/// Conexión prestada por el pool. Vuelve al pool en `Drop`.
pub struct PooledConnection<M: ManageConnection> {
    pool: Arc<PoolInner<M>>,
    /// `None` solo durante `Drop`
    conn: Option<M::Connection>,
    broken: bool,
}

impl<M: ManageConnection> PooledConnection<M> {
    /// Destruye la conexión en vez de devolverla (por ejemplo, si el
    /// llamador detectó que está rota).
    pub fn discard(mut self) {
        self.broken = true;
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.broken {
            self.pool.destroy(conn);
        } else {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;

    #[derive(Default)]
    struct MockState {
        next_id: AtomicUsize,
        created: AtomicUsize,
        fail_connect: AtomicBool,
        unhealthy: Mutex<HashSet<usize>>,
        check_delay_ms: AtomicU64,
    }

    #[derive(Clone, Default)]
    struct MockManager(Arc<MockState>);

    #[derive(Debug)]
    struct MockConn {
        id: usize,
    }

    impl ManageConnection for MockManager {
        type Connection = MockConn;

        fn connect(&self) -> Result<MockConn> {
            if self.0.fail_connect.load(Ordering::SeqCst) {
                return Err(ServerError::ConnectionCreateFailed("mock refused".to_string()));
            }
            self.0.created.fetch_add(1, Ordering::SeqCst);
            Ok(MockConn {
                id: self.0.next_id.fetch_add(1, Ordering::SeqCst),
            })
        }

        fn check(&self, conn: &mut MockConn) -> Result<()> {
            let delay = self.0.check_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                thread::sleep(Duration::from_millis(delay));
            }
            if self.0.unhealthy.lock().contains(&conn.id) {
                Err(ServerError::ConnectionUnhealthy)
            } else {
                Ok(())
            }
        }
    }

    fn config(init: usize, max: usize) -> PoolConfig {
        PoolConfig {
            init_size: init,
            max_size: max,
            idle_timeout: Duration::from_secs(3600),
            // Mantenimiento manual con run_maintenance()
            check_interval: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_init_creates_connections() {
        let manager = MockManager::default();
        let pool = ConnectionPool::new(manager.clone(), config(4, 10)).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.current_size, 4);
        assert_eq!(stats.idle, 4);
        assert_eq!(manager.0.created.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_invalid_config() {
        assert!(ConnectionPool::new(MockManager::default(), config(5, 2)).is_err());
        assert!(ConnectionPool::new(MockManager::default(), config(0, 0)).is_err());
    }

    #[test]
    fn test_acquire_and_release() {
        let pool = ConnectionPool::new(MockManager::default(), config(2, 4)).unwrap();

        {
            let conn = pool.acquire().unwrap();
            let _ = conn.id;
            let stats = pool.stats();
            assert_eq!(stats.in_use, 1);
            assert_eq!(stats.idle, 1);
        }

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.total_allocations, 1);
        assert_eq!(stats.total_releases, 1);
        assert_eq!(stats.max_in_use, 1);
    }

    #[test]
    fn test_released_on_error_path() {
        let pool = ConnectionPool::new(MockManager::default(), config(1, 1)).unwrap();

        fn failing(pool: &ConnectionPool<MockManager>) -> Result<()> {
            let _conn = pool.acquire()?;
            Err(ServerError::ConnectionUnhealthy)
        }

        assert!(failing(&pool).is_err());
        assert_eq!(pool.stats().idle, 1);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_grows_up_to_max_then_blocks() {
        let manager = MockManager::default();
        let pool = Arc::new(ConnectionPool::new(manager.clone(), config(4, 10)).unwrap());

        let held: Vec<_> = (0..10).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.stats().current_size, 10);
        assert_eq!(manager.0.created.load(Ordering::SeqCst), 10);

        let (tx, rx) = mpsc::channel();
        let waiter_pool = Arc::clone(&pool);
        let waiter = thread::spawn(move || {
            let conn = waiter_pool.acquire().unwrap();
            tx.send(conn.id).unwrap();
        });

        // El 11º queda bloqueado
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        let mut held = held;
        let released = held.pop().unwrap();
        let released_id = released.id;
        drop(released);

        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, released_id);
        waiter.join().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.current_size, 10);
        assert_eq!(stats.max_in_use, 10);
        assert_eq!(manager.0.created.load(Ordering::SeqCst), 10);
        drop(held);
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_max() {
        let manager = MockManager::default();
        let pool = Arc::new(ConnectionPool::new(manager.clone(), config(0, 3)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _conn = pool.acquire().unwrap();
                        thread::sleep(Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert!(manager.0.created.load(Ordering::SeqCst) <= 3);
        assert!(stats.max_in_use <= 3);
        assert_eq!(stats.total_allocations, 160);
        assert_eq!(stats.total_releases, 160);
    }

    #[test]
    fn test_unhealthy_connection_never_returned() {
        let manager = MockManager::default();
        let pool = ConnectionPool::new(manager.clone(), config(2, 4)).unwrap();

        let bad_id = {
            let conn = pool.acquire().unwrap();
            conn.id
        };
        manager.0.unhealthy.lock().insert(bad_id);

        let report = pool.run_maintenance();
        assert_eq!(report.unhealthy, 1);
        assert_eq!(pool.stats().current_size, 1);

        let held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        assert!(held.iter().all(|conn| conn.id != bad_id));
    }

    #[test]
    fn test_idle_timeout_evicts() {
        let mut cfg = config(2, 4);
        cfg.idle_timeout = Duration::from_millis(50);
        let pool = ConnectionPool::new(MockManager::default(), cfg).unwrap();

        thread::sleep(Duration::from_millis(100));
        let report = pool.run_maintenance();
        assert_eq!(report.expired, 2);
        assert_eq!(pool.stats().current_size, 0);

        // Se recrea bajo demanda
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_shrinks_surplus_back_to_init() {
        let pool = ConnectionPool::new(MockManager::default(), config(2, 10)).unwrap();

        let burst: Vec<_> = (0..7).map(|_| pool.acquire().unwrap()).collect();
        drop(burst);
        assert_eq!(pool.stats().idle, 7);

        let report = pool.run_maintenance();
        assert_eq!(report.trimmed, 5);
        let stats = pool.stats();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.current_size, 2);
    }

    #[test]
    fn test_no_shrink_within_twice_init() {
        let pool = ConnectionPool::new(MockManager::default(), config(2, 10)).unwrap();

        let burst: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        drop(burst);

        let report = pool.run_maintenance();
        assert_eq!(report, MaintenanceReport::default());
        assert_eq!(pool.stats().idle, 4);
    }

    #[test]
    fn test_maintenance_thread_runs_periodically() {
        let manager = MockManager::default();
        let mut cfg = config(2, 4);
        cfg.check_interval = Duration::from_millis(20);
        let pool = ConnectionPool::new(manager.clone(), cfg).unwrap();

        manager.0.unhealthy.lock().extend([0, 1]);

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.stats().current_size > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.stats().current_size, 0);
    }

    #[test]
    fn test_create_failure_rolls_back() {
        let manager = MockManager::default();
        let pool = ConnectionPool::new(manager.clone(), config(0, 2)).unwrap();

        manager.0.fail_connect.store(true, Ordering::SeqCst);
        let result = pool.acquire();
        assert!(matches!(result, Err(ServerError::ConnectionCreateFailed(_))));
        assert_eq!(pool.stats().current_size, 0);

        manager.0.fail_connect.store(false, Ordering::SeqCst);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_initial_failures_are_skipped() {
        let manager = MockManager::default();
        manager.0.fail_connect.store(true, Ordering::SeqCst);

        let pool = ConnectionPool::new(manager.clone(), config(3, 5)).unwrap();
        assert_eq!(pool.stats().current_size, 0);
    }

    #[test]
    fn test_discard_frees_slot() {
        let manager = MockManager::default();
        let pool = ConnectionPool::new(manager.clone(), config(1, 1)).unwrap();

        let conn = pool.acquire().unwrap();
        let first_id = conn.id;
        conn.discard();
        assert_eq!(pool.stats().current_size, 0);

        let conn = pool.acquire().unwrap();
        assert_ne!(conn.id, first_id);
        assert_eq!(manager.0.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_closes_pool() {
        let pool = Arc::new(ConnectionPool::new(MockManager::default(), config(1, 1)).unwrap());
        let held = pool.acquire().unwrap();

        let waiter_pool = Arc::clone(&pool);
        let waiter = thread::spawn(move || waiter_pool.acquire().map(|_| ()));
        thread::sleep(Duration::from_millis(50));

        pool.shutdown();
        assert!(matches!(waiter.join().unwrap(), Err(ServerError::PoolClosed)));
        assert!(matches!(pool.acquire(), Err(ServerError::PoolClosed)));

        // La prestada se destruye al volver
        drop(held);
        assert_eq!(pool.stats().current_size, 0);
    }

    #[test]
    fn test_waiter_wakes_after_slow_health_check() {
        let manager = MockManager::default();
        manager.0.check_delay_ms.store(300, Ordering::SeqCst);
        let pool = Arc::new(ConnectionPool::new(manager.clone(), config(1, 1)).unwrap());

        let maintenance_pool = Arc::clone(&pool);
        let maintenance = thread::spawn(move || maintenance_pool.run_maintenance());
        thread::sleep(Duration::from_millis(50));

        let (tx, rx) = mpsc::channel();
        let waiter_pool = Arc::clone(&pool);
        thread::spawn(move || {
            let _ = tx.send(waiter_pool.acquire().map(|conn| conn.id));
        });

        assert_eq!(maintenance.join().unwrap(), MaintenanceReport::default());
        let acquired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(acquired.unwrap(), 0);
        assert_eq!(manager.0.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_health_check_keeps_other_idle_available() {
        let manager = MockManager::default();
        manager.0.check_delay_ms.store(200, Ordering::SeqCst);
        let pool = Arc::new(ConnectionPool::new(manager.clone(), config(2, 4)).unwrap());

        let maintenance_pool = Arc::clone(&pool);
        let maintenance = thread::spawn(move || maintenance_pool.run_maintenance());
        thread::sleep(Duration::from_millis(50));

        // Mientras se prueba una, la otra sigue ociosa: no hace falta crear
        let conn = pool.acquire().unwrap();
        assert_eq!(manager.0.created.load(Ordering::SeqCst), 2);
        drop(conn);

        maintenance.join().unwrap();
        let stats = pool.stats();
        assert_eq!(stats.current_size, 2);
        assert_eq!(stats.idle, 2);
    }
}

//! # Pool de Workers Elástico
//! src/workers/pool.rs
//!
//! Implementa la cola de tareas thread-safe (un Mutex + un Condvar) y los
//! workers que la consumen. Cada worker:
//!
//! 1. Espera hasta que haya una tarea o se pida detenerse
//! 2. Si se está deteniendo y la cola está vacía, termina
//! 3. Si no, saca una tarea bajo el lock y la ejecuta fuera del lock
//!
//! Un panic dentro de una tarea se captura en el borde del worker, se
//! registra y el worker continúa con la siguiente.

use crate::config::Config;
use crate::error::{Result, ServerError};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Unidad de trabajo opaca: un closure sin argumentos
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Algo capaz de ejecutar tareas en otro thread.
///
/// El `TimerScheduler` despacha sus callbacks a través de este trait,
/// sin saber quién los ejecuta.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task) -> Result<()>;
}

/// Configuración del pool de workers
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Piso de workers vivos (nunca se baja de aquí)
    pub min_workers: usize,

    /// Techo de workers vivos
    pub max_workers: usize,

    /// Capacidad máxima de la cola de tareas
    pub queue_limit: usize,

    /// Período del ciclo de ajuste elástico
    pub adjust_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 4,
            max_workers: 16,
            queue_limit: 128,
            adjust_interval: Duration::from_secs(5),
        }
    }
}

impl WorkerPoolConfig {
    /// Crea una configuración desde el Config principal
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_workers: config.workers_min,
            max_workers: config.workers_max,
            queue_limit: config.queue_limit,
            adjust_interval: Duration::from_millis(config.adjust_interval_ms),
        }
    }
}

/// Estado protegido por el mutex de la cola
struct PoolState {
    tasks: VecDeque<Task>,
    stop: bool,

    /// Workers vivos
    workers: usize,

    /// Workers bloqueados esperando trabajo
    idle: usize,

    /// Pedidos de retiro pendientes (los atiende el próximo worker ocioso)
    retiring: usize,

    handles: Vec<JoinHandle<()>>,
    maintenance: Option<JoinHandle<()>>,
}

struct Shared {
    config: WorkerPoolConfig,
    state: Mutex<PoolState>,

    /// Despierta workers cuando hay tareas, retiros o stop
    available: Condvar,

    /// Despierta al thread de mantenimiento al hacer shutdown
    maintenance_wakeup: Condvar,

    next_worker_id: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Pool de workers con cola acotada y tamaño elástico
pub struct WorkerPool {
    shared: Arc<Shared>,
}

/// Snapshot de estadísticas del pool
#[derive(Debug, Clone, Serialize)]
pub struct WorkerPoolStats {
    pub workers: usize,
    pub idle_workers: usize,
    pub queued: usize,
    pub capacity: usize,
    pub min_workers: usize,
    pub max_workers: usize,
    pub completed: u64,
    pub panicked: u64,
}

/// Resultado futuro de una tarea enviada con `submit`
pub struct TaskHandle<T> {
    receiver: mpsc::Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Bloquea hasta que la tarea termine y retorna su valor
    pub fn wait(self) -> Result<T> {
        match self.receiver.recv() {
            Ok(result) => result,
            // La tarea se descartó sin ejecutarse
            Err(_) => Err(ServerError::PoolShutdown),
        }
    }

    /// Como `wait`, pero se rinde después de `timeout`. Retorna `None`
    /// si la tarea todavía no terminó.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(ServerError::PoolShutdown)),
        }
    }
}

impl WorkerPool {
    /// Crea el pool, arranca `min_workers` threads y el ciclo de ajuste
    pub fn new(config: WorkerPoolConfig) -> Result<Self> {
        if config.min_workers == 0 || config.max_workers < config.min_workers {
            return Err(ServerError::Config(format!(
                "worker bounds must satisfy 1 <= min ({}) <= max ({})",
                config.min_workers, config.max_workers
            )));
        }
        if config.queue_limit == 0 {
            return Err(ServerError::Config("queue limit must be >= 1".to_string()));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                tasks: VecDeque::with_capacity(config.queue_limit),
                stop: false,
                workers: 0,
                idle: 0,
                retiring: 0,
                handles: Vec::with_capacity(config.max_workers),
                maintenance: None,
            }),
            available: Condvar::new(),
            maintenance_wakeup: Condvar::new(),
            next_worker_id: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            config,
        });

        let pool = Self { shared };

        {
            let mut state = pool.shared.state.lock();
            for _ in 0..pool.shared.config.min_workers {
                if let Err(e) = spawn_worker(&pool.shared, &mut state) {
                    drop(state);
                    pool.shutdown();
                    return Err(e);
                }
            }

            let shared = Arc::clone(&pool.shared);
            let maintenance = thread::Builder::new()
                .name("pool-adjust".to_string())
                .spawn(move || maintenance_loop(shared))
                .map_err(ServerError::Spawn);
            match maintenance {
                Ok(handle) => state.maintenance = Some(handle),
                Err(e) => {
                    drop(state);
                    pool.shutdown();
                    return Err(e);
                }
            }
        }

        info!(
            workers = pool.shared.config.min_workers,
            max_workers = pool.shared.config.max_workers,
            queue_limit = pool.shared.config.queue_limit,
            "Worker pool initialized"
        );
        Ok(pool)
    }

    /// Encola una tarea y retorna un handle para obtener su resultado.
    ///
    /// Falla con `QueueFull` si la cola está en su capacidad máxima.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.enqueue(Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    let _ = tx.send(Err(ServerError::TaskPanicked(panic_message(&*payload))));
                    // El worker lo registra y lo cuenta
                    panic::resume_unwind(payload);
                }
            }
        }))?;
        Ok(TaskHandle { receiver: rx })
    }

    /// Encola una tarea sin interesarse por su resultado
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f))
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.stop {
            return Err(ServerError::PoolShutdown);
        }
        if state.tasks.len() >= self.shared.config.queue_limit {
            warn!(capacity = self.shared.config.queue_limit, "Task queue is full");
            return Err(ServerError::QueueFull(self.shared.config.queue_limit));
        }
        state.tasks.push_back(task);
        drop(state);

        self.shared.available.notify_one();
        Ok(())
    }

    /// Detiene el pool.
    ///
    /// Las tareas ya encoladas se ejecutan antes de que los workers
    /// terminen. Bloquea hasta que todos los workers hayan salido.
    pub fn shutdown(&self) {
        let (handles, maintenance) = {
            let mut state = self.shared.state.lock();
            if !state.stop {
                info!(queued = state.tasks.len(), "Shutting down worker pool");
            }
            state.stop = true;
            (std::mem::take(&mut state.handles), state.maintenance.take())
        };
        self.shared.available.notify_all();
        self.shared.maintenance_wakeup.notify_all();

        let current = thread::current().id();
        for handle in maintenance.into_iter().chain(handles) {
            // Un worker que suelta el último Arc del pool no puede unirse a sí mismo
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }
    }

    /// Cantidad de workers vivos
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Tareas esperando en la cola
    pub fn queued(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }

    pub fn stats(&self) -> WorkerPoolStats {
        let state = self.shared.state.lock();
        WorkerPoolStats {
            workers: state.workers,
            idle_workers: state.idle,
            queued: state.tasks.len(),
            capacity: self.shared.config.queue_limit,
            min_workers: self.shared.config.min_workers,
            max_workers: self.shared.config.max_workers,
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) -> Result<()> {
        self.enqueue(task)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Arranca un worker nuevo. Se llama con el lock tomado.
fn spawn_worker(shared: &Arc<Shared>, state: &mut PoolState) -> Result<()> {
    let id = shared.next_worker_id.fetch_add(1, Ordering::Relaxed);
    let worker_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("worker-{}", id))
        .spawn(move || worker_loop(worker_shared))
        .map_err(ServerError::Spawn)?;

    state.workers += 1;
    // Los handles de workers retirados ya terminaron; no hace falta guardarlos
    state.handles.retain(|h| !h.is_finished());
    state.handles.push(handle);
    debug!(worker_id = id, workers = state.workers, "Worker spawned");
    Ok(())
}

/// Loop principal del worker
fn worker_loop(shared: Arc<Shared>) {
    debug!("Worker started");

    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                // Primero drenar: nada encolado antes del shutdown se pierde
                if let Some(task) = state.tasks.pop_front() {
                    break task;
                }
                if state.stop {
                    state.workers -= 1;
                    debug!("Worker stopping");
                    return;
                }
                if state.retiring > 0 {
                    state.retiring -= 1;
                    state.workers -= 1;
                    debug!(workers = state.workers, "Worker retired");
                    return;
                }
                state.idle += 1;
                shared.available.wait(&mut state);
                state.idle -= 1;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                shared.panicked.fetch_add(1, Ordering::Relaxed);
                error!(reason = %panic_message(&*payload), "Task failed with panic");
            }
        }
    }
}

/// Ciclo de ajuste elástico.
///
/// - Crece en uno si `queued > 2 × workers` y no se llegó al techo
/// - Se achica en uno si `queued < workers / 2` y se está sobre el piso
///
/// Un retiro pendiente cuenta como worker menos, pero el thread sigue vivo
/// hasta que lo consume; si hace falta crecer se cancela el retiro en vez
/// de arrancar otro thread.
fn maintenance_loop(shared: Arc<Shared>) {
    let interval = shared.config.adjust_interval;
    let mut state = shared.state.lock();

    loop {
        shared.maintenance_wakeup.wait_for(&mut state, interval);
        if state.stop {
            return;
        }

        let queued = state.tasks.len();
        // Los workers con retiro pendiente ya no cuentan
        let workers = state.workers - state.retiring.min(state.workers);

        if queued > workers * 2 && workers < shared.config.max_workers {
            if state.retiring > 0 {
                // El worker que se iba a retirar sigue vivo: se queda
                state.retiring -= 1;
                info!(workers = workers + 1, queued, "Worker retirement cancelled");
            } else if state.workers < shared.config.max_workers {
                match spawn_worker(&shared, &mut state) {
                    Ok(()) => info!(workers = state.workers, queued, "Worker pool expanded"),
                    Err(e) => error!(error = %e, "Failed to expand worker pool"),
                }
            }
        } else if queued < workers / 2 && workers > shared.config.min_workers {
            state.retiring += 1;
            shared.available.notify_one();
            info!(workers = workers - 1, queued, "Worker pool shrunk");
        }
    }
}

/// Extrae el mensaje de un panic
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Barrier;
    use std::time::Instant;

    fn config(min: usize, max: usize, queue: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            min_workers: min,
            max_workers: max,
            queue_limit: queue,
            adjust_interval: Duration::from_secs(60),
        }
    }

    /// Espera hasta que `cond` se cumpla o se acabe el tiempo
    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_starts_with_min_workers() {
        let pool = WorkerPool::new(config(3, 8, 16)).unwrap();
        assert_eq!(pool.worker_count(), 3);
        pool.shutdown();
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(WorkerPool::new(config(0, 4, 16)).is_err());
        assert!(WorkerPool::new(config(4, 2, 16)).is_err());
        assert!(WorkerPool::new(config(1, 2, 0)).is_err());
    }

    #[test]
    fn test_every_task_runs_exactly_once() {
        let pool = WorkerPool::new(config(4, 4, 256)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                thread::sleep(Duration::from_micros(200));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        // shutdown drena la cola antes de volver
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 200);
        assert_eq!(pool.stats().completed, 200);
    }

    #[test]
    fn test_queue_full_after_limit() {
        let limit = 8;
        let pool = WorkerPool::new(config(1, 1, limit)).unwrap();

        // Ocupar al único worker
        let gate = Arc::new(Barrier::new(2));
        let worker_gate = Arc::clone(&gate);
        pool.execute(move || {
            worker_gate.wait();
        })
        .unwrap();
        assert!(wait_until(Duration::from_secs(2), || pool.queued() == 0));

        for _ in 0..limit {
            assert!(pool.execute(|| {}).is_ok());
        }
        let overflow = pool.execute(|| {});
        assert!(matches!(overflow, Err(ServerError::QueueFull(8))));

        gate.wait();
        pool.shutdown();
        assert_eq!(pool.stats().completed, (limit + 1) as u64);
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = WorkerPool::new(config(2, 2, 16)).unwrap();
        let handle = pool.submit(|| 6 * 7).unwrap();
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_panic_is_isolated() {
        let pool = WorkerPool::new(config(1, 1, 16)).unwrap();

        let failing = pool.submit(|| -> u32 { panic!("boom") }).unwrap();
        match failing.wait() {
            Err(ServerError::TaskPanicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected TaskPanicked, got {:?}", other.map(|_| ())),
        }

        // El mismo (único) worker sigue atendiendo
        let ok = pool.submit(|| "still alive").unwrap();
        assert_eq!(ok.wait().unwrap(), "still alive");

        assert!(wait_until(Duration::from_secs(1), || pool.stats().panicked == 1));
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(config(1, 1, 4)).unwrap();
        pool.shutdown();
        assert!(matches!(pool.execute(|| {}), Err(ServerError::PoolShutdown)));
    }

    #[test]
    fn test_wait_timeout_on_slow_task() {
        let pool = WorkerPool::new(config(1, 1, 4)).unwrap();
        let handle = pool
            .submit(|| {
                thread::sleep(Duration::from_millis(200));
                1
            })
            .unwrap();
        assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
        assert_eq!(handle.wait().unwrap(), 1);
    }

    #[test]
    fn test_never_shrinks_below_floor() {
        let mut cfg = config(3, 8, 16);
        cfg.adjust_interval = Duration::from_millis(10);
        let pool = WorkerPool::new(cfg).unwrap();

        thread::sleep(Duration::from_millis(150));
        assert_eq!(pool.worker_count(), 3);
    }

    #[test]
    fn test_elastic_scale_up_and_back_down() {
        let cfg = WorkerPoolConfig {
            min_workers: 4,
            max_workers: 16,
            queue_limit: 128,
            adjust_interval: Duration::from_millis(50),
        };
        let pool = WorkerPool::new(cfg).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(100));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        let mut peak = pool.worker_count();
        let start = Instant::now();
        while done.load(Ordering::SeqCst) < 50 && start.elapsed() < Duration::from_secs(10) {
            peak = peak.max(pool.worker_count());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(done.load(Ordering::SeqCst), 50);
        assert!(peak > 4, "pool never grew (peak = {})", peak);
        assert!(peak <= 16);

        // Sin carga vuelve al piso
        assert!(wait_until(Duration::from_secs(5), || pool.worker_count() == 4));
    }

    #[test]
    fn test_pending_retirement_never_exceeds_ceiling() {
        let mut cfg = config(1, 2, 32);
        cfg.adjust_interval = Duration::from_millis(20);
        let pool = WorkerPool::new(cfg).unwrap();
        let gate = Arc::new(AtomicBool::new(false));

        let gated = |gate: &Arc<AtomicBool>| {
            let gate = Arc::clone(gate);
            move || {
                while !gate.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(2));
                }
            }
        };

        // Tres encoladas detrás de la bloqueada: crece a 2 y ambos quedan ocupados
        pool.execute(gated(&gate)).unwrap();
        pool.execute(|| {}).unwrap();
        pool.execute(|| {}).unwrap();
        pool.execute(gated(&gate)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || pool.worker_count() == 2));
        assert!(wait_until(Duration::from_secs(2), || pool.queued() == 0));

        // Cola vacía: el ciclo pide un retiro que nadie puede consumir
        thread::sleep(Duration::from_millis(80));
        assert_eq!(pool.worker_count(), 2);

        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(150));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        let mut peak = pool.worker_count();
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(150) {
            peak = peak.max(pool.worker_count());
            thread::sleep(Duration::from_millis(2));
        }
        gate.store(true, Ordering::SeqCst);
        while done.load(Ordering::SeqCst) < 5 && start.elapsed() < Duration::from_secs(5) {
            peak = peak.max(pool.worker_count());
            thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert!(peak <= 2, "ceiling exceeded (peak = {})", peak);
    }
}

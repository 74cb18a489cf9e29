//! # Scheduler de Timers
//! src/timer/mod.rs
//!
//! Min-heap de callbacks ordenados por deadline absoluto. Un thread
//! dedicado duerme hasta el próximo deadline y entrega los callbacks
//! vencidos a un `Executor` (normalmente el `WorkerPool`), así un callback
//! lento nunca frena al resto de los timers.
//!
//! ## Cancelación
//!
//! `remove_timer` deja una marca (tombstone) que se revisa al sacar la
//! entrada del heap. Un timer repetitivo se re-arma bajo el mismo lock en
//! que se saca, por lo que siempre se puede cancelar entre disparos. Un
//! callback que ya fue entregado al executor no se puede detener.

use crate::error::{Result, ServerError};
use crate::workers::Executor;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Identificador de un timer, sirve para cancelarlo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

struct TimerEntry {
    id: TimerId,
    callback: Callback,
    deadline: Instant,
    interval: Duration,
    repeating: bool,
}

// Min-heap: el deadline más cercano queda arriba
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Invertido para que BinaryHeap nos dé el menor
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

struct TimerState {
    heap: BinaryHeap<TimerEntry>,
    cancelled: HashSet<TimerId>,
    running: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
    next_id: AtomicU64,
    executor: Arc<dyn Executor>,
}

/// Scheduler de timers basado en un min-heap
pub struct TimerScheduler {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
    /// Crea el scheduler y arranca su thread
    pub fn new(executor: Arc<dyn Executor>) -> Result<Self> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                cancelled: HashSet::new(),
                running: true,
            }),
            condvar: Condvar::new(),
            next_id: AtomicU64::new(1),
            executor,
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("timer".to_string())
            .spawn(move || scheduler_loop(thread_shared))
            .map_err(ServerError::Spawn)?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Programa `callback` para correr no antes de `now + delay`.
    ///
    /// Si `repeat` es true, vuelve a dispararse cada `delay` contado desde
    /// el disparo anterior.
    pub fn add_timer<F>(&self, callback: F, delay: Duration, repeat: bool) -> Result<TimerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if repeat && delay.is_zero() {
            return Err(ServerError::InvalidInterval);
        }

        let deadline = Instant::now()
            .checked_add(delay)
            .ok_or(ServerError::DelayOutOfRange(delay))?;

        let id = TimerId(self.shared.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        let entry = TimerEntry {
            id,
            callback: Arc::new(callback),
            deadline,
            interval: delay,
            repeating: repeat,
        };

        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(ServerError::SchedulerStopped);
        }
        state.heap.push(entry);
        drop(state);

        // El nuevo timer puede vencer antes que la raíz actual
        self.shared.condvar.notify_one();
        debug!(timer_id = id.0, delay_ms = delay.as_millis() as u64, repeat, "Timer added");
        Ok(id)
    }

    /// Cancela un timer pendiente.
    ///
    /// Retorna `false` si el timer ya no está en el heap (ya disparó, ya
    /// fue cancelado o nunca existió).
    pub fn remove_timer(&self, id: TimerId) -> bool {
        let mut state = self.shared.state.lock();
        if state.cancelled.contains(&id) {
            return false;
        }
        let pending = state.heap.iter().any(|entry| entry.id == id);
        if pending {
            state.cancelled.insert(id);
            debug!(timer_id = id.0, "Timer cancelled");
        }
        pending
    }

    /// Timers pendientes (sin contar los cancelados)
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock();
        state.heap.len() - state.cancelled.len()
    }

    /// Detiene el scheduler: descarta los timers pendientes sin
    /// dispararlos y espera al thread de scheduling.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.running {
                info!(pending = state.heap.len(), "Stopping timer scheduler");
            }
            state.running = false;
            state.heap.clear();
            state.cancelled.clear();
        }
        self.shared.condvar.notify_all();

        if let Some(handle) = self.thread.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Loop del thread de scheduling
fn scheduler_loop(shared: Arc<TimerShared>) {
    let mut state = shared.state.lock();

    loop {
        if !state.running {
            break;
        }

        let deadline = match state.heap.peek() {
            Some(top) => top.deadline,
            None => {
                shared.condvar.wait(&mut state);
                continue;
            }
        };

        let now = Instant::now();
        if deadline > now {
            // Despierta al vencer o al llegar un timer nuevo
            shared.condvar.wait_until(&mut state, deadline);
            continue;
        }

        let Some(entry) = state.heap.pop() else {
            continue;
        };
        if state.cancelled.remove(&entry.id) {
            continue;
        }

        let callback = Arc::clone(&entry.callback);
        let id = entry.id;
        if entry.repeating {
            // La deriva se acumula desde el disparo real
            match now.checked_add(entry.interval) {
                Some(deadline) => state.heap.push(TimerEntry { deadline, ..entry }),
                None => warn!(timer_id = id.0, "Repeating timer dropped, next deadline out of range"),
            }
        }

        MutexGuard::unlocked(&mut state, || dispatch(&shared, id, callback));
    }

    debug!("Timer scheduler thread stopped");
}

fn dispatch(shared: &TimerShared, id: TimerId, callback: Callback) {
    if let Err(e) = shared.executor.execute(Box::new(move || callback())) {
        warn!(timer_id = id.0, error = %e, "Timer callback dropped");
    }
}

//! # Pool de Workers
//!
//! Cola acotada de tareas drenada por un conjunto elástico de threads.
//!
//! ## Arquitectura
//!
//! ```text
//! EventLoop / TimerScheduler → submit() → [cola acotada] → worker-N → tarea
//! ```
//!
//! - `submit`/`execute` nunca bloquean: encolan o fallan con `QueueFull`.
//! - Un thread de mantenimiento ajusta la cantidad de workers entre
//!   `min_workers` y `max_workers` según el largo de la cola.

pub mod pool;

pub use pool::{Executor, Task, TaskHandle, WorkerPool, WorkerPoolConfig, WorkerPoolStats};

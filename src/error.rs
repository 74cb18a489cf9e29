//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de errores compartida por los pools, el scheduler de timers
//! y el event loop. Casi todos son recuperables: solo fallar el bind del
//! socket de escucha detiene el proceso.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// La cola de tareas está llena (backpressure para quien hace submit)
    #[error("Task queue is full (max capacity: {0})")]
    QueueFull(usize),

    #[error("Worker pool is shutting down")]
    PoolShutdown,

    /// La tarea hizo panic; el worker sigue vivo
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Failed to create database connection: {0}")]
    ConnectionCreateFailed(String),

    /// Falló la prueba de vida de una conexión ociosa
    #[error("Database connection failed liveness probe")]
    ConnectionUnhealthy,

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Timer scheduler is stopped")]
    SchedulerStopped,

    #[error("Repeating timers need an interval greater than zero")]
    InvalidInterval,

    #[error("Timer delay {0:?} is out of range")]
    DelayOutOfRange(std::time::Duration),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

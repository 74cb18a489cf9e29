//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración completa por argumentos CLI o variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./webserver --port 8080 \
//!   --workers-min 4 \
//!   --workers-max 16 \
//!   --db-path ./data/webserver.db
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 WORKERS_MAX=32 LOG_FILE=./server.log ./webserver
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(name = "webserver")]
#[command(about = "Servidor HTTP con epoll, pool de workers elástico, timers y pool de conexiones")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Raíz de los archivos estáticos
    #[arg(long = "resource-dir", default_value = "./resource/web", env = "RESOURCE_DIR")]
    pub resource_dir: PathBuf,

    // === Workers ===
    /// Mínimo de workers vivos
    #[arg(long = "workers-min", default_value = "4", env = "WORKERS_MIN")]
    pub workers_min: usize,

    /// Máximo de workers vivos
    #[arg(long = "workers-max", default_value = "16", env = "WORKERS_MAX")]
    pub workers_max: usize,

    /// Capacidad de la cola de tareas
    #[arg(long = "queue-limit", default_value = "128", env = "QUEUE_LIMIT")]
    pub queue_limit: usize,

    /// Periodo del ajuste elástico de workers, en milisegundos
    #[arg(long = "adjust-interval-ms", default_value = "5000", env = "ADJUST_INTERVAL_MS")]
    pub adjust_interval_ms: u64,

    // === Base de datos ===
    /// Archivo SQLite
    #[arg(long = "db-path", default_value = "./data/webserver.db", env = "DB_PATH")]
    pub db_path: PathBuf,

    /// Conexiones creadas al arrancar
    #[arg(long = "db-init-size", default_value = "4", env = "DB_INIT_SIZE")]
    pub db_init_size: usize,

    /// Máximo de conexiones
    #[arg(long = "db-max-size", default_value = "10", env = "DB_MAX_SIZE")]
    pub db_max_size: usize,

    /// Segundos que una conexión puede quedar ociosa
    #[arg(long = "db-idle-timeout", default_value = "3600", env = "DB_IDLE_TIMEOUT")]
    pub db_idle_timeout: u64,

    /// Periodo del chequeo de salud, en milisegundos
    #[arg(long = "db-check-interval-ms", default_value = "1000", env = "DB_CHECK_INTERVAL_MS")]
    pub db_check_interval_ms: u64,

    // === Event loop ===
    /// Eventos de readiness por llamada a poll
    #[arg(long = "max-events", default_value = "1024", env = "MAX_EVENTS")]
    pub max_events: usize,

    /// Bytes que se leen de cada request
    #[arg(long = "read-buffer", default_value = "8192", env = "READ_BUFFER")]
    pub read_buffer: usize,

    /// Segundos entre logs de estadísticas (0 = desactivado)
    #[arg(long = "stats-interval", default_value = "60", env = "STATS_INTERVAL")]
    pub stats_interval: u64,

    // === Logging ===
    /// Nivel de log por defecto (RUST_LOG tiene prioridad)
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Archivo de log adicional
    #[arg(long = "log-file", env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Capacidad de la cola del archivo de log
    #[arg(long = "log-queue", default_value = "1024", env = "LOG_QUEUE")]
    pub log_queue: usize,
}

impl Config {
    /// Parsea argumentos CLI y variables de entorno
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección completa para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers_min == 0 {
            return Err("Minimum workers must be >= 1".to_string());
        }
        if self.workers_max < self.workers_min {
            return Err(format!(
                "Maximum workers ({}) must be >= minimum workers ({})",
                self.workers_max, self.workers_min
            ));
        }
        if self.queue_limit == 0 {
            return Err("Queue limit must be >= 1".to_string());
        }
        if self.adjust_interval_ms == 0 {
            return Err("Adjust interval must be > 0".to_string());
        }

        if self.db_max_size == 0 {
            return Err("DB max size must be >= 1".to_string());
        }
        if self.db_init_size > self.db_max_size {
            return Err(format!(
                "DB init size ({}) must be <= DB max size ({})",
                self.db_init_size, self.db_max_size
            ));
        }
        if self.db_check_interval_ms == 0 {
            return Err("DB check interval must be > 0".to_string());
        }

        if self.max_events == 0 {
            return Err("Max events must be >= 1".to_string());
        }
        if self.read_buffer == 0 {
            return Err("Read buffer must be >= 1".to_string());
        }
        if self.log_queue == 0 {
            return Err("Log queue must be >= 1".to_string());
        }

        Ok(())
    }

    /// Resumen de la configuración en el log
    pub fn log_summary(&self) {
        info!(address = %self.address(), resources = %self.resource_dir.display(), "Network");
        info!(
            min = self.workers_min,
            max = self.workers_max,
            queue = self.queue_limit,
            adjust_ms = self.adjust_interval_ms,
            "Worker pool"
        );
        info!(
            path = %self.db_path.display(),
            init = self.db_init_size,
            max = self.db_max_size,
            idle_timeout_s = self.db_idle_timeout,
            check_ms = self.db_check_interval_ms,
            "Connection pool"
        );
        info!(
            max_events = self.max_events,
            read_buffer = self.read_buffer,
            stats_interval_s = self.stats_interval,
            "Event loop"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            resource_dir: PathBuf::from("./resource/web"),
            workers_min: 4,
            workers_max: 16,
            queue_limit: 128,
            adjust_interval_ms: 5_000,
            db_path: PathBuf::from("./data/webserver.db"),
            db_init_size: 4,
            db_max_size: 10,
            db_idle_timeout: 3_600,
            db_check_interval_ms: 1_000,
            max_events: 1024,
            read_buffer: 8192,
            stats_interval: 60,
            log_level: "info".to_string(),
            log_file: None,
            log_queue: 1024,
        }
    }
}

//! # webserver
//! src/lib.rs
//!
//! Servidor HTTP construido sobre cuatro piezas de concurrencia:
//!
//! - `server`: event loop de readiness (mio/epoll) que acepta conexiones
//!   y despacha una tarea por evento
//! - `workers`: pool de threads con cola acotada y tamaño elástico
//! - `timer`: scheduler de callbacks sobre un min-heap
//! - `db`: pool de conexiones con chequeo de salud y recorte
//!
//! Alrededor de ellas: `http` (parsing y respuestas), `router`,
//! `commands` (handlers), `config`, `logging` y `error`.
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use webserver::config::Config;
//! use webserver::server::Server;
//!
//! let config = Config::default();
//! let server = Server::new(&config).unwrap();
//! server.run().unwrap();
//! ```

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod logging;
pub mod router;
pub mod server;
pub mod timer;
pub mod workers;

pub use error::{Result, ServerError};

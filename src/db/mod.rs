//! # Base de Datos
//! src/db/mod.rs
//!
//! - `manager`: cómo se crea y se prueba una conexión (`ManageConnection`)
//! - `pool`: pool acotado de conexiones con chequeo de salud periódico
//! - `users`: registro y login de usuarios sobre el pool

pub mod manager;
pub mod pool;
pub mod users;

pub use manager::{ManageConnection, SqliteManager};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use users::UserManager;

//! # Manager de Conexiones
//! src/db/manager.rs
//!
//! El pool no sabe hablar con ningún motor en particular: delega en un
//! `ManageConnection` la creación de conexiones y la prueba de vida.

use crate::error::{Result, ServerError};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fábrica de conexiones usada por `ConnectionPool`
pub trait ManageConnection: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Abre una conexión nueva
    fn connect(&self) -> Result<Self::Connection>;

    /// Prueba de vida barata. Un error significa que la conexión se
    /// descarta.
    fn check(&self, conn: &mut Self::Connection) -> Result<()>;
}

/// Conexiones SQLite sobre un archivo
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManageConnection for SqliteManager {
    type Connection = Connection;

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| ServerError::ConnectionCreateFailed(format!("{}: {}", self.path.display(), e)))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| ServerError::ConnectionCreateFailed(e.to_string()))?;
        Ok(conn)
    }

    fn check(&self, conn: &mut Connection) -> Result<()> {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|_| ServerError::ConnectionUnhealthy)
    }
}

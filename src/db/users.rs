//! # Gestión de Usuarios
//! src/db/users.rs
//!
//! Registro y login sobre el pool de conexiones. Las contraseñas se
//! guardan como hash SHA256 en hexadecimal.

use crate::db::manager::SqliteManager;
use crate::db::pool::ConnectionPool;
use crate::error::{Result, ServerError};
use regex::Regex;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

const USERNAME_PATTERN: &str = r"^[A-Za-z0-9_]{3,32}$";

pub struct UserManager {
    pool: Arc<ConnectionPool<SqliteManager>>,
    username_re: Regex,
}

impl UserManager {
    pub fn new(pool: Arc<ConnectionPool<SqliteManager>>) -> Result<Self> {
        let username_re =
            Regex::new(USERNAME_PATTERN).map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self { pool, username_re })
    }

    /// Crea la tabla de usuarios si no existe
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.acquire()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;
        Ok(())
    }

    pub fn is_valid_username(&self, username: &str) -> bool {
        self.username_re.is_match(username)
    }

    /// Registra un usuario nuevo.
    ///
    /// Retorna `Ok(false)` si el nombre ya existe o no es válido.
    pub fn register(&self, username: &str, password: &str) -> Result<bool> {
        if !self.is_valid_username(username) {
            warn!(username, "Rejected invalid username");
            return Ok(false);
        }

        let conn = self.pool.acquire()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, hash_password(password)],
        )?;

        if inserted == 1 {
            info!(username, "User registered");
            Ok(true)
        } else {
            warn!(username, "Username already exists");
            Ok(false)
        }
    }

    /// Verifica usuario y contraseña
    pub fn login(&self, username: &str, password: &str) -> Result<bool> {
        let conn = self.pool.acquire()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        let valid = stored.is_some_and(|hash| hash == hash_password(password));
        if valid {
            info!(username, "Login succeeded");
        } else {
            warn!(username, "Login failed");
        }
        Ok(valid)
    }
}

fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    format!("{:x}", digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolConfig;
    use std::path::PathBuf;
    use std::time::Duration;

    fn temp_db(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("webserver-users-{}-{}.db", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn users(path: &PathBuf) -> UserManager {
        let pool = ConnectionPool::new(
            SqliteManager::new(path),
            PoolConfig {
                init_size: 1,
                max_size: 2,
                idle_timeout: Duration::from_secs(3600),
                check_interval: Duration::from_secs(3600),
            },
        )
        .unwrap();
        let users = UserManager::new(Arc::new(pool)).unwrap();
        users.ensure_schema().unwrap();
        users
    }

    #[test]
    fn test_hash_password_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_register_then_login() {
        let path = temp_db("login");
        let users = users(&path);

        assert!(users.register("alice", "secret").unwrap());
        assert!(users.login("alice", "secret").unwrap());
        assert!(!users.login("alice", "wrong").unwrap());
        assert!(!users.login("bob", "secret").unwrap());

        drop(users);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_duplicate_register() {
        let path = temp_db("dup");
        let users = users(&path);

        assert!(users.register("carol", "one").unwrap());
        assert!(!users.register("carol", "two").unwrap());
        // La contraseña original se mantiene
        assert!(users.login("carol", "one").unwrap());

        drop(users);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_username_validation() {
        let path = temp_db("valid");
        let users = users(&path);

        assert!(users.is_valid_username("user_42"));
        assert!(!users.is_valid_username("ab"));
        assert!(!users.is_valid_username("bad name"));
        assert!(!users.is_valid_username("x'; DROP TABLE users; --"));
        assert!(!users.register("ab", "pw").unwrap());

        drop(users);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_password_not_stored_in_clear() {
        let path = temp_db("clear");
        let users = users(&path);
        users.register("dave", "hunter2").unwrap();

        let conn = users.pool.acquire().unwrap();
        let stored: String = conn
            .query_row("SELECT password_hash FROM users WHERE username = 'dave'", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, "hunter2");
        assert_eq!(stored.len(), 64);

        drop(conn);
        drop(users);
        let _ = std::fs::remove_file(&path);
    }
}

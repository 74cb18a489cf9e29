//! # Comandos de Usuarios
//! src/commands/users.rs
//!
//! - POST /register: alta de usuario
//! - POST /login: verificación de credenciales
//!
//! Ambos leen `username` y `password` de un body
//! `application/x-www-form-urlencoded`.

use crate::db::UserManager;
use crate::error::ServerError;
use crate::http::{Request, Response, StatusCode};
use tracing::error;

struct Credentials {
    username: String,
    password: String,
}

fn credentials(req: &Request) -> Result<Credentials, Response> {
    match (req.form_param("username"), req.form_param("password")) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Ok(Credentials { username, password })
        }
        _ => Err(Response::text(
            StatusCode::BadRequest,
            "Missing username or password",
        )),
    }
}

/// Traduce un error de base de datos a una respuesta
fn database_error(e: ServerError) -> Response {
    match e {
        ServerError::PoolClosed | ServerError::ConnectionCreateFailed(_) => {
            error!(error = %e, "Database unavailable");
            Response::text(StatusCode::ServiceUnavailable, "Database unavailable")
        }
        other => {
            error!(error = %other, "Database error");
            Response::text(StatusCode::InternalServerError, "Internal Server Error")
        }
    }
}

/// Handler para POST /register
///
/// | Resultado              | Status |
/// |------------------------|--------|
/// | Registrado             | 200    |
/// | Campos faltantes       | 400    |
/// | Nombre inválido        | 400    |
/// | Usuario ya existe      | 409    |
/// | Base no disponible     | 503    |
pub fn register_handler(users: &UserManager, req: &Request) -> Response {
    let creds = match credentials(req) {
        Ok(creds) => creds,
        Err(response) => return response,
    };

    if !users.is_valid_username(&creds.username) {
        return Response::text(
            StatusCode::BadRequest,
            "Invalid username: use 3-32 letters, digits or underscores",
        );
    }

    match users.register(&creds.username, &creds.password) {
        Ok(true) => Response::text(StatusCode::Ok, "Registration successful"),
        Ok(false) => Response::text(StatusCode::Conflict, "Username already exists"),
        Err(e) => database_error(e),
    }
}

/// Handler para POST /login
pub fn login_handler(users: &UserManager, req: &Request) -> Response {
    let creds = match credentials(req) {
        Ok(creds) => creds,
        Err(response) => return response,
    };

    match users.login(&creds.username, &creds.password) {
        Ok(true) => Response::text(StatusCode::Ok, "Login successful"),
        Ok(false) => Response::text(StatusCode::Unauthorized, "Invalid username or password"),
        Err(e) => database_error(e),
    }
}

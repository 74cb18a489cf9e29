//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea (método, path) a handlers.
//!
//! ```text
//! Request → Router → Handler → Response
//!                 ↘ (GET sin ruta) archivo en resource_dir
//!                 ↘ 404 Path Not Found
//! ```

use crate::http::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Un handler recibe un Request y retorna una Response
pub type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync + 'static>;

pub struct Router {
    routes: HashMap<(Method, String), Handler>,
    resource_dir: Option<PathBuf>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            resource_dir: None,
        }
    }

    /// Directorio raíz para el fallback de archivos estáticos
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    /// Registra un handler. Una ruta repetida reemplaza a la anterior.
    ///
    /// ```
    /// use webserver::router::Router;
    /// use webserver::http::{Method, Response, StatusCode};
    ///
    /// let mut router = Router::new();
    /// router.register(Method::GET, "/hello", |_req| Response::text(StatusCode::Ok, "hi"));
    /// ```
    pub fn register<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        info!(method = %method, path, "Route registered");
        self.routes.insert((method, path.to_string()), Box::new(handler));
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resuelve un request. Siempre produce una respuesta.
    pub fn route(&self, request: &Request) -> Response {
        let key = (request.method(), request.path().to_string());

        let mut response = match self.routes.get(&key) {
            Some(handler) => handler(request),
            None => self.fallback(request),
        };
        add_common_headers(&mut response);
        response
    }

    fn fallback(&self, request: &Request) -> Response {
        if request.method() == Method::GET {
            if let Some(response) = self.static_file(request.path()) {
                return response;
            }
        }
        Response::text(StatusCode::NotFound, "Path Not Found")
    }

    fn static_file(&self, request_path: &str) -> Option<Response> {
        let root = self.resource_dir.as_ref()?;
        let relative = sanitize_path(request_path)?;
        let path = root.join(relative);

        match std::fs::read(&path) {
            Ok(content) => {
                debug!(path = %path.display(), bytes = content.len(), "Serving static file");
                Some(
                    Response::new(StatusCode::Ok)
                        .with_header("Content-Type", content_type(&path))
                        .with_body_bytes(content),
                )
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Static file not available");
                None
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Headers que llevan todas las respuestas
fn add_common_headers(response: &mut Response) {
    response.add_header("Server", "webserver/0.1");
    response.add_header("Connection", "close");
}

/// Convierte el path del request en un path relativo seguro.
///
/// `/` se sirve como `index.html`. Cualquier `..` o componente raro lo
/// rechaza.
fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Some(PathBuf::from("index.html"));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

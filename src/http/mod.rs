//! # Módulo HTTP
//!
//! Parsing de requests y construcción de respuestas, a mano y sin
//! librerías de alto nivel. Alcanza para el modelo del servidor: un
//! request por conexión, respuesta y cierre.
//!
//! - Sin chunked transfer encoding
//! - Sin conexiones persistentes (`Connection: close` siempre)

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;

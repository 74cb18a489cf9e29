//! # Parsing de Requests HTTP
//! src/http/request.rs
//!
//! Parser de un único request HTTP/1.0 o HTTP/1.1 leído de una vez del
//! socket.
//!
//! ```text
//! POST /login HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! \r\n
//! username=alice&password=secret
//! ```
//!
//! Los nombres de header se guardan en minúsculas. Query string y body
//! de formulario se decodifican con percent-decoding (`+` es espacio).

use std::collections::HashMap;
use thiserror::Error;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
}

impl Method {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty request")]
    EmptyRequest,

    #[error("Request head is not valid UTF-8")]
    InvalidEncoding,

    #[error("Invalid request line format")]
    InvalidRequestLine,

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query_params: HashMap<String, String>,
    headers: HashMap<String, String>,
    version: String,
    body: Vec<u8>,
}

impl Request {
    /// Parsea un request desde los bytes leídos del socket.
    ///
    /// Si no aparece la línea vacía que cierra los headers, se toma todo
    /// el buffer como cabecera y el body queda vacío.
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::EmptyRequest);
        }

        let (head, body) = match find_subsequence(buffer, b"\r\n\r\n") {
            Some(pos) => (&buffer[..pos], &buffer[pos + 4..]),
            None => (buffer, &buffer[buffer.len()..]),
        };
        let head = std::str::from_utf8(head).map_err(|_| ParseError::InvalidEncoding)?;

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
        let (method, target, version) = parse_request_line(request_line)?;
        let headers = parse_headers(lines)?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        // Respetamos Content-Length si vino y es menor a lo leído
        let body_len = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .map_or(body.len(), |len| len.min(body.len()));

        Ok(Request {
            method,
            path: percent_decode(path, false),
            query_params: parse_urlencoded(query),
            headers,
            version: version.to_string(),
            body: body[..body_len].to_vec(),
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Busca un header sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Campos de un body `application/x-www-form-urlencoded`
    pub fn form(&self) -> HashMap<String, String> {
        match std::str::from_utf8(&self.body) {
            Ok(body) => parse_urlencoded(body.trim_end_matches(['\r', '\n'])),
            Err(_) => HashMap::new(),
        }
    }

    /// Un campo del formulario; si no está en el body se busca en la query
    pub fn form_param(&self, name: &str) -> Option<String> {
        self.form()
            .remove(name)
            .or_else(|| self.query_param(name).map(str::to_string))
    }
}

fn parse_request_line(line: &str) -> Result<(Method, &str, &str), ParseError> {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    let method = Method::parse(method)?;
    if !target.starts_with('/') {
        return Err(ParseError::InvalidRequestLine);
    }
    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(ParseError::InvalidHttpVersion(version.to_string()));
    }
    Ok((method, target, version))
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<HashMap<String, String>, ParseError> {
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::InvalidHeader(line.to_string()));
        }
        headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(headers)
}

fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key, true), percent_decode(value, true)),
            None => (percent_decode(pair, true), String::new()),
        })
        .collect()
}

/// Decodifica `%XX`. Una secuencia inválida se deja tal cual.
fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

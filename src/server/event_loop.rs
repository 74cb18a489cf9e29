//! # Event Loop
//! src/server/event_loop.rs
//!
//! Loop de readiness sobre `mio` (epoll en Linux).
//!
//! ```text
//! poll() ──► LISTENER   ──► accept() hasta WouldBlock, registrar READABLE
//!        └─► Token(n)   ──► sacar el socket del registro ──► WorkerPool
//!                                                             │
//!                              handle_connection: read ─► parse ─► route ─► write ─► close
//! ```
//!
//! Los sockets se registran edge-triggered: un evento por transición a
//! readable. Mientras una tarea trabaja sobre un socket, este no está
//! registrado, así que nunca hay dos tareas sobre la misma conexión.

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::http::{Request, Response, StatusCode};
use crate::router::Router;
use crate::workers::Executor;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Registry, Token};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const LISTENER: Token = Token(0);

/// Tiempo máximo escribiendo una respuesta a un peer lento
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Eventos por llamada a poll
    pub max_events: usize,
    /// Bytes leídos por request
    pub read_buffer: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            max_events: 1024,
            read_buffer: 8192,
        }
    }
}

impl EventLoopConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_events: config.max_events,
            read_buffer: config.read_buffer,
        }
    }
}

/// Sockets registrados, compartidos con las tareas que los re-registran
struct Connections {
    registry: Registry,
    peers: Mutex<HashMap<Token, TcpStream>>,
}

impl Connections {
    /// Guarda el socket y lo registra para lectura
    fn park(&self, token: Token, stream: TcpStream) {
        let mut peers = self.peers.lock();
        let stream = peers.entry(token).or_insert(stream);
        if let Err(e) = self.registry.register(stream, token, Interest::READABLE) {
            warn!(token = token.0, error = %e, "Failed to register connection");
            peers.remove(&token);
        }
    }

    /// Saca el socket del registro para entregárselo a una tarea
    fn take(&self, token: Token) -> Option<TcpStream> {
        let mut stream = self.peers.lock().remove(&token)?;
        if let Err(e) = self.registry.deregister(&mut stream) {
            debug!(token = token.0, error = %e, "Deregister failed");
        }
        Some(stream)
    }
}

pub struct EventLoop {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    config: EventLoopConfig,
    executor: Arc<dyn Executor>,
    router: Arc<Router>,
    connections: Arc<Connections>,
    next_token: usize,
}

impl EventLoop {
    /// Abre el socket de escucha. Es el único error fatal del servidor.
    pub fn bind(
        addr: &str,
        config: EventLoopConfig,
        executor: Arc<dyn Executor>,
        router: Arc<Router>,
    ) -> Result<Self> {
        let bind_error = |source: io::Error| ServerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| bind_error(io::Error::new(io::ErrorKind::InvalidInput, "no address resolved")))?;

        let mut listener = TcpListener::bind(socket_addr).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let registry = poll.registry().try_clone()?;

        Ok(Self {
            poll,
            listener,
            local_addr,
            config,
            executor,
            router,
            connections: Arc::new(Connections {
                registry,
                peers: Mutex::new(HashMap::new()),
            }),
            next_token: LISTENER.0 + 1,
        })
    }

    /// Dirección real de escucha (útil con puerto 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Corre el loop de aceptación y despacho. No retorna salvo que
    /// `poll` falle.
    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(self.config.max_events);
        info!(address = %self.local_addr, "Event loop listening");

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Socket(e));
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_all(),
                    token => self.dispatch(token),
                }
            }
        }
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    debug!(%peer, token = token.0, "Accepted connection");
                    self.connections.park(token, stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Ej: EMFILE. El listener sigue vivo.
                    warn!(error = %e, "Accept failed");
                    break;
                }
            }
        }
    }

    fn dispatch(&self, token: Token) {
        let Some(stream) = self.connections.take(token) else {
            return;
        };

        let connections = Arc::clone(&self.connections);
        let router = Arc::clone(&self.router);
        let read_buffer = self.config.read_buffer;
        let task = Box::new(move || handle_connection(stream, token, &connections, &router, read_buffer));

        if let Err(e) = self.executor.execute(task) {
            // La tarea se descarta junto con el socket
            warn!(token = token.0, error = %e, "Dropping connection");
        }
    }
}

/// Tarea por evento: una lectura, una respuesta, cierre.
fn handle_connection(
    mut stream: TcpStream,
    token: Token,
    connections: &Connections,
    router: &Router,
    read_buffer: usize,
) {
    let mut buffer = vec![0u8; read_buffer];

    let n = loop {
        match stream.read(&mut buffer) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                // Evento espurio: volver a esperar datos
                connections.park(token, stream);
                return;
            }
            Err(e) => {
                debug!(token = token.0, error = %e, "Read failed");
                return;
            }
        }
    };

    if n == 0 {
        debug!(token = token.0, "Peer closed connection");
        return;
    }

    let mut response = respond(&buffer[..n], router);
    let worker = thread::current();
    response.add_header("X-Worker-Thread", worker.name().unwrap_or("unnamed"));

    if let Err(e) = write_response(&mut stream, &response.to_bytes()) {
        warn!(token = token.0, error = %e, "Failed to write response");
    }
    let _ = stream.shutdown(std::net::Shutdown::Both);
}

/// Parsea y enruta. Un request inválido se responde con 400.
pub fn respond(raw: &[u8], router: &Router) -> Response {
    let start = Instant::now();
    match Request::parse(raw) {
        Ok(request) => {
            let response = router.route(&request);
            info!(
                method = %request.method(),
                path = request.path(),
                status = response.status().as_u16(),
                elapsed_us = start.elapsed().as_micros() as u64,
                "Request handled"
            );
            response
        }
        Err(e) => {
            debug!(error = %e, "Malformed request");
            Response::text(StatusCode::BadRequest, &format!("Invalid: {}", e))
                .with_header("Connection", "close")
        }
    }
}

/// `write_all` sobre un socket no bloqueante, con límite de tiempo
fn write_response<W: Write>(stream: &mut W, mut bytes: &[u8]) -> io::Result<()> {
    let deadline = Instant::now() + WRITE_TIMEOUT;
    while !bytes.is_empty() {
        match stream.write(bytes) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::ErrorKind::TimedOut.into());
                }
                thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    stream.flush()
}

//! # Logging
//! src/logging.rs
//!
//! Inicializa `tracing` con un filtro por nivel y, opcionalmente, un
//! archivo de log escrito por un thread aparte.
//!
//! El archivo se alimenta por una cola acotada: si se llena, la línea se
//! descarta y se cuenta. Loguear nunca bloquea a quien llama.

use crate::error::{Result, ServerError};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

enum LogMessage {
    Line(Vec<u8>),
    Shutdown,
}

struct WriterShared {
    sender: SyncSender<LogMessage>,
    dropped: AtomicU64,
}

/// Sink de logs asíncrono y acotado
#[derive(Clone)]
pub struct AsyncLogWriter {
    shared: Arc<WriterShared>,
}

impl AsyncLogWriter {
    fn from_sender(sender: SyncSender<LogMessage>) -> Self {
        Self {
            shared: Arc::new(WriterShared {
                sender,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Abre `path` en modo append y arranca el thread escritor
    pub fn spawn(path: &Path, capacity: usize) -> Result<(Self, LogGuard)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ServerError::Config(format!("cannot open log file {}: {}", path.display(), e)))?;

        let (sender, receiver) = mpsc::sync_channel(capacity);
        let handle = thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || writer_loop(receiver, BufWriter::new(file)))
            .map_err(ServerError::Spawn)?;

        let writer = Self::from_sender(sender);
        let guard = LogGuard {
            writer: Some(writer.clone()),
            handle: Some(handle),
        };
        Ok((writer, guard))
    }

    /// Líneas descartadas por cola llena o escritor caído
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Write for AsyncLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.shared.sender.try_send(LogMessage::Line(buf.to_vec())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for AsyncLogWriter {
    type Writer = AsyncLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn writer_loop<W: Write>(receiver: Receiver<LogMessage>, mut out: W) {
    while let Ok(message) = receiver.recv() {
        match message {
            LogMessage::Line(line) => {
                if out.write_all(&line).is_err() {
                    continue;
                }
                let _ = out.flush();
            }
            LogMessage::Shutdown => break,
        }
    }
    let _ = out.flush();
}

/// Mantiene vivo el thread escritor. Al soltarse, vacía la cola y lo espera.
pub struct LogGuard {
    writer: Option<AsyncLogWriter>,
    handle: Option<JoinHandle<()>>,
}

impl LogGuard {
    fn none() -> Self {
        Self {
            writer: None,
            handle: None,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.writer.as_ref().map_or(0, AsyncLogWriter::dropped)
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            // Bloqueante a propósito: las líneas encoladas van antes
            let _ = writer.shared.sender.send(LogMessage::Shutdown);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Instala el subscriber global.
///
/// `RUST_LOG` tiene prioridad sobre `level`.
pub fn init(level: &str, file: Option<&Path>, queue: usize) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match file {
        Some(path) => {
            let (writer, guard) = AsyncLogWriter::spawn(path, queue)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer);
            (Some(layer), guard)
        }
        None => (None, LogGuard::none()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| ServerError::Config(format!("logging already initialized: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_lines_reach_file() {
        let path = std::env::temp_dir().join(format!("webserver-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let (mut writer, guard) = AsyncLogWriter::spawn(&path, 16).unwrap();
        writer.write_all(b"first line\n").unwrap();
        writer.write_all(b"second line\n").unwrap();
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first line\nsecond line\n");
        assert_eq!(writer.dropped(), 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (sender, _receiver) = mpsc::sync_channel(1);
        let mut writer = AsyncLogWriter::from_sender(sender);

        let start = Instant::now();
        for _ in 0..5 {
            writer.write_all(b"line\n").unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(writer.dropped(), 4);
    }

    #[test]
    fn test_disconnected_writer_drops() {
        let (sender, receiver) = mpsc::sync_channel(4);
        drop(receiver);
        let mut writer = AsyncLogWriter::from_sender(sender);

        assert!(writer.write_all(b"lost\n").is_ok());
        assert_eq!(writer.dropped(), 1);
    }
}

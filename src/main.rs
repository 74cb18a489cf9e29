//! # webserver - Entry Point
//! src/main.rs

use anyhow::{bail, Context};
use tracing::{error, info};
use webserver::config::Config;
use webserver::logging;
use webserver::server::Server;

fn main() -> anyhow::Result<()> {
    let config = Config::new();
    if let Err(e) = config.validate() {
        bail!("Invalid configuration: {}", e);
    }

    let _log_guard = logging::init(&config.log_level, config.log_file.as_deref(), config.log_queue)
        .context("failed to initialize logging")?;

    info!("webserver {} starting", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let server = Server::new(&config).context("failed to start server")?;
    if let Err(e) = server.run() {
        error!(error = %e, "Event loop stopped");
        return Err(e.into());
    }
    Ok(())
}

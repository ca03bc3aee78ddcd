use tracing_subscriber::EnvFilter;

use crate::error::{ReconError, Result};

/// Installs the global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `verbosity` selects `warn` (0),
/// `info` (1), `debug` (2) or `trace` (3+) for this crate.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("table_recon={level}")))
        .map_err(|err| ReconError::Logging(err.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ReconError::Logging(err.to_string()))
}

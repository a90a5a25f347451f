//! Log output of the harness.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Events carry timestamps, the emitting
/// thread and their source location.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|err| anyhow!("invalid log filter {default_filter:?}: {err}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|err| anyhow!("failed to install the log subscriber: {err}"))
}

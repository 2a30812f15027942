//! Opt-in tracing subscriber bootstrap for binaries and tests.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "pairvote=info";

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human readable output.
    Compact,
    /// One JSON object per line.
    Json,
}

/// Installs a global subscriber filtered by `RUST_LOG`, falling back to
/// `pairvote=info` (or `pairvote=debug` when `verbose`).
///
/// Returns false when a global subscriber was already installed.
pub fn init_tracing(format: LogFormat, verbose: bool) -> bool {
    let fallback = if verbose { "pairvote=debug,info" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .compact(),
            )
            .try_init()
            .is_ok(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok(),
    }
}

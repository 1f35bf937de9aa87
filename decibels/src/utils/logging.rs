use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "decibels=info,decibels_lib=info,warn";

/// Initialize logging with tracing
///
/// - Reads the filter from `RUST_LOG` if set, else [`DEFAULT_FILTER`]
/// - Writes to stderr; stdout is reserved for level lines
///
/// Returns `false` if a global subscriber was already installed.
///
/// # Example
///
/// ```no_run
/// use decibels_lib::utils::logging::init_logging;
///
/// init_logging();
/// ```
pub fn init_logging() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Decibels logging initialized");
    }
    installed
}

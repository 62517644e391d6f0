//! Tracing subscriber for the CLI: `RUST_LOG` filter (default `info`) to stderr,
//! pretty by default, JSON lines when `POLCONNECT_LOG_JSON=1`.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_JSON_ENV: &str = "POLCONNECT_LOG_JSON";

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var(LOG_JSON_ENV)
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

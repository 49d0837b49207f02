//! # Structured Logging
//!
//! One `tracing` subscriber per process, configured from `log_format` and
//! `log_filter` in `config.toml`. `RUST_LOG`, when set, replaces the
//! configured filter entirely.
//!
//! Output goes to stderr; stdout is reserved for command output such as
//! `rebase-node status`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines with file and line numbers.
    Pretty,
    /// One JSON object per line, with the ledger fields (`holder`, `amount`,
    /// `rate`) as top-level keys.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects [`LogFormat::Json`]; anything else is
    /// [`LogFormat::Pretty`].
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Builds the filter: `RUST_LOG` if present and valid, else `fallback`.
fn build_filter(fallback: &str) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback).unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Installs the global subscriber.
///
/// `filter` uses `EnvFilter` directive syntax, for example
/// `rebase_protocol=debug,rebase_contracts=info,tower_http=debug`. A second
/// call in the same process is ignored with a warning.
pub fn init_logging(filter: &str, format: LogFormat) {
    let env_filter = build_filter(filter);
    let writer = std::io::stderr;

    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(writer)
                    .with_target(true),
            )
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::info!(?format, "logging initialized"),
        Err(e) => tracing::warn!(error = %e, "logging already initialized"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_lenient() {
        assert_eq!(LogFormat::from_str_lossy("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy(" json "), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("yaml"), LogFormat::Pretty);
    }

    #[test]
    fn bad_filter_falls_back() {
        // Directive syntax errors must not abort startup.
        let _ = build_filter("rebase_node=notalevel,,=");
    }
}

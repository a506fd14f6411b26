//! Tracing setup for binaries built on the skill runtime.
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is left to the binary, through [`init_tracing`].

#![warn(missing_docs, clippy::pedantic)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output style of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field lines with targets.
    #[default]
    Full,
    /// Terse single lines.
    Compact,
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive did not parse.
    #[error("invalid log filter `{directive}`: {reason}")]
    Filter {
        /// Directive that failed.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Builds the filter: `RUST_LOG` when set, otherwise `default_directive`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `default_directive` is needed and
/// does not parse.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env().or_else(|_| parse_filter(default_directive))
}

fn parse_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|err| TelemetryError::Filter {
        directive: directive.to_owned(),
        reason: err.to_string(),
    })
}

/// Installs a global fmt subscriber filtered by [`env_filter`].
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for a bad directive and
/// [`TelemetryError::AlreadyInstalled`] when called twice.
pub fn init_tracing(default_directive: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let registry = tracing_subscriber::registry().with(env_filter(default_directive)?);
    let installed = match format {
        LogFormat::Full => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    };
    installed.map_err(|err| TelemetryError::AlreadyInstalled(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_directives_are_reported() {
        assert!(parse_filter("info,skill_tools=debug").is_ok());
        assert!(matches!(
            parse_filter("skill_tools=loudest"),
            Err(TelemetryError::Filter { .. })
        ));
    }

    #[test]
    fn second_install_fails_cleanly() {
        init_tracing("warn", LogFormat::Compact).ok();
        assert!(matches!(
            init_tracing("warn", LogFormat::Full),
            Err(TelemetryError::AlreadyInstalled(_))
        ));
    }
}

//! Tracing subscriber setup.
//!
//! The library itself only emits `tracing` events and spans; binaries call
//! [`init_tracing`] once at startup to print them.

use crate::config::LogSettings;
use tracing_subscriber::EnvFilter;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalises a configured level, falling back to `info`.
#[must_use]
pub fn fallback_level(level: &str) -> &'static str {
    let level = level.trim().to_ascii_lowercase();
    LEVELS.into_iter().find(|l| *l == level).unwrap_or("info")
}

/// Builds the filter: `RUST_LOG` when set, the configured level otherwise.
#[must_use]
pub fn env_filter(settings: &LogSettings) -> EnvFilter {
    let fallback = fallback_level(&settings.level);
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global fmt subscriber.
///
/// Returns false when a subscriber was already installed, which makes
/// repeated calls harmless.
pub fn init_tracing(settings: &LogSettings) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings))
        .with_target(true);

    let installed = if settings.json {
        builder.json().with_current_span(true).try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %settings.level, json = settings.json, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_level() {
        assert_eq!(fallback_level("DEBUG"), "debug");
        assert_eq!(fallback_level(" warn "), "warn");
        assert_eq!(fallback_level("verbose"), "info");
    }

    #[test]
    fn test_init_is_idempotent() {
        let settings = LogSettings::default();
        let _ = init_tracing(&settings);
        assert!(!init_tracing(&settings));
    }
}

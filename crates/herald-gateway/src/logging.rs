//! Tracing subscriber setup.

use herald_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set and valid, else the configured
/// level, else `info`.
pub fn filter_for(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Initialize the global subscriber on stderr.
///
/// Call once at startup. Later calls are no-ops.
pub fn init(settings: &LoggingSettings) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(rust_log.as_deref(), &settings.level);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails only if a subscriber is already set
    let _ = if settings.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_used_without_rust_log() {
        let filter = filter_for(None, "debug");
        assert_eq!(filter.to_string(), EnvFilter::new("debug").to_string());
    }

    #[test]
    fn rust_log_wins_over_configured_level() {
        let filter = filter_for(Some("herald_server=trace"), "warn");
        assert_eq!(
            filter.to_string(),
            EnvFilter::new("herald_server=trace").to_string()
        );
    }

    #[test]
    fn invalid_directives_fall_back() {
        let filter = filter_for(Some("herald=loud"), "also=bogus");
        assert_eq!(filter.to_string(), EnvFilter::new("info").to_string());
    }

    #[test]
    fn init_does_not_panic_twice() {
        init(&LoggingSettings::default());
        init(&LoggingSettings {
            level: "debug".into(),
            json: true,
        });
    }
}

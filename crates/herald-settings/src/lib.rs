//! # herald-settings
//!
//! Configuration for the Herald gateway, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`GatewaySettings::default()`]
//! 2. **Settings file**: `~/.herald/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `SERVER_PORT`, `AUTH_API`, `RABBITMQ_*`,
//!    `HERALD_LOG_*` (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use herald_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, load_settings_with,
    settings_path,
};
pub use types::{AuthSettings, BrokerSettings, GatewaySettings, LoggingSettings, ServerSettings};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

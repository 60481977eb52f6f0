//! # safari-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SafariSettings::default()`]
//! 2. **User file**: `~/.safari/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SAFARI_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, resolve_path, safari_home, settings_path,
};
pub use types::*;

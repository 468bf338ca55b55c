//! TOML-based settings for the tracker.
//!
//! Settings are loaded from `~/.reflect/settings.toml` with environment
//! variable interpolation. Backend credentials fall back to the environment
//! through `get_with_env_fallback`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use reflect_lib::settings::{self, SettingsManager};
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//!
//! let url = settings::backend_url(&settings);
//! let key = settings::anon_key(&settings);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{
    anon_key, backend_url, config_dir, get_with_env_fallback, session_file, settings_path,
    SettingsManager,
};
pub use schema::TrackerSettings;

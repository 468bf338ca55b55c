//! Settings schema for the tracker.
//!
//! All settings structs use `#[serde(default)]` so partial files load; missing
//! fields take the defaults below.

use serde::{Deserialize, Serialize};

/// Root settings structure.
///
/// Loaded from `~/.reflect/settings.toml` with environment variable
/// interpolation. `version` leaves room for migrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Hosted backend connection
    pub backend: BackendSettings,

    /// Local session persistence
    pub session: SessionSettings,

    /// Output preferences
    pub ui: UiSettings,

    /// Advanced/debug settings
    pub advanced: AdvancedSettings,
}

/// Hosted backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Project URL (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Public anon key (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,

    /// Where the emailed sign-in link points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Session persistence between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Keep the session on disk so the next run starts signed in
    pub persist: bool,

    /// Session file; defaults to `~/.reflect/session.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Print events as JSON lines by default
    pub json_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Log level: "error" | "warn" | "info" | "debug" | "trace"
    pub log_level: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            backend: BackendSettings::default(),
            session: SessionSettings::default(),
            ui: UiSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            redirect_url: None,
            timeout_secs: hosted_backend::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = TrackerSettings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.backend.url, None);
        assert_eq!(settings.backend.timeout_secs, 30);
        assert!(settings.session.persist);
        assert!(!settings.ui.json_output);
        assert_eq!(settings.advanced.log_level, "warn");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            version = 1
            [backend]
            url = "https://abc.supabase.co"
        "#;

        let settings: TrackerSettings = toml::from_str(toml).unwrap();
        assert_eq!(settings.backend.url.as_deref(), Some("https://abc.supabase.co"));
        // Defaults fill in the rest
        assert_eq!(settings.backend.timeout_secs, 30);
        assert!(settings.session.persist);
    }

    #[test]
    fn test_serialize_settings() {
        let settings = TrackerSettings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("version = 1"));
        assert!(toml_str.contains("[backend]"));
        assert!(!toml_str.contains("anon_key"));
    }

    #[test]
    fn test_template_parses() {
        let settings: TrackerSettings = toml::from_str(include_str!("template.toml")).unwrap();
        assert_eq!(settings.backend.anon_key.as_deref(), Some("$SUPABASE_ANON_KEY"));
        assert_eq!(settings.backend.timeout_secs, 30);
    }
}

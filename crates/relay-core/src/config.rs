use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the objection relay.
///
/// Loaded from `relay.toml` by default, then overlaid with environment
/// variables (see [`RelayConfig::apply_env_overrides`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub zoom: ZoomConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Overlay settings from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay settings from `lookup`. Empty values count as unset.
    ///
    /// | Variable | Setting |
    /// |---|---|
    /// | `PORT` | `server.port` |
    /// | `HOST` | `server.host` |
    /// | `RELAY_LOG_LEVEL` | `general.log_level` |
    /// | `RELAY_PHRASES` | `dictionary.path` |
    /// | `ZOOM_CLIENT_ID` | `zoom.client_id` |
    /// | `ZOOM_CLIENT_SECRET` | `zoom.client_secret` |
    /// | `ZOOM_SECRET_TOKEN` | `zoom.secret_token` |
    /// | `ZOOM_VERIFICATION_TOKEN` | `zoom.verification_token` |
    /// | `ZOOM_REDIRECT_URI` | `zoom.redirect_uri` |
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring unparseable PORT"),
            }
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(level) = get("RELAY_LOG_LEVEL") {
            self.general.log_level = level;
        }
        if let Some(path) = get("RELAY_PHRASES") {
            self.dictionary.path = Some(path);
        }

        let zoom = &mut self.zoom;
        for (key, slot) in [
            ("ZOOM_CLIENT_ID", &mut zoom.client_id),
            ("ZOOM_CLIENT_SECRET", &mut zoom.client_secret),
            ("ZOOM_SECRET_TOKEN", &mut zoom.secret_token),
            ("ZOOM_VERIFICATION_TOKEN", &mut zoom.verification_token),
            ("ZOOM_REDIRECT_URI", &mut zoom.redirect_uri),
        ] {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Detection fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Per-viewer event buffer. A viewer that falls this far behind is dropped.
    pub observer_capacity: usize,
    /// SSE keep-alive interval in seconds.
    pub keepalive_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            observer_capacity: 64,
            keepalive_secs: 15,
        }
    }
}

/// Phrase dictionary source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// TOML file of `[[entries]]`. Unset means the builtin objections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Zoom app credentials and endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Compared against the `Authorization` header of webhook events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
    /// HMAC key for `endpoint.url_validation` challenges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    pub token_url: String,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            secret_token: None,
            verification_token: None,
            redirect_uri: None,
            token_url: "https://zoom.us/oauth/token".to_string(),
        }
    }
}

impl ZoomConfig {
    /// Client id and secret, when both are configured.
    pub fn oauth_credentials(&self) -> Option<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for ZoomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("ZoomConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("secret_token", &redact(&self.secret_token))
            .field("verification_token", &redact(&self.verification_token))
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.detector.observer_capacity, 64);
        assert_eq!(config.detector.keepalive_secs, 15);
        assert!(config.dictionary.path.is_none());
        assert!(config.zoom.secret_token.is_none());
        assert_eq!(config.zoom.token_url, "https://zoom.us/oauth/token");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "127.0.0.1"
port = 8080

[detector]
observer_capacity = 8

[dictionary]
path = "/etc/relay/phrases.toml"

[zoom]
client_id = "abc"
client_secret = "shh"
redirect_uri = "https://example.com/zoom_oauth_callback"
"#;
        let file = create_temp_config(content);
        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.detector.observer_capacity, 8);
        assert_eq!(config.detector.keepalive_secs, 15);
        assert_eq!(
            config.dictionary.path.as_deref(),
            Some("/etc/relay/phrases.toml")
        );
        assert_eq!(config.zoom.oauth_credentials(), Some(("abc", "shh")));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[server]\nport = 4000\n");
        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[server\nport = ");
        assert!(matches!(
            RelayConfig::load(file.path()),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("PORT", "8123"),
            ("HOST", "127.0.0.1"),
            ("RELAY_LOG_LEVEL", "trace"),
            ("RELAY_PHRASES", "phrases.toml"),
            ("ZOOM_CLIENT_ID", "id"),
            ("ZOOM_CLIENT_SECRET", "secret"),
            ("ZOOM_SECRET_TOKEN", "st"),
            ("ZOOM_VERIFICATION_TOKEN", "vt"),
            ("ZOOM_REDIRECT_URI", "https://example.com/cb"),
        ]);
        let mut config = RelayConfig::default();
        config.apply_env_overrides_from(|k| vars.get(k).cloned());

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.dictionary.path.as_deref(), Some("phrases.toml"));
        assert_eq!(config.zoom.oauth_credentials(), Some(("id", "secret")));
        assert_eq!(config.zoom.secret_token.as_deref(), Some("st"));
        assert_eq!(config.zoom.verification_token.as_deref(), Some("vt"));
        assert_eq!(
            config.zoom.redirect_uri.as_deref(),
            Some("https://example.com/cb")
        );
    }

    #[test]
    fn test_env_overrides_ignore_bad_and_empty_values() {
        let vars = env(&[("PORT", "not-a-port"), ("ZOOM_SECRET_TOKEN", "  ")]);
        let mut config = RelayConfig::default();
        config.zoom.secret_token = Some("from-file".to_string());
        config.apply_env_overrides_from(|k| vars.get(k).cloned());

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.zoom.secret_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_zoom_debug_redacts_secrets() {
        let mut zoom = ZoomConfig::default();
        zoom.client_secret = Some("super-secret".to_string());
        zoom.secret_token = Some("webhook-token".to_string());
        let debug = format!("{:?}", zoom);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("webhook-token"));
        assert!(debug.contains("<set>"));
    }

    #[test]
    fn test_oauth_credentials_need_both_halves() {
        let mut zoom = ZoomConfig::default();
        zoom.client_id = Some("id".to_string());
        assert!(zoom.oauth_credentials().is_none());
    }
}

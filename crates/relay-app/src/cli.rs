//! CLI argument definitions for the objection relay.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use relay_core::RelayConfig;

/// Relays sales-objection detections from live call transcripts to viewers.
#[derive(Parser, Debug)]
#[command(name = "objection-relay", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// HTTP server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// TOML file with the objection dictionary.
    #[arg(long = "phrases")]
    pub phrases: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RELAY_CONFIG env var > ./relay.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_from(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_from<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        match lookup("RELAY_CONFIG") {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => PathBuf::from("relay.toml"),
        }
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply_overrides(&self, config: &mut RelayConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref phrases) = self.phrases {
            config.dictionary.path = Some(phrases.to_string_lossy().to_string());
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("objection-relay").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_parse_all_flags() {
        let args = parse(&[
            "-c",
            "custom.toml",
            "--host",
            "127.0.0.1",
            "-p",
            "8080",
            "--phrases",
            "objections.toml",
            "-l",
            "debug",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.phrases, Some(PathBuf::from("objections.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_rejects_invalid_port() {
        let result = CliArgs::try_parse_from(["objection-relay", "--port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_path_priority() {
        let flag = parse(&["--config", "flag.toml"]);
        assert_eq!(
            flag.resolve_config_path_from(|_| Some("env.toml".to_string())),
            PathBuf::from("flag.toml")
        );

        let none = parse(&[]);
        assert_eq!(
            none.resolve_config_path_from(|_| Some("env.toml".to_string())),
            PathBuf::from("env.toml")
        );
        assert_eq!(none.resolve_config_path_from(|_| None), PathBuf::from("relay.toml"));
        assert_eq!(
            none.resolve_config_path_from(|_| Some(String::new())),
            PathBuf::from("relay.toml")
        );
    }

    #[test]
    fn test_overrides_only_given_flags() {
        let mut config = RelayConfig::default();
        config.server.host = "10.0.0.1".to_string();

        parse(&["--port", "9000", "--phrases", "p.toml"]).apply_overrides(&mut config);

        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.dictionary.path.as_deref(), Some("p.toml"));
        assert_eq!(config.general.log_level, "info");
    }
}

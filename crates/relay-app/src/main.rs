//! Objection relay binary - composition root.
//!
//! 1. Load `.env`, CLI flags and configuration
//! 2. Initialize tracing
//! 3. Build the phrase dictionary and detector
//! 4. Start the axum server

mod cli;

use std::path::Path;

use clap::Parser;

use relay_api::{start_server, AppState};
use relay_core::{Detector, PhraseDictionary, RelayConfig};

use cli::CliArgs;

fn load_dictionary(config: &RelayConfig) -> relay_core::Result<PhraseDictionary> {
    match config.dictionary.path {
        Some(ref path) => PhraseDictionary::load(Path::new(path)),
        None => Ok(PhraseDictionary::builtin()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal outside development.
    let dotenv = dotenvy::dotenv();

    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = if config_exists {
        RelayConfig::load(&config_file)?
    } else {
        RelayConfig::default()
    };
    config.apply_env_overrides();
    args.apply_overrides(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting objection relay v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
    }

    let dictionary = match load_dictionary(&config) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load phrase dictionary");
            return Err(e.into());
        }
    };
    tracing::info!(phrases = dictionary.len(), "Phrase dictionary ready");

    if config.zoom.verification_token.is_none() {
        tracing::warn!(
            "ZOOM_VERIFICATION_TOKEN not set; webhook URL validation will not be signed"
        );
    }
    if config.zoom.oauth_credentials().is_none() {
        tracing::warn!("Zoom OAuth credentials not set; /zoom_oauth_callback will be unavailable");
    }

    let detector = Detector::new(dictionary);
    let state = AppState::new(config, detector);

    start_server(state).await?;

    Ok(())
}

//! # Dora Service
//!
//! Binary entry point for the DORA metrics HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Wires the repository, parser selector and Shortcut story client
//! - Starts the HTTP server from dora-api

use anyhow::Context;
use dora_api::{start_server, AppState, LoggingConfig, ServiceConfig};
use dora_core::{webhook::ParserSelector, HttpStoryClient, InMemoryRepository, Repository};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_config();

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    info!("Starting Dora Service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    let selector = match build_selector(&service_config) {
        Ok(selector) => selector,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to set up the Shortcut integration; aborting");
            std::process::exit(3);
        }
    };

    let repository: Arc<dyn Repository> = if service_config.metrics.cache_results {
        Arc::new(InMemoryRepository::with_metrics_cache())
    } else {
        Arc::new(InMemoryRepository::new())
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    let state = AppState::new(service_config, repository, selector);
    if let Err(e) = start_server(state).await {
        error!("Failed to start server: {}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Load and validate the service configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. /etc/dora/service.yaml
///  2. ./config/service.yaml
///  3. The file named by `DORA_CONFIG_FILE`
///  4. Environment variables prefixed `DORA__`, e.g. `DORA__SERVER__PORT=9090`
///
/// Every field has a default, so a missing file is not an error. A malformed
/// file or an environment value of the wrong type is.
fn load_config() -> anyhow::Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/dora/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("DORA_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    let service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix("DORA").separator("__"))
        .build()
        .context("failed to read configuration sources")?
        .try_deserialize()
        .context("could not deserialize service configuration")?;

    service_config.validate()?;
    Ok(service_config)
}

/// `RUST_LOG` wins; otherwise the configured level applies to the service crates
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dora_service={level},dora_api={level},dora_core={level},tower_http=debug",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Parser selector with the Shortcut integration when it is configured
fn build_selector(config: &ServiceConfig) -> anyhow::Result<ParserSelector> {
    let Some(shortcut) = &config.shortcut else {
        info!("Shortcut integration not configured; Shortcut webhooks will be rejected");
        return Ok(ParserSelector::new());
    };

    let settings = Arc::new(shortcut.settings()?);
    let client = HttpStoryClient::new(
        settings.clone(),
        shortcut.api_base_url.clone(),
        shortcut.timeout(),
    )?;

    info!(
        repo = %settings.repo_name(),
        api_base_url = %shortcut.api_base_url,
        "Shortcut integration enabled"
    );

    Ok(ParserSelector::new().with_shortcut(settings, Arc::new(client)))
}

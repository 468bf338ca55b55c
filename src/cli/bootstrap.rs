//! CLI bootstrap - wire settings, the hosted backend and the tracker.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hosted_backend::{BackendConfig, Client};

use crate::backend::{HostedIdentity, HostedStore};
use crate::runtime::{CliRuntime, RuntimeEvent, TrackerRuntime};
use crate::settings::{self, SettingsManager, TrackerSettings};
use crate::state::Tracker;

use super::args::Args;

/// Context for CLI execution containing all initialized services.
pub struct CliContext {
    /// Runtime abstraction for event emission
    pub runtime: Arc<dyn TrackerRuntime>,

    pub tracker: Arc<Tracker>,

    /// Settings manager
    pub settings_manager: Arc<SettingsManager>,

    /// Command-line arguments (with settings defaults applied)
    pub args: Args,

    auth_listener: JoinHandle<()>,
}

impl CliContext {
    /// Graceful shutdown - stop the auth listener and close the runtime.
    pub async fn shutdown(self) -> Result<()> {
        self.auth_listener.abort();

        if let Err(e) = self.runtime.shutdown().await {
            tracing::warn!("Runtime shutdown error: {}", e);
        }

        Ok(())
    }
}

/// Initialize the CLI context: settings, logging, backend client, tracker.
///
/// A stored session is picked up and its data loaded before returning.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    // Install TLS provider (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        // Only warn on errors other than file not found
        if !e.not_found() {
            eprintln!("[cli] Failed to load .env file: {}", e);
        }
    }

    let settings_manager = Arc::new(
        SettingsManager::new()
            .await
            .context("Failed to initialize settings manager")?,
    );
    let settings = settings_manager.get().await;

    init_logging(args, &settings)?;

    // Ensure settings file exists (creates template on first run)
    if let Err(e) = settings_manager.ensure_settings_file().await {
        tracing::warn!("Failed to create settings template: {}", e);
    }

    if args.verbose {
        eprintln!(
            "[cli] Settings loaded from {}",
            settings_manager.path().display()
        );
    }

    let mut args = args.clone();
    args.json = args.json || settings.ui.json_output;

    let config = resolve_backend_config(&settings, &args)?;
    if args.verbose {
        eprintln!("[cli] Backend: {}", config.url);
    }
    let client = Client::new(config).context("Failed to create backend client")?;

    let session_file = settings::session_file(&settings);
    if args.verbose {
        match session_file {
            Some(ref path) => eprintln!("[cli] Session file: {}", path.display()),
            None => eprintln!("[cli] Session persistence disabled"),
        }
    }

    let identity = Arc::new(HostedIdentity::new(
        client.clone(),
        settings.backend.redirect_url.clone(),
        session_file,
    ));
    let store = Arc::new(HostedStore::new(client));

    // Startup events are not printed; every command opens its own channel
    let (event_tx, _) = mpsc::unbounded_channel::<RuntimeEvent>();
    let runtime: Arc<dyn TrackerRuntime> = Arc::new(CliRuntime::new(event_tx, args.yes, args.json));

    let tracker = Arc::new(Tracker::new(identity, store, runtime.clone()));
    let auth_listener = tracker.spawn_auth_listener();

    if let Some(identity) = tracker.start().await {
        tracing::info!(user_id = %identity.user_id, "Restored session");
    }

    Ok(CliContext {
        runtime,
        tracker,
        settings_manager,
        args,
        auth_listener,
    })
}

/// Initialize logging: debug under `--verbose`, otherwise the configured level.
fn init_logging(args: &Args, settings: &TrackerSettings) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        settings.advanced.log_level.as_str()
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(
            format!("reflect_lib={}", log_level)
                .parse()
                .context("Invalid log level")?,
        )
        .add_directive(
            format!("hosted_backend={}", log_level)
                .parse()
                .context("Invalid log level")?,
        );

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Backend connection from CLI args, settings, or environment variables.
fn resolve_backend_config(settings: &TrackerSettings, args: &Args) -> Result<BackendConfig> {
    let url = args
        .backend_url
        .clone()
        .or_else(|| settings::backend_url(settings))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No backend URL configured. Set backend.url in ~/.reflect/settings.toml, \
                 REFLECT_BACKEND_URL, or use --backend-url"
            )
        })?;

    let anon_key = args
        .anon_key
        .clone()
        .or_else(|| settings::anon_key(settings))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No anon key configured. Set backend.anon_key in ~/.reflect/settings.toml, \
                 REFLECT_ANON_KEY, or use --anon-key"
            )
        })?;

    Ok(BackendConfig {
        url,
        anon_key,
        timeout_secs: settings.backend.timeout_secs,
    })
}

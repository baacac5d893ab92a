//! Process bootstrapper
//!
//! Resolves settings, brings up logging and runs the quickstart gate once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::gate::GateConfig;
use crate::config::logging::{LogFormat, LoggingConfig};
use crate::config::source::malformed;
use crate::config::{Config, SettingsSource};
use crate::error::Result;
use crate::services::{
    BootstrapPipeline, FileMarker, GateOutcome, HttpServiceAdmin, RunGate, SqlActionRunner,
    StepContext,
};

/// Resolve configuration and provision the instance if needed.
pub async fn run() -> Result<GateOutcome> {
    let source = match SettingsSource::from_env() {
        Ok(source) => source,
        Err(e) => {
            // Logging still has to come up to report why we are exiting.
            init_tracing(&LoggingConfig::default());
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };
    init_tracing(&LoggingConfig::from_source(&source));

    tracing::info!("Starting zato-quickstart v{}", env!("CARGO_PKG_VERSION"));

    // A disabled instance needs none of the other settings.
    let gate = GateConfig::from_source(&source).inspect_err(|e| tracing::error!("{}", e))?;
    if !gate.enabled {
        return Ok(GateOutcome::disabled());
    }

    let config = Config::from_source(&source).inspect_err(|e| tracing::error!("{}", e))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_signal_listener(interrupted.clone());

    provision(&config, interrupted).await
}

/// Initialize tracing/logging
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("zato_quickstart={}", logging.level).into());

    // A subscriber may already be installed (tests); keep the existing one.
    let result = match logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_ansi(false))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}

/// Run the gate for `config`. Stops before the next step once `interrupted`
/// is set.
pub async fn provision(config: &Config, interrupted: Arc<AtomicBool>) -> Result<GateOutcome> {
    let runner = SqlActionRunner::new(config.database.clone())?;

    let service = match &config.service {
        Some(service_config) => {
            let client = HttpServiceAdmin::new(service_config).map_err(|e| {
                malformed(
                    "ZATO_ADMIN_API_URL",
                    service_config.base_url.as_str(),
                    format!("cannot build client: {}", e),
                )
            })?;
            tracing::info!(
                "Registrations will be confirmed through {}",
                service_config.base_url
            );
            Some(client)
        }
        None => None,
    };

    let mut ctx = StepContext::new(config, &runner).with_interrupt_flag(interrupted);
    if let Some(client) = &service {
        ctx = ctx.with_service(client);
    }

    let mut gate = RunGate::new(
        config.gate.enabled,
        FileMarker::new(config.gate.marker_path.clone()),
    );
    gate.run(&BootstrapPipeline::quickstart(), &ctx).await
}

/// Flip `interrupted` on SIGINT or SIGTERM.
fn spawn_signal_listener(interrupted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("Shutdown requested, stopping after the current step");
        interrupted.store(true, Ordering::SeqCst);
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

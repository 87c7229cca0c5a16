//! Chipper Server Entry Point
//!
//! Compiles in every engine, initializes the configured ones and serves the
//! engine named by `engine.active`.

use std::process::ExitCode;

use chipper_config::load_settings;
use chipper_engines::create_default_registry;
use chipper_server::{bootstrap::ENV_VAR, init_tracing, run_registry, shutdown_signal};

#[tokio::main]
async fn main() -> ExitCode {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var(ENV_VAR).ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        },
    };

    init_tracing(&settings.observability);
    tracing::info!("Starting chipper v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        config_env = env.as_deref().unwrap_or("default"),
        active = %settings.engine.active,
        "Configuration loaded"
    );

    let registry = match create_default_registry() {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build engine registry");
            return ExitCode::FAILURE;
        },
    };

    match run_registry(registry, &settings, shutdown_signal()).await {
        Ok(()) => {
            tracing::info!("Server shutdown complete");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        },
    }
}

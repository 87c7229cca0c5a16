//! Standalone engine harness
//!
//! Each `chipper-<engine>` binary is a one-line `main` that hands its engine to
//! [`start_from_program_init`]. The harness initializes the engine before any
//! listener is bound, then serves the gRPC endpoint and the health/metrics
//! endpoint for that engine until SIGINT or SIGTERM.

use chipper_config::{load_settings, Settings, TlsConfig};
use chipper_core::{EngineError, EngineRegistry, IntentGraph, RegistryError, SpeechEngine};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};

use crate::dispatcher::SessionDispatcher;
use crate::graph::RecognitionGraph;
use crate::grpc::{ChipperGrpcServer, ChipperService};
use crate::http::{create_router, HttpState};
use crate::metrics::init_metrics;
use crate::pb::StreamingIntentGraphRequest;
use crate::telemetry::init_tracing;
use crate::ServerError;

/// Environment variable selecting `config/{env}` on top of `config/default`
pub const ENV_VAR: &str = "CHIPPER_ENV";

/// Harness errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] chipper_config::ConfigError),

    /// Always `EngineError::Initialization`
    #[error(transparent)]
    Initialization(EngineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Entry point of a standalone engine binary.
///
/// Returns a failing exit code when configuration cannot be loaded, when the
/// engine fails to initialize, or when a listener cannot be bound. Returns
/// success after a graceful external shutdown.
pub fn start_from_program_init<E: SpeechEngine>(engine: E) -> ExitCode {
    let engine_id = engine.identifier();
    match run_standalone(Arc::new(engine)) {
        Ok(()) => {
            tracing::info!(engine = engine_id, "Shutdown complete");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(engine = engine_id, error = %e, "Engine harness failed");
            eprintln!("chipper-{}: {}", engine_id, e);
            ExitCode::FAILURE
        },
    }
}

/// Load settings, start a runtime and run `engine` until shutdown
pub fn run_standalone(engine: Arc<dyn SpeechEngine>) -> Result<(), BootstrapError> {
    let env = std::env::var(ENV_VAR).ok();
    let settings = load_settings(env.as_deref())?;

    init_tracing(&settings.observability);
    tracing::info!(
        engine = engine.identifier(),
        environment = ?settings.environment,
        config_env = env.as_deref().unwrap_or("default"),
        "Starting chipper v{}",
        env!("CARGO_PKG_VERSION")
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(BootstrapError::Runtime)?;
    runtime.block_on(run_engine(engine, &settings, shutdown_signal()))
}

/// Initialize one engine, then serve it until `shutdown` resolves
pub async fn run_engine<F>(
    engine: Arc<dyn SpeechEngine>,
    settings: &Settings,
    shutdown: F,
) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send,
{
    let engine_id = engine.identifier();
    let config = settings.engine_config(engine_id);
    tracing::info!(engine = engine_id, config = ?config, "Initializing engine");

    if let Err(e) = engine.initialize(&config).await {
        let e = if e.is_initialization() {
            e
        } else {
            EngineError::initialization(engine_id, e.to_string())
        };
        tracing::error!(engine = engine_id, error = %e, "Engine initialization failed");
        return Err(BootstrapError::Initialization(e));
    }
    tracing::info!(engine = engine_id, "Engine initialized");

    let graph = Arc::new(RecognitionGraph::from_settings(engine, settings));
    serve(engine_id, graph, settings, shutdown).await
}

/// Initialize the configured engines of `registry` and serve the active one.
///
/// Engines other than the active one may fail to initialize; they are only
/// logged.
pub async fn run_registry<F>(
    registry: EngineRegistry,
    settings: &Settings,
    shutdown: F,
) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send,
{
    let active = settings.engine.active.as_str();
    if !registry.has(active) {
        tracing::error!(
            engine = active,
            available = ?registry.identifiers(),
            "Active engine is not compiled in"
        );
        return Err(RegistryError::NotFound(active.to_string()).into());
    }

    // the active engine plus every engine with its own config section
    let failures = registry
        .initialize_all(|id| {
            (id == active || settings.engines.contains_key(id)).then(|| settings.engine_config(id))
        })
        .await;
    for (id, e) in &failures {
        if *id == active {
            tracing::error!(engine = *id, error = %e, "Active engine failed to initialize");
            return Err(RegistryError::Unavailable(active.to_string()).into());
        }
        tracing::warn!(engine = *id, error = %e, "Engine unavailable");
    }

    let engine = registry.available(active)?;
    let engine_id = engine.identifier();
    let graph = Arc::new(RecognitionGraph::from_settings(engine, settings));
    serve(engine_id, graph, settings, shutdown).await
}

/// Bind the configured gRPC and HTTP addresses and serve `graph`
pub async fn serve<F>(
    engine_id: &'static str,
    graph: Arc<dyn IntentGraph<StreamingIntentGraphRequest>>,
    settings: &Settings,
    shutdown: F,
) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send,
{
    let grpc_listener = bind(&settings.server.grpc_addr()).await?;
    let http_listener = bind(&settings.server.http_addr()).await?;
    serve_with_listeners(engine_id, graph, settings, grpc_listener, http_listener, shutdown).await
}

async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve on already-bound listeners until `shutdown` resolves
pub async fn serve_with_listeners<F>(
    engine_id: &'static str,
    graph: Arc<dyn IntentGraph<StreamingIntentGraphRequest>>,
    settings: &Settings,
    grpc_listener: TcpListener,
    http_listener: TcpListener,
    shutdown: F,
) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send,
{
    let metrics = if settings.observability.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    let dispatcher = SessionDispatcher::new(
        graph,
        engine_id,
        settings.server.first_message_timeout(),
    );
    let service = ChipperService::new(dispatcher, settings.server.response_buffer);

    let mut builder = Server::builder()
        .http2_keepalive_interval(Some(Duration::from_secs(settings.server.keepalive_secs)))
        .max_concurrent_streams(Some(settings.server.max_concurrent_streams));
    if let Some(tls) = &settings.server.tls {
        builder = builder
            .tls_config(server_tls_config(tls)?)
            .map_err(ServerError::from)?;
    }

    let grpc_addr = grpc_listener.local_addr().map_err(ServerError::from)?;
    let http_addr = http_listener.local_addr().map_err(ServerError::from)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let grpc = builder
        .add_service(ChipperGrpcServer::new(service))
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(grpc_listener),
            stopped(stop_rx.clone()),
        );
    let http = axum::serve(http_listener, create_router(HttpState::new(engine_id, metrics)))
        .with_graceful_shutdown(stopped(stop_rx));

    tracing::info!(
        engine = engine_id,
        grpc = %grpc_addr,
        http = %http_addr,
        tls = settings.server.tls.is_some(),
        "Listening"
    );

    tokio::try_join!(
        async {
            shutdown.await;
            tracing::info!(engine = engine_id, "Shutting down listeners");
            let _ = stop_tx.send(true);
            Ok::<(), ServerError>(())
        },
        async { grpc.await.map_err(ServerError::from) },
        async { http.await.map_err(ServerError::from) },
    )?;

    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    // a dropped sender ends serving as well
    let _ = rx.wait_for(|stop| *stop).await;
}

fn server_tls_config(tls: &TlsConfig) -> Result<ServerTlsConfig, ServerError> {
    let cert = std::fs::read(&tls.cert_path)
        .map_err(|e| ServerError::Tls(format!("{}: {}", tls.cert_path.display(), e)))?;
    let key = std::fs::read(&tls.key_path)
        .map_err(|e| ServerError::Tls(format!("{}: {}", tls.key_path.display(), e)))?;
    Ok(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

//! Chipper Server
//!
//! gRPC `StreamingIntentGraph` endpoint, session dispatcher, default
//! recognition graph and the standalone per-engine harness.

pub mod bootstrap;
pub mod dispatcher;
pub mod graph;
pub mod grpc;
pub mod http;
pub mod matcher;
pub mod metrics;
pub mod pb;
pub mod telemetry;

pub use bootstrap::{
    run_engine, run_registry, run_standalone, serve, serve_with_listeners, shutdown_signal,
    start_from_program_init, BootstrapError,
};
pub use dispatcher::{DispatchError, SessionDispatcher};
pub use graph::RecognitionGraph;
pub use grpc::{parse_grpc_timeout, ChipperGrpcClient, ChipperGrpcServer, ChipperService};
pub use http::{create_router, HttpState};
pub use matcher::{IntentMatch, IntentMatcher, PhraseMatcher};
pub use metrics::init_metrics;
pub use telemetry::init_tracing;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

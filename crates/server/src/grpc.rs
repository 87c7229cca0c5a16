//! gRPC surface: `chipperpb.ChipperGrpc/StreamingIntentGraph`

use async_trait::async_trait;
use chipper_core::{ErrorCode, IntentResponse, SessionStream, StreamError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Code, Request, Response, Status, Streaming};

use crate::dispatcher::{DispatchError, SessionDispatcher};
use crate::pb::{StreamingIntentGraphRequest, StreamingIntentGraphResponse};

pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/chipperpb.ChipperGrpc.rs"));
}

pub use proto::chipper_grpc_client::ChipperGrpcClient;
pub use proto::chipper_grpc_server::{ChipperGrpc, ChipperGrpcServer};

/// Longest value the `grpc-timeout` header may carry (8 digits)
const MAX_TIMEOUT_DIGITS: usize = 8;

/// Parse the `grpc-timeout` request header (`"{digits}{unit}"`)
pub fn parse_grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
    let value = metadata.get("grpc-timeout")?.to_str().ok()?;
    parse_timeout_value(value)
}

fn parse_timeout_value(value: &str) -> Option<Duration> {
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > MAX_TIMEOUT_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

pub fn code_to_tonic(code: ErrorCode) -> Code {
    match code {
        ErrorCode::Cancelled => Code::Cancelled,
        ErrorCode::Unknown => Code::Unknown,
        ErrorCode::InvalidArgument => Code::InvalidArgument,
        ErrorCode::DeadlineExceeded => Code::DeadlineExceeded,
        ErrorCode::NotFound => Code::NotFound,
        ErrorCode::FailedPrecondition => Code::FailedPrecondition,
        ErrorCode::Aborted => Code::Aborted,
        ErrorCode::ResourceExhausted => Code::ResourceExhausted,
        ErrorCode::Unimplemented => Code::Unimplemented,
        ErrorCode::Internal => Code::Internal,
        ErrorCode::Unavailable => Code::Unavailable,
        ErrorCode::Unauthenticated => Code::Unauthenticated,
    }
}

pub fn code_from_tonic(code: Code) -> ErrorCode {
    match code {
        Code::Cancelled => ErrorCode::Cancelled,
        Code::InvalidArgument | Code::OutOfRange => ErrorCode::InvalidArgument,
        Code::DeadlineExceeded => ErrorCode::DeadlineExceeded,
        Code::NotFound => ErrorCode::NotFound,
        Code::FailedPrecondition => ErrorCode::FailedPrecondition,
        Code::Aborted | Code::AlreadyExists => ErrorCode::Aborted,
        Code::ResourceExhausted => ErrorCode::ResourceExhausted,
        Code::Unimplemented => ErrorCode::Unimplemented,
        Code::Internal | Code::DataLoss => ErrorCode::Internal,
        Code::Unavailable => ErrorCode::Unavailable,
        Code::Unauthenticated | Code::PermissionDenied => ErrorCode::Unauthenticated,
        Code::Ok | Code::Unknown => ErrorCode::Unknown,
    }
}

impl From<DispatchError> for Status {
    fn from(err: DispatchError) -> Self {
        Status::new(code_to_tonic(err.code()), err.message())
    }
}

/// [`SessionStream`] over one tonic bidirectional call
pub struct GrpcSessionStream {
    inbound: Streaming<StreamingIntentGraphRequest>,
    outbound: mpsc::Sender<Result<StreamingIntentGraphResponse, Status>>,
}

impl GrpcSessionStream {
    pub fn new(
        inbound: Streaming<StreamingIntentGraphRequest>,
        outbound: mpsc::Sender<Result<StreamingIntentGraphResponse, Status>>,
    ) -> Self {
        Self { inbound, outbound }
    }
}

#[async_trait]
impl SessionStream for GrpcSessionStream {
    type Message = StreamingIntentGraphRequest;

    async fn recv(&mut self) -> Result<Option<StreamingIntentGraphRequest>, StreamError> {
        tokio::select! {
            message = self.inbound.message() => message
                .map_err(|status| StreamError::new(code_from_tonic(status.code()), status.message())),
            _ = self.outbound.closed() => Err(StreamError::disconnected("client went away")),
        }
    }

    async fn send(&mut self, response: IntentResponse) -> Result<(), StreamError> {
        self.outbound
            .send(Ok(response.into()))
            .await
            .map_err(|_| StreamError::disconnected("client went away"))
    }
}

/// `ChipperGrpc` service implementation
pub struct ChipperService {
    dispatcher: SessionDispatcher<StreamingIntentGraphRequest>,
    response_buffer: usize,
}

impl ChipperService {
    pub fn new(
        dispatcher: SessionDispatcher<StreamingIntentGraphRequest>,
        response_buffer: usize,
    ) -> Self {
        Self {
            dispatcher,
            response_buffer: response_buffer.max(1),
        }
    }
}

#[async_trait]
impl ChipperGrpc for ChipperService {
    type StreamingIntentGraphStream = ReceiverStream<Result<StreamingIntentGraphResponse, Status>>;

    async fn streaming_intent_graph(
        &self,
        request: Request<Streaming<StreamingIntentGraphRequest>>,
    ) -> Result<Response<Self::StreamingIntentGraphStream>, Status> {
        let deadline = parse_grpc_timeout(request.metadata());
        let inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(self.response_buffer);

        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let mut stream = GrpcSessionStream::new(inbound, tx.clone());
            if let Err(e) = dispatcher.handle_session(&mut stream, deadline).await {
                // receiver gone means the client already left
                let _ = tx.send(Err(Status::from(e))).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

use crate::transport::TransportError;
use thiserror::Error;

/// Failure reasons delivered to callers of the workflow components.
///
/// Every asynchronous completion resolves to either a success value or one
/// of these. The type is `Clone` so a failure can sit inside published
/// state (a `Failed` capture, a failed report view).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Operation invoked while the state machine cannot accept it.
    #[error("{operation} not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A success-flagged response missing expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The service answered `success: false`; message is verbatim.
    #[error("{0}")]
    ServiceRejected(String),
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    #[error("photo encoding failed: {0}")]
    Encode(String),
}

impl ClientError {
    pub(crate) fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Short tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::MalformedResponse(_) => "malformed_response",
            Self::ServiceRejected(_) => "service_rejected",
            Self::TransportFailure(_) => "transport_failure",
            Self::Encode(_) => "encode",
        }
    }
}

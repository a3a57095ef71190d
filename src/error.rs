use crate::transport::TransportError;
use thiserror::Error;

/// Classification of a finished transport call that did not succeed.
///
/// The mapping from raw HTTP status to kind is fixed and applied centrally;
/// callers never see raw status handling outside of this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was cancelled by the caller before completion.
    Cancelled,
    /// Status 0 after the call was opened: the connection itself failed.
    Connection,
    /// 4xx: the request input was rejected.
    ClientInput,
    /// 5xx: the server failed.
    Server,
    /// Anything else (>= 600, or an unknown status).
    Unexpected,
}

impl ErrorKind {
    /// Map a non-success status to an error kind.
    ///
    /// `opened` distinguishes the two meanings of status 0: a call that was
    /// never opened was aborted locally, a call that was opened but still
    /// reported 0 hit a connection failure.
    pub fn from_status(status: u16, opened: bool) -> Self {
        match status {
            0 if !opened => ErrorKind::Cancelled,
            0 => ErrorKind::Connection,
            400..=499 => ErrorKind::ClientInput,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unexpected,
        }
    }

    /// User-facing message for this kind.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Cancelled => "Request was cancelled.",
            ErrorKind::Connection => {
                "There is a connection issue. Please check your internet connection and try again."
            }
            ErrorKind::ClientInput => {
                "Error performing request. Please double check your input and try again."
            }
            ErrorKind::Server => "Unexpected server error. Please try again.",
            ErrorKind::Unexpected => "Unexpected network error",
        }
    }
}

/// A classified request failure.
///
/// Carries the raw status and a best-effort parsed error payload: JSON if the
/// response content type indicated JSON and parsing succeeded, the raw body
/// text otherwise, `None` when there was no usable body. Parse failures are
/// swallowed here, never surfaced as a second error.
#[derive(Debug, Error)]
#[error("{}", self.kind.message())]
pub struct RequestError {
    pub kind: ErrorKind,
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl RequestError {
    pub fn new(kind: ErrorKind, status: u16, body: Option<serde_json::Value>) -> Self {
        Self { kind, status, body }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, 0, None)
    }
}

/// Unified error type for the request layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A transport call finished with a non-success classification.
    #[error(transparent)]
    Status(#[from] RequestError),

    /// The call could not be constructed or dispatched at all.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error substituted by a caller-supplied error transformer.
    #[error(transparent)]
    Transformed(anyhow::Error),
}

impl Error {
    pub fn cancelled() -> Self {
        Error::Status(RequestError::cancelled())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid {
            message: message.into(),
        }
    }

    /// The classification kind, when this error went through the classifier.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Status(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The raw transport status, when known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == Some(ErrorKind::Cancelled)
    }
}

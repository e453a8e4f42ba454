use std::fmt;

use thiserror::Error;

use crate::session::counter::CounterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    InvalidState,
    UnknownAttribute,
    OperationNotPermitted,
    NoPendingWrite,
    InvalidPayload,
    InvariantViolation,
    Transport,
    ChannelClosed,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorType::InvalidState => "invalid state",
            ErrorType::UnknownAttribute => "unknown attribute",
            ErrorType::OperationNotPermitted => "operation not permitted",
            ErrorType::NoPendingWrite => "no pending write",
            ErrorType::InvalidPayload => "invalid payload",
            ErrorType::InvariantViolation => "invariant violation",
            ErrorType::Transport => "transport error",
            ErrorType::ChannelClosed => "channel closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorType,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure described only by text, as reported by the platform stack.
    pub fn from_string(message: String, kind: ErrorType) -> Self {
        Self::new(kind, message)
    }

    pub fn is_invariant_violation(&self) -> bool {
        self.kind == ErrorType::InvariantViolation
    }
}

impl From<CounterError> for Error {
    fn from(err: CounterError) -> Self {
        Error::new(ErrorType::InvariantViolation, err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::new(ErrorType::ChannelClosed, "session task is no longer running")
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::new(ErrorType::ChannelClosed, "session task dropped the request")
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::new(ErrorType::InvalidPayload, err.to_string())
    }
}

//! # Session Errors
//!
//! The failure taxonomy a session exposes to the display host.

use crate::CoreError;
use emojiswap_client::ClientError;
use serde::Serialize;
use std::fmt;

pub const NO_FACE_MESSAGE: &str = "No faces detected in the photo";
pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Zero faces in the photo; the user has to retake or pick another one
    NoFaceDetected,
    /// The request exceeded its deadline
    Timeout,
    /// Connection or transport failure
    Network,
    /// The service answered with an error
    Service,
    /// The result could not be written locally
    Storage,
}

impl ErrorKind {
    /// Whether an automatic retry makes sense
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::NoFaceDetected)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NoFaceDetected => write!(f, "no face detected"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Service => write!(f, "service"),
            ErrorKind::Storage => write!(f, "storage"),
        }
    }
}

/// Which step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Detect,
    Process,
    Materialize,
}

/// A classified failure attached to a session snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub stage: Stage,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>, stage: Stage) -> Self {
        Self {
            kind,
            message: message.into(),
            stage,
        }
    }

    pub fn no_face() -> Self {
        Self::new(ErrorKind::NoFaceDetected, NO_FACE_MESSAGE, Stage::Detect)
    }

    /// Classify a transport failure.
    ///
    /// Malformed answers count as service errors; local problems reaching the
    /// service (unreadable photo, cancelled call) count as network errors.
    pub fn from_client(err: &ClientError, stage: Stage) -> Self {
        match err {
            ClientError::Timeout(_) => Self::new(ErrorKind::Timeout, TIMEOUT_MESSAGE, stage),
            ClientError::Service { message, .. } => {
                Self::new(ErrorKind::Service, message.clone(), stage)
            }
            ClientError::InvalidResponse(_) => {
                Self::new(ErrorKind::Service, err.to_string(), stage)
            }
            _ => Self::new(ErrorKind::Network, err.to_string(), stage),
        }
    }

    pub fn storage(err: &CoreError) -> Self {
        Self::new(ErrorKind::Storage, err.to_string(), Stage::Materialize)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorInfo {}

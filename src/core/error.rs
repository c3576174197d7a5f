//! Errors surfaced to the caller of a turn.
//!
//! Parse-level problems inside the event stream never appear here; they are
//! logged and the offending event is skipped. Cancellation is not an error
//! either: a cancelled turn completes through the normal finish path.

use std::error::Error;
use std::fmt;

/// Failure of the request that starts a flow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiationError {
    /// The service answered with a non-success status.
    Status { status: u16, detail: Option<String> },
    /// The request never produced a response.
    Transport(String),
    /// The response was not JSON.
    InvalidBody(String),
    /// The response parsed but held neither inline text nor a stream locator.
    UnexpectedShape(String),
}

impl fmt::Display for InitiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitiationError::Status {
                status,
                detail: Some(detail),
            } => write!(f, "Flow run failed with HTTP status {status}: {detail}"),
            InitiationError::Status {
                status,
                detail: None,
            } => write!(f, "Flow run failed with HTTP status {status}"),
            InitiationError::Transport(message) => {
                write!(f, "Could not reach the flow service: {message}")
            }
            InitiationError::InvalidBody(message) => {
                write!(f, "Flow service returned an unreadable response: {message}")
            }
            InitiationError::UnexpectedShape(message) => {
                write!(f, "Flow service returned an unexpected response: {message}")
            }
        }
    }
}

impl Error for InitiationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    Initiation(InitiationError),
    /// The stream connection could not be established at all.
    StreamOpen(String),
    /// The stream connection broke after it was opened.
    StreamInterrupted(String),
    /// The turn completed without producing any text.
    EmptyResponse,
}

impl TurnError {
    /// Whether the error ended the turn early. An empty response is reported
    /// but the turn itself still completed normally.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TurnError::EmptyResponse)
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Initiation(err) => write!(f, "{err}"),
            TurnError::StreamOpen(message) => {
                write!(f, "Could not open the response stream: {message}")
            }
            TurnError::StreamInterrupted(message) => {
                write!(f, "Response stream interrupted: {message}")
            }
            TurnError::EmptyResponse => write!(f, "Empty response from server"),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TurnError::Initiation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InitiationError> for TurnError {
    fn from(value: InitiationError) -> Self {
        TurnError::Initiation(value)
    }
}

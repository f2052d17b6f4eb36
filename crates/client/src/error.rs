use std::time::Duration;

use narutalk_chat::{ErrorKind, MessageId};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("connection lost on `{stage}`: {details}"))]
    Disconnected {
        stage: &'static str,
        details: String,
    },
}

/// Fatal condition that ends one exchange.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExchangeError {
    #[snafu(display("network request failed: {source}"))]
    Transport { source: TransportError },
    #[snafu(display("HTTP error! status: {status}, message: {body}"))]
    Status { status: u16, body: String },
    #[snafu(display("{message}"))]
    Application { message: String },
    #[snafu(display("streaming response timed out after {}s without data", idle.as_secs()))]
    Timeout { idle: Duration },
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Status { .. } => ErrorKind::Protocol,
            Self::Application { .. } => ErrorKind::Application,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Text that replaces the assistant message when the exchange fails.
    pub fn user_facing(&self, debug: bool) -> String {
        let mut description = format!("Sorry, an error occurred: {self}");
        if debug {
            description.push_str(&format!("\n\nDebug info: {self:?}"));
        }
        description
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Why the session refused a command.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum SessionError {
    #[snafu(display("cannot send an empty message"))]
    EmptyMessage,
    #[snafu(display("message {active} is still streaming"))]
    ExchangeInFlight { active: MessageId },
    #[snafu(display("the chat session has shut down"))]
    SessionClosed,
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_code_and_body() {
        let error = ExchangeError::Status {
            status: 500,
            body: "server error".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::Protocol);

        let text = error.user_facing(false);
        assert!(text.starts_with("Sorry, an error occurred:"));
        assert!(text.contains("500"));
        assert!(text.contains("server error"));
        assert!(!text.contains("Debug info"));
    }

    #[test]
    fn debug_mode_appends_diagnostics() {
        let error = ExchangeError::Timeout {
            idle: Duration::from_secs(30),
        };
        let text = error.user_facing(true);
        assert!(text.contains("timed out after 30s"));
        assert!(text.contains("\n\nDebug info: Timeout"));
    }

    #[test]
    fn transport_errors_keep_their_cause() {
        let error = ExchangeError::Transport {
            source: TransportError::Disconnected {
                stage: "read-stream-chunk",
                details: "connection reset".to_string(),
            },
        };
        assert_eq!(error.kind(), ErrorKind::Transport);
        assert!(error.to_string().contains("connection reset"));
    }
}

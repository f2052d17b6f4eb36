use narutalk_chat::{ExchangeOutcome, InterpretError, MessageId, SessionInfo, StreamEvent};

use crate::error::SessionError;

/// How a response body ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The `[DONE]` sentinel arrived.
    Sentinel,
    /// The connection closed without a terminal signal.
    EndOfBody,
}

/// Hook for the session's lifecycle notifications.
///
/// Every method defaults to a no-op so implementors pick what they need.
pub trait SessionObserver: Send + Sync {
    fn exchange_started(&self, _info: &SessionInfo, _message_id: MessageId) {}

    fn event_applied(&self, _message_id: MessageId, _event: &StreamEvent) {}

    fn stream_finished(&self, _message_id: MessageId, _reason: FinishReason) {}

    fn frame_rejected(&self, _message_id: MessageId, _error: &InterpretError) {}

    fn send_rejected(&self, _error: &SessionError) {}

    fn exchange_settled(&self, _message_id: MessageId, _outcome: &ExchangeOutcome) {}
}

/// Default observer: structured `tracing` output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn exchange_started(&self, info: &SessionInfo, message_id: MessageId) {
        tracing::info!(
            session_id = %info.session_id,
            user_id = %info.user_id,
            message_id = %message_id,
            "chat exchange started"
        );
    }

    fn event_applied(&self, message_id: MessageId, event: &StreamEvent) {
        tracing::debug!(
            message_id = %message_id,
            event = event.name(),
            note = event.note().unwrap_or_default(),
            "stream event applied"
        );
    }

    fn stream_finished(&self, message_id: MessageId, reason: FinishReason) {
        match reason {
            FinishReason::Sentinel => {
                tracing::debug!(message_id = %message_id, "stream finished with sentinel")
            }
            FinishReason::EndOfBody => tracing::info!(
                message_id = %message_id,
                "stream ended without a terminal signal, treating as complete"
            ),
        }
    }

    fn frame_rejected(&self, message_id: MessageId, error: &InterpretError) {
        tracing::warn!(message_id = %message_id, error = %error, "skipping malformed frame");
    }

    fn send_rejected(&self, error: &SessionError) {
        tracing::warn!(error = %error, "chat message rejected");
    }

    fn exchange_settled(&self, message_id: MessageId, outcome: &ExchangeOutcome) {
        match outcome {
            ExchangeOutcome::Completed => {
                tracing::info!(message_id = %message_id, "chat exchange completed")
            }
            ExchangeOutcome::Cancelled => {
                tracing::info!(message_id = %message_id, "chat exchange cancelled")
            }
            ExchangeOutcome::Failed { kind, description } => tracing::warn!(
                message_id = %message_id,
                kind = ?kind,
                description = %description,
                "chat exchange failed"
            ),
        }
    }
}

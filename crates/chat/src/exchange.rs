use crate::ids::MessageId;

/// Failure taxonomy for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request or the connection failed.
    Transport,
    /// The backend answered outside the protocol (bad status, bad frame).
    Protocol,
    /// The backend reported an error event.
    Application,
    /// No data arrived within the inactivity window.
    Timeout,
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Failed {
        kind: ErrorKind,
        description: String,
    },
    /// The stream was abandoned by the client (clear or shutdown).
    Cancelled,
}

/// Lifecycle of the single in-flight exchange of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    /// Request issued, response headers not yet received.
    Sending(MessageId),
    /// Reading the response body.
    Streaming(MessageId),
    Settled {
        message_id: MessageId,
        outcome: ExchangeOutcome,
    },
}

/// State transition input for the exchange lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeTransition {
    Begin(MessageId),
    Open,
    Settle(ExchangeOutcome),
    Reset,
}

/// Rejection reason for illegal exchange transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeTransitionRejection {
    AlreadyInFlight { active: MessageId },
    NotSending,
    NotInFlight,
}

pub type ExchangeTransitionResult = Result<ExchangeState, ExchangeTransitionRejection>;

impl ExchangeState {
    /// Message of the in-flight exchange, if there is one.
    pub fn in_flight(&self) -> Option<MessageId> {
        match self {
            Self::Sending(id) | Self::Streaming(id) => Some(*id),
            Self::Idle | Self::Settled { .. } => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight().is_some()
    }

    /// Outcome of the last exchange, while the session rests after it.
    pub fn outcome(&self) -> Option<&ExchangeOutcome> {
        match self {
            Self::Settled { outcome, .. } => Some(outcome),
            Self::Idle | Self::Sending(_) | Self::Streaming(_) => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// Resting states (`Idle`, `Settled`) accept `Begin`; only an in-flight
    /// exchange can be settled, and only a sending one can open.
    pub fn apply(&self, transition: ExchangeTransition) -> ExchangeTransitionResult {
        match transition {
            ExchangeTransition::Begin(message_id) => match self.in_flight() {
                Some(active) => Err(ExchangeTransitionRejection::AlreadyInFlight { active }),
                None => Ok(Self::Sending(message_id)),
            },
            ExchangeTransition::Open => match self {
                Self::Sending(message_id) => Ok(Self::Streaming(*message_id)),
                Self::Idle | Self::Streaming(_) | Self::Settled { .. } => {
                    Err(ExchangeTransitionRejection::NotSending)
                }
            },
            ExchangeTransition::Settle(outcome) => match self.in_flight() {
                Some(message_id) => Ok(Self::Settled {
                    message_id,
                    outcome,
                }),
                None => Err(ExchangeTransitionRejection::NotInFlight),
            },
            ExchangeTransition::Reset => Ok(Self::Idle),
        }
    }
}

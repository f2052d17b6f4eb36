//! Semantic events carried by data frames, and their interpretation.

use serde::Deserialize;
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use crate::message::AgentKind;
use crate::transcript::TranscriptUpdate;

const PREVIEW_LIMIT: usize = 200;

const UNDESCRIBED_ERROR: &str = "the assistant reported an error without a description";

/// One decoded backend event, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start {
        agent: Option<AgentKind>,
        message: Option<String>,
    },
    AgentSelection {
        message: Option<String>,
    },
    AgentInfo {
        agent: AgentKind,
        message: Option<String>,
    },
    /// Additive word-by-word update.
    Token { word: Option<String> },
    /// Cumulative update that replaces everything streamed so far.
    ///
    /// `null` fields read the same as missing ones.
    Content {
        content: Option<String>,
        is_final: Option<bool>,
    },
    Complete {
        content: Option<String>,
        agent: Option<AgentKind>,
    },
    /// `message` is usually a string, but any JSON value is accepted so a
    /// reported failure is never lost to a type mismatch.
    Error { message: Option<Value> },
    /// Any `type` this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Wire name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::AgentSelection { .. } => "agent_selection",
            Self::AgentInfo { .. } => "agent_info",
            Self::Token { .. } => "token",
            Self::Content { .. } => "content",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable progress note some backends attach to status events.
    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Start { message, .. }
            | Self::AgentSelection { message }
            | Self::AgentInfo { message, .. } => message.as_deref(),
            Self::Token { .. }
            | Self::Content { .. }
            | Self::Complete { .. }
            | Self::Error { .. }
            | Self::Unknown => None,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterpretError {
    #[snafu(display("malformed event payload `{preview}`: {source}"))]
    Malformed {
        preview: String,
        source: serde_json::Error,
    },
}

/// Parses one data frame payload.
pub fn parse_event(payload: &str) -> Result<StreamEvent, InterpretError> {
    serde_json::from_str(payload).context(MalformedSnafu {
        preview: preview(payload),
    })
}

fn preview(payload: &str) -> String {
    match payload.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}…", &payload[..cut]),
        None => payload.to_string(),
    }
}

/// What the controller should do after one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Keep streaming, applying the update if there is one.
    Continue(Option<TranscriptUpdate>),
    /// Apply the update and settle the exchange.
    Complete(TranscriptUpdate),
    /// The backend reported a failure for this exchange.
    Fail { message: String },
}

/// Per-exchange interpreter state.
///
/// Content itself lives in the transcript; the interpreter only remembers the
/// running agent classification so terminal signals can stamp it.
#[derive(Debug, Default)]
pub struct EventInterpreter {
    agent: Option<AgentKind>,
}

impl EventInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last agent classification seen in this exchange.
    pub fn agent(&self) -> Option<&AgentKind> {
        self.agent.as_ref()
    }

    pub fn interpret(&mut self, event: &StreamEvent) -> Directive {
        match event {
            StreamEvent::Start { agent, .. } => {
                if let Some(agent) = agent {
                    self.agent = Some(agent.clone());
                }
                Directive::Continue(None)
            }
            StreamEvent::AgentSelection { .. } | StreamEvent::Unknown => Directive::Continue(None),
            StreamEvent::AgentInfo { agent, .. } => {
                self.agent = Some(agent.clone());
                Directive::Continue(None)
            }
            StreamEvent::Token { word } => Directive::Continue(
                word.as_ref()
                    .filter(|word| !word.is_empty())
                    .map(|word| TranscriptUpdate::Append(word.clone())),
            ),
            StreamEvent::Content { content, is_final } => {
                let content = content.clone().unwrap_or_default();
                // A final snapshot settles the message, but the exchange stays
                // open until the backend sends a terminal signal.
                let update = if is_final.unwrap_or_default() {
                    TranscriptUpdate::Settle {
                        content: Some(content),
                        agent: self.agent.clone(),
                    }
                } else {
                    TranscriptUpdate::Replace(content)
                };
                Directive::Continue(Some(update))
            }
            StreamEvent::Complete { content, agent } => {
                if let Some(agent) = agent {
                    self.agent = Some(agent.clone());
                }
                Directive::Complete(TranscriptUpdate::Complete {
                    content: content.clone().filter(|content| !content.is_empty()),
                    agent: self.agent.clone(),
                })
            }
            StreamEvent::Error { message } => Directive::Fail {
                message: describe_error(message.as_ref()),
            },
        }
    }

    /// Directive for the `[DONE]` sentinel or a body that simply ended.
    pub fn finish(&self) -> Directive {
        Directive::Complete(TranscriptUpdate::Complete {
            content: None,
            agent: self.agent.clone(),
        })
    }
}

fn describe_error(message: Option<&Value>) -> String {
    let description = match message {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string(),
    };
    if description.is_empty() {
        UNDESCRIBED_ERROR.to_string()
    } else {
        description
    }
}

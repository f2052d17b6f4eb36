//! Ordered conversation state and the reducer that advances it.
//!
//! A [`Transcript`] is an immutable value: every change produces a new
//! transcript, so readers can hold a snapshot while the next one is built.
//! Messages are shared between snapshots; an update copies only the message
//! it touches. At most one message is active (streaming) at a time, and the active id is
//! tracked next to the messages so the invariant can be checked directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ids::MessageId;
use crate::message::{AgentKind, Message};

/// Change requested for the message of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// Append a streamed word to the active message.
    Append(String),
    /// Replace the active message content with a cumulative snapshot.
    Replace(String),
    /// Settle the active message, optionally fixing its final content.
    Settle {
        content: Option<String>,
        agent: Option<AgentKind>,
    },
    /// Terminal signal of the exchange: settle the message and stamp what the
    /// backend reported last. `None` fields leave the message as it is.
    ///
    /// Also applies to a message a final content event already settled.
    Complete {
        content: Option<String>,
        agent: Option<AgentKind>,
    },
    /// Settle the exchange message with an error description.
    ///
    /// Also applies to a message a final content event already settled.
    Fail { description: String },
}

/// Rejection reason for operations that would break transcript invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptRejection {
    ActiveMessageExists { active: MessageId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Arc<Message>>,
    active: Option<MessageId>,
    next_id: u64,
}

impl Transcript {
    /// Creates a transcript holding only the assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            messages: vec![Arc::new(Message::assistant(MessageId::new(1), greeting, now))],
            active: None,
            next_id: 2,
        }
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.position(id).map(|index| self.messages[index].as_ref())
    }

    pub fn active_message_id(&self) -> Option<MessageId> {
        self.active
    }

    pub fn active_message(&self) -> Option<&Message> {
        self.active.and_then(|id| self.get(id))
    }

    /// Number of messages flagged as streaming. Never more than one.
    pub fn active_count(&self) -> usize {
        self.messages.iter().filter(|message| message.streaming).count()
    }

    /// Appends the user's message and a streaming assistant placeholder.
    ///
    /// Returns the new transcript and the placeholder id.
    pub fn begin_exchange(
        &self,
        user_text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(Self, MessageId), TranscriptRejection> {
        if let Some(active) = self.active {
            return Err(TranscriptRejection::ActiveMessageExists { active });
        }

        let user_id = MessageId::new(self.next_id);
        let assistant_id = MessageId::new(self.next_id + 1);

        let mut next = self.clone();
        next.messages
            .push(Arc::new(Message::user(user_id, user_text, now)));
        next.messages
            .push(Arc::new(Message::assistant_streaming(assistant_id, now)));
        next.active = Some(assistant_id);
        next.next_id += 2;

        Ok((next, assistant_id))
    }

    /// Applies `update` to the message `target`.
    ///
    /// Returns `None` when the update is a no-op: the target is unknown, or it
    /// is already settled and the update is not a terminal one.
    pub fn apply(&self, target: MessageId, update: &TranscriptUpdate) -> Option<Self> {
        let index = self.position(target)?;
        let message = &self.messages[index];

        let terminal = matches!(
            update,
            TranscriptUpdate::Complete { .. } | TranscriptUpdate::Fail { .. }
        );
        if !message.streaming && !terminal {
            return None;
        }

        let mut next = self.clone();
        let message = Arc::make_mut(&mut next.messages[index]);

        match update {
            TranscriptUpdate::Append(word) => message.content.push_str(word),
            TranscriptUpdate::Replace(content) => message.content.clone_from(content),
            TranscriptUpdate::Settle { content, agent } => {
                if let Some(content) = content {
                    message.content.clone_from(content);
                }
                message.agent_kind = agent.clone();
                message.streaming = false;
            }
            TranscriptUpdate::Complete { content, agent } => {
                if let Some(content) = content {
                    message.content.clone_from(content);
                }
                if let Some(agent) = agent {
                    message.agent_kind = Some(agent.clone());
                }
                message.streaming = false;
            }
            TranscriptUpdate::Fail { description } => {
                message.content.clone_from(description);
                message.streaming = false;
            }
        }

        if !next.messages[index].streaming && next.active == Some(target) {
            next.active = None;
        }

        Some(next)
    }

    /// Returns a transcript reset to a fresh greeting.
    ///
    /// Message ids keep counting from where this transcript left off.
    pub fn cleared(&self, greeting: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            messages: vec![Arc::new(Message::assistant(
                MessageId::new(self.next_id),
                greeting,
                now,
            ))],
            active: None,
            next_id: self.next_id + 1,
        }
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Backend capability that produced an assistant reply.
///
/// Known agents get a dedicated variant; anything else the backend reports is
/// kept verbatim in `Other` so new agents still render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentKind {
    DocumentSearch,
    EmployeeInfo,
    ClientAnalysis,
    RuleCompliance,
    GeneralChat,
    Other(String),
}

impl AgentKind {
    /// Wire name used by the backend.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::DocumentSearch => "chroma_db_agent",
            Self::EmployeeInfo => "employee_db_agent",
            Self::ClientAnalysis => "client_analysis_agent",
            Self::RuleCompliance => "rule_compliance_agent",
            Self::GeneralChat => "general_chat",
            Self::Other(raw) => raw,
        }
    }

    /// Badge label shown next to a settled reply.
    pub fn display_name(&self) -> String {
        match self {
            Self::DocumentSearch => "📄 Document search".to_string(),
            Self::EmployeeInfo => "👥 Employee info".to_string(),
            Self::ClientAnalysis => "📊 Client analysis".to_string(),
            Self::RuleCompliance => "📋 Rule compliance".to_string(),
            Self::GeneralChat => "💬 General chat".to_string(),
            Self::Other(raw) => format!("🤖 {raw}"),
        }
    }
}

impl From<&str> for AgentKind {
    fn from(raw: &str) -> Self {
        match raw {
            "chroma_db_agent" => Self::DocumentSearch,
            "employee_db_agent" => Self::EmployeeInfo,
            "client_analysis_agent" => Self::ClientAnalysis,
            "rule_compliance_agent" => Self::RuleCompliance,
            "general_chat" => Self::GeneralChat,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for AgentKind {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<AgentKind> for String {
    fn from(kind: AgentKind) -> Self {
        kind.as_wire().to_string()
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub agent_kind: Option<AgentKind>,
    /// True while more content is expected for this message.
    pub streaming: bool,
}

impl Message {
    /// Creates a settled user message.
    pub fn user(id: MessageId, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender: Sender::User,
            content: content.into(),
            created_at,
            agent_kind: None,
            streaming: false,
        }
    }

    /// Creates a settled assistant message, used for the greeting.
    pub fn assistant(
        id: MessageId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            content: content.into(),
            created_at,
            agent_kind: None,
            streaming: false,
        }
    }

    /// Creates the empty assistant placeholder that receives streamed content.
    pub fn assistant_streaming(id: MessageId, created_at: DateTime<Utc>) -> Self {
        Self {
            streaming: true,
            ..Self::assistant(id, String::new(), created_at)
        }
    }
}

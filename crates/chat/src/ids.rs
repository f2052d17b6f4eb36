use std::fmt;

use uuid::Uuid;

/// Transcript-local identifier for one message.
///
/// Assigned by [`crate::Transcript`] from a counter that only moves forward,
/// so ids stay unique for the whole session even across a clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

// Session-scoped ids share one shape; only the display prefix differs.
macro_rules! define_session_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(raw: Uuid) -> Self {
                Self(raw)
            }

            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}_{}", $prefix, self.0.simple())
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self::new(value)
            }
        }
    };
}

define_session_id!(SessionId, "session");
define_session_id!(UserId, "user");

/// Identity of one conversation, fixed when the chat screen opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub user_id: UserId,
}

impl SessionInfo {
    /// Generates a fresh session/user pair.
    pub fn generate() -> Self {
        Self {
            session_id: SessionId::new_v7(),
            user_id: UserId::new_v7(),
        }
    }
}

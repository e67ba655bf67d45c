use serde::{Deserialize, Serialize};

/// Actor speaking in a conversation turn.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Ordered list of turns, optionally prefixed by a single system directive.
pub type ConversationHistory = Vec<ChatMessage>;

/// Restores the history invariant: at most one system message, at index 0.
///
/// The first system message wins and later ones are dropped. When `system` is
/// given and the history has none, it is prepended. The relative order of the
/// remaining messages never changes.
pub fn normalize(history: ConversationHistory, system: Option<&str>) -> ConversationHistory {
    let mut directive: Option<ChatMessage> = None;
    let mut rest = Vec::with_capacity(history.len() + 1);

    for message in history {
        if message.is_system() {
            if directive.is_none() {
                directive = Some(message);
            }
        } else {
            rest.push(message);
        }
    }

    let directive = directive.or_else(|| system.map(ChatMessage::system));

    match directive {
        Some(directive) => {
            rest.insert(0, directive);
            rest
        }
        None => rest,
    }
}

/// True when the history holds anything besides the system directive.
pub fn has_conversation(history: &[ChatMessage]) -> bool {
    history.iter().any(|message| !message.is_system())
}

//! Chat turns sent to a provider

use serde::{Deserialize, Serialize};

/// Speaker of a turn; system instructions travel in
/// [`CompletionRequest::system`](crate::CompletionRequest::system) instead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One plain-text turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("ok").role.as_str(), "assistant");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&Message::user("Analyze AAPL")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Analyze AAPL"}"#);
    }
}

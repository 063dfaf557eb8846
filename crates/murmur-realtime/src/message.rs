//! Relayed messages and the inbound wire shape.

use murmur_auth::Identity;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RealtimeError;

/// Maximum length of message content, in characters.
pub const MAX_CONTENT_LENGTH: usize = 4096;

/// A relayed message. Immutable once appended to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the sender.
    pub sender: String,
    /// Text content.
    pub content: String,
    /// Milliseconds since the Unix epoch, assigned by the store.
    pub timestamp: i64,
    /// Optional attachment reference, such as the sender's avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

/// A message that has not been stamped yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    /// Identity of the sender.
    pub sender: String,
    /// Text content.
    pub content: String,
    /// Optional attachment reference.
    pub attachment: Option<String>,
}

impl MessageDraft {
    /// Create a draft without attachment.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            attachment: None,
        }
    }

    /// Set the attachment reference.
    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }

    /// Check the content and sender rules shared by every submission path.
    ///
    /// The sender must be a well-formed identity id. Content must contain
    /// something besides whitespace and be at most [`MAX_CONTENT_LENGTH`]
    /// characters.
    pub fn validate(&self) -> Result<(), RealtimeError> {
        Identity::validate_id(&self.sender)
            .map_err(|e| RealtimeError::MalformedMessage(e.to_string()))?;
        Self::validate_content(&self.content)
    }

    /// Check message content on its own.
    pub fn validate_content(content: &str) -> Result<(), RealtimeError> {
        if content.trim().is_empty() {
            return Err(RealtimeError::MalformedMessage("empty content".into()));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(RealtimeError::MalformedMessage(format!(
                "content exceeds {MAX_CONTENT_LENGTH} characters"
            )));
        }
        Ok(())
    }

    pub(crate) fn stamp(self, timestamp: i64) -> Message {
        Message {
            sender: self.sender,
            content: self.content,
            timestamp,
            attachment: self.attachment,
        }
    }
}

/// Payload of one inbound client frame.
///
/// Any `timestamp` the client sends is ignored; the store assigns it.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Claimed sender. Only honored for anonymous sessions.
    #[serde(default)]
    pub sender: Option<String>,
    /// Text content.
    pub content: String,
    /// Claimed attachment. Only honored for anonymous sessions.
    #[serde(default)]
    pub attachment: Option<String>,
}

impl InboundMessage {
    /// Decode a JSON text payload.
    pub fn decode(payload: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(payload).map_err(|e| RealtimeError::MalformedMessage(e.to_string()))
    }

    /// Turn the payload into a draft scoped to the session's identity.
    ///
    /// With a verified identity the sender is that identity and the
    /// attachment is its avatar. Anonymous payloads must name a sender.
    pub fn into_draft(self, identity: Option<&Identity>) -> Result<MessageDraft, RealtimeError> {
        let draft = match identity {
            Some(identity) => MessageDraft {
                sender: identity.id.clone(),
                content: self.content,
                attachment: identity.avatar_url.clone(),
            },
            None => MessageDraft {
                sender: self
                    .sender
                    .ok_or_else(|| RealtimeError::MalformedMessage("missing sender".into()))?,
                content: self.content,
                attachment: self.attachment,
            },
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_client_timestamp() {
        let inbound =
            InboundMessage::decode(r#"{"sender":"u1","content":"hi","timestamp":5}"#).unwrap();
        let draft = inbound.into_draft(None).unwrap();
        assert_eq!(draft, MessageDraft::new("u1", "hi"));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            InboundMessage::decode("not json"),
            Err(RealtimeError::MalformedMessage(_))
        ));
        assert!(matches!(
            InboundMessage::decode(r#"{"sender":"u1"}"#),
            Err(RealtimeError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_anonymous_requires_sender() {
        let inbound = InboundMessage::decode(r#"{"content":"hi"}"#).unwrap();
        assert!(matches!(
            inbound.into_draft(None),
            Err(RealtimeError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_empty_and_oversized_content() {
        let empty = InboundMessage::decode(r#"{"sender":"u1","content":"   "}"#).unwrap();
        assert!(empty.into_draft(None).is_err());

        let big = InboundMessage {
            sender: Some("u1".into()),
            content: "x".repeat(MAX_CONTENT_LENGTH + 1),
            attachment: None,
        };
        assert!(big.into_draft(None).is_err());
    }

    #[test]
    fn test_content_limit_counts_characters() {
        let accented = MessageDraft::new("u1", "é".repeat(MAX_CONTENT_LENGTH));
        assert!(accented.validate().is_ok());

        let over = MessageDraft::new("u1", "é".repeat(MAX_CONTENT_LENGTH + 1));
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_sender_must_be_identity_id() {
        for sender in ["has space", "", "émile"] {
            let inbound = InboundMessage {
                sender: Some(sender.into()),
                content: "hi".into(),
                attachment: None,
            };
            assert!(
                matches!(inbound.into_draft(None), Err(RealtimeError::MalformedMessage(_))),
                "sender {sender:?} accepted"
            );
        }
        assert!(MessageDraft::new("bob_42.dev-x", "hi").validate().is_ok());
    }

    #[test]
    fn test_identity_scopes_sender_and_attachment() {
        let alice = Identity::new("alice", "Alice").with_avatar("https://img/alice.png");
        let inbound = InboundMessage::decode(
            r#"{"sender":"mallory","content":"hi","attachment":"https://img/mallory.png"}"#,
        )
        .unwrap();

        let draft = inbound.into_draft(Some(&alice)).unwrap();
        assert_eq!(draft.sender, "alice");
        assert_eq!(draft.attachment.as_deref(), Some("https://img/alice.png"));
    }

    #[test]
    fn test_message_serialization_omits_missing_attachment() {
        let msg = MessageDraft::new("u1", "hi").stamp(42);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sender": "u1", "content": "hi", "timestamp": 42})
        );
    }
}

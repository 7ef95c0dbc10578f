use serde::{Deserialize, Serialize};

/// Opaque conversation identity from the chat transport.
///
/// The sole partition key for ordering and mutual exclusion: all per-chat
/// state is keyed by this and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Sender identity as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle of an outbound message, as returned by the transport on send.
///
/// Used as the correlation key bridging an outbound prompt to the free-text
/// reply that answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub i32);

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One inbound event attributed to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub chat: ChatId,
    pub from: UserId,
    /// Transport delivery sequence number, monotonically increasing.
    pub seq: i64,
    pub kind: UpdateKind,
}

/// Payload variant of an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateKind {
    Message(IncomingMessage),
    CallbackQuery(CallbackQuery),
}

/// A free-text message from the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub text: String,
    /// Handle of the outbound message this one replies to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageHandle>,
}

/// An inline-control interaction, distinct from a free-text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Transport-unique token of this interaction.
    pub token: String,
    /// Opaque payload attached to the tapped control.
    pub data: String,
    /// Message the control was attached to, when still reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageHandle>,
}

impl Update {
    /// Free-form text of a message update.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Message(msg) => Some(&msg.text),
            UpdateKind::CallbackQuery(_) => None,
        }
    }

    /// Callback payload of a callback-query update.
    pub fn callback(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            UpdateKind::CallbackQuery(query) => Some(query),
            UpdateKind::Message(_) => None,
        }
    }

    /// Handle of the outbound message a free-text update replies to.
    pub fn reply_to(&self) -> Option<MessageHandle> {
        match &self.kind {
            UpdateKind::Message(msg) => msg.reply_to,
            UpdateKind::CallbackQuery(_) => None,
        }
    }
}

/// Instruction to the transport about previously attached inline controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackReceiveResult {
    /// Leave the controls in place.
    None,
    /// Strip the controls from the originating message.
    RemoveButtons,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_update(text: &str, reply_to: Option<i32>) -> Update {
        Update {
            chat: ChatId(42),
            from: UserId(7),
            seq: 1,
            kind: UpdateKind::Message(IncomingMessage {
                text: text.into(),
                reply_to: reply_to.map(MessageHandle),
            }),
        }
    }

    #[test]
    fn accessors_on_message() {
        let update = message_update("hello", Some(9));
        assert_eq!(update.text(), Some("hello"));
        assert_eq!(update.reply_to(), Some(MessageHandle(9)));
        assert!(update.callback().is_none());
    }

    #[test]
    fn accessors_on_callback() {
        let update = Update {
            chat: ChatId(42),
            from: UserId(7),
            seq: 2,
            kind: UpdateKind::CallbackQuery(CallbackQuery {
                token: "q1".into(),
                data: "ReopenIssue".into(),
                message: Some(MessageHandle(3)),
            }),
        };
        assert!(update.text().is_none());
        assert!(update.reply_to().is_none());
        let query = update.callback().map(|q| q.data.as_str());
        assert_eq!(query, Some("ReopenIssue"));
    }

    #[test]
    fn update_serde_roundtrip() {
        let update = message_update("ping", None);
        let json = serde_json::to_string(&update).unwrap();
        let back: Update = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chat, ChatId(42));
        assert_eq!(back.text(), Some("ping"));
    }
}

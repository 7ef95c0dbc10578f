use std::sync::Arc;

use async_trait::async_trait;

use deskbot_common::{ChatId, MessageHandle};

use crate::error::Result;

/// An inline control attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    /// Label shown to the user.
    pub label: String,
    /// Opaque payload delivered back in the callback query.
    pub data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Outbound side of one chat on the transport.
///
/// Every send returns the transport's handle for the new message; the handle
/// is what a later free-text reply references, so it doubles as the
/// correlation key for pending continuations.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Send plain text. With `awaits_reply` the transport is asked to nudge
    /// the client into reply mode (force-reply), so the answer arrives
    /// carrying this message's handle.
    async fn send_message(&self, text: &str, awaits_reply: bool) -> Result<MessageHandle>;

    /// Send text with a row of inline controls attached.
    async fn send_with_buttons(
        &self,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<MessageHandle>;

    /// Emit a non-blocking "typing" presence signal. The transport expires
    /// it on its own; there is no cleanup call.
    async fn send_typing(&self) -> Result<()>;

    /// Strip previously attached inline controls from a message.
    async fn remove_buttons(&self, handle: MessageHandle) -> Result<()>;
}

/// Hands out the outbound channel for a given chat.
pub trait ChatChannelFactory: Send + Sync {
    fn channel_for(&self, chat: ChatId) -> Arc<dyn ChatChannel>;
}

use async_trait::async_trait;

use deskbot_common::{ChatId, Update};

use crate::{channel::ChatChannel, error::Result, identity::Identity};

/// Per-chat conversation state machine.
///
/// Exactly one conversation is active per chat at a time; the dispatcher
/// creates it lazily and feeds every non-intercepted update into it.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Stable kind tag, e.g. "employee" or "contractor".
    fn kind(&self) -> &'static str;

    /// Advance the state machine with one update. May emit outbound
    /// messages through the chat channel.
    async fn advance(
        &mut self,
        update: &Update,
        identity: &Identity,
        channel: &dyn ChatChannel,
    ) -> Result<()>;
}

/// Selects and constructs the conversation kind for a chat.
///
/// Kind selection policy (by sender role) belongs to the embedding
/// application, not to the pipeline.
pub trait ConversationFactory: Send + Sync {
    fn create(&self, chat: ChatId, identity: &Identity) -> Box<dyn Conversation>;
}

//! `ChatChannel` implementation over the Telegram Bot API.

use std::sync::Arc;

use {
    async_trait::async_trait,
    teloxide::{
        payloads::SendMessageSetters,
        prelude::*,
        types::{
            ChatAction, ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
        },
    },
};

use {
    deskbot_channels::{ChatChannel, ChatChannelFactory, Error, InlineButton, Result},
    deskbot_common::{ChatId, MessageHandle},
};

/// Outbound channel bound to one Telegram chat.
pub struct TelegramChatChannel {
    bot: Bot,
    chat: teloxide::types::ChatId,
}

impl TelegramChatChannel {
    pub fn new(bot: Bot, chat: ChatId) -> Self {
        Self {
            bot,
            chat: teloxide::types::ChatId(chat.0),
        }
    }
}

#[async_trait]
impl ChatChannel for TelegramChatChannel {
    async fn send_message(&self, text: &str, awaits_reply: bool) -> Result<MessageHandle> {
        let mut request = self.bot.send_message(self.chat, text);
        if awaits_reply {
            // Force-reply makes the client answer with reply_to set to this
            // message, which is the correlation key for the continuation.
            request = request.reply_markup(ForceReply::new());
        }
        let message = request
            .await
            .map_err(|e| Error::transport("send message", e))?;
        Ok(MessageHandle(message.id.0))
    }

    async fn send_with_buttons(
        &self,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<MessageHandle> {
        let row: Vec<InlineKeyboardButton> = buttons
            .iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect();
        let message = self
            .bot
            .send_message(self.chat, text)
            .reply_markup(InlineKeyboardMarkup::new([row]))
            .await
            .map_err(|e| Error::transport("send message with buttons", e))?;
        Ok(MessageHandle(message.id.0))
    }

    async fn send_typing(&self) -> Result<()> {
        self.bot
            .send_chat_action(self.chat, ChatAction::Typing)
            .await
            .map_err(|e| Error::transport("send typing action", e))?;
        Ok(())
    }

    async fn remove_buttons(&self, handle: MessageHandle) -> Result<()> {
        // Editing the reply markup without providing one strips the keyboard.
        self.bot
            .edit_message_reply_markup(self.chat, MessageId(handle.0))
            .await
            .map_err(|e| Error::transport("remove inline keyboard", e))?;
        Ok(())
    }
}

/// Hands out per-chat channels sharing one Bot connection.
pub struct TelegramChannelFactory {
    bot: Bot,
}

impl TelegramChannelFactory {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl ChatChannelFactory for TelegramChannelFactory {
    fn channel_for(&self, chat: ChatId) -> Arc<dyn ChatChannel> {
        Arc::new(TelegramChatChannel::new(self.bot.clone(), chat))
    }
}

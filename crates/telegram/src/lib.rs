//! Telegram transport adapter.
//!
//! Receives updates via teloxide long polling, maps them into the wire
//! types the pipeline consumes, and implements the outbound `ChatChannel`
//! seam on top of the Bot API.

pub mod bot;
pub mod channel;
pub mod config;

pub use {
    bot::spawn_polling,
    channel::{TelegramChannelFactory, TelegramChatChannel},
    config::TelegramConfig,
};

//! Seams to the bot's external collaborators.
//!
//! The update pipeline only ever talks to the chat transport, the identity
//! directory, and conversation logic through the traits defined here; the
//! concrete implementations live in their own crates (or in the binary).

pub mod channel;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod identity;

pub use {
    channel::{ChatChannel, ChatChannelFactory, InlineButton},
    conversation::{Conversation, ConversationFactory},
    directory::{DirectoryUser, StaticDirectoryResolver},
    error::{Error, Result},
    identity::{Identity, IdentityResolver, SenderRole},
};

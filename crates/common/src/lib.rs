//! Shared wire-level types used across all deskbot crates.

pub mod types;

pub use types::{
    CallbackQuery, CallbackReceiveResult, ChatId, IncomingMessage, MessageHandle, Update,
    UpdateKind, UserId,
};

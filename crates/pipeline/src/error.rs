use thiserror::Error;

use deskbot_common::MessageHandle;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Message { message: String },

    /// Register-time policy violation: one live redirection per prompt.
    #[error("a reply is already awaited for message {prompt}")]
    DuplicateRedirection { prompt: MessageHandle },

    /// Callback data did not name a known action; no external call was made.
    #[error("unrecognized callback action {data:?}")]
    UnrecognizedCallbackAction { data: String },

    /// A push binding names a receiver that was never registered.
    #[error("unknown callback receiver {id:?}")]
    UnknownReceiver { id: String },

    /// Malformed inline configuration or payload, rejected at ingestion.
    #[error("malformed receiver payload: {reason}")]
    Parse { reason: String },

    #[error(transparent)]
    Channel(#[from] deskbot_channels::Error),

    /// An external system returned non-success; fatal to the current update.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

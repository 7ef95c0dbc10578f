//! Redirection correlator: pending continuations keyed by outbound message
//! handle and callback token.
//!
//! A handler that needs a follow-up free-text reply sends a prompt, then
//! registers a [`Redirection`] keyed on the prompt's handle. When the reply
//! arrives it resolves the redirection — exactly once — and the stored
//! continuation runs instead of normal conversation dispatch. All access
//! happens under the chat's lane, so the table needs no locking of its own.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use deskbot_common::{CallbackReceiveResult, MessageHandle, Update};

use crate::{
    error::{Error, Result},
    receiver::CallbackContext,
};

/// Stored handler invoked when a redirection resolves, completing a
/// multi-step inline action.
#[async_trait]
pub trait Continuation: Send + Sync {
    async fn resume(
        &self,
        update: &Update,
        cx: &mut CallbackContext<'_>,
    ) -> Result<CallbackReceiveResult>;
}

/// A pending correlation between an outbound prompt and its continuation.
pub struct Redirection {
    /// Handle of the prompt message the reply must reference.
    pub prompt: MessageHandle,
    /// Token of the callback query that started the action.
    pub token: String,
    /// Message carrying the inline controls, for button stripping.
    pub origin: Option<MessageHandle>,
    pub continuation: Box<dyn Continuation>,
    pub created_at: Instant,
}

impl Redirection {
    pub fn new(
        prompt: MessageHandle,
        token: impl Into<String>,
        origin: Option<MessageHandle>,
        continuation: Box<dyn Continuation>,
    ) -> Self {
        Self {
            prompt,
            token: token.into(),
            origin,
            continuation,
            created_at: Instant::now(),
        }
    }
}

/// Per-chat table of live redirections.
#[derive(Default)]
pub struct RedirectionTable {
    by_prompt: HashMap<MessageHandle, Redirection>,
    by_token: HashMap<String, MessageHandle>,
}

impl RedirectionTable {
    /// Store a redirection. At most one live entry per prompt handle; a
    /// second registration for the same prompt is a policy violation.
    pub fn register(&mut self, redirection: Redirection) -> Result<()> {
        if self.by_prompt.contains_key(&redirection.prompt) {
            return Err(Error::DuplicateRedirection {
                prompt: redirection.prompt,
            });
        }
        self.by_token
            .insert(redirection.token.clone(), redirection.prompt);
        self.by_prompt.insert(redirection.prompt, redirection);
        Ok(())
    }

    /// Atomically remove and return the redirection awaiting a reply to
    /// `prompt`. Repeat calls return `None`.
    pub fn resolve_by_prompt(&mut self, prompt: MessageHandle) -> Option<Redirection> {
        let redirection = self.by_prompt.remove(&prompt)?;
        self.by_token.remove(&redirection.token);
        Some(redirection)
    }

    /// Atomically remove and return the redirection registered under a
    /// callback token. Repeat calls return `None`.
    pub fn resolve_by_token(&mut self, token: &str) -> Option<Redirection> {
        let prompt = self.by_token.remove(token)?;
        self.by_prompt.remove(&prompt)
    }

    /// Drop redirections older than `ttl`; returns how many were dropped.
    pub fn evict_older_than(&mut self, ttl: Duration) -> usize {
        let before = self.by_prompt.len();
        let now = Instant::now();
        self.by_prompt
            .retain(|_, r| now.duration_since(r.created_at) < ttl);
        self.by_token
            .retain(|_, prompt| self.by_prompt.contains_key(prompt));
        before - self.by_prompt.len()
    }

    pub fn len(&self) -> usize {
        self.by_prompt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prompt.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopContinuation;

    #[async_trait]
    impl Continuation for NoopContinuation {
        async fn resume(
            &self,
            _update: &Update,
            _cx: &mut CallbackContext<'_>,
        ) -> Result<CallbackReceiveResult> {
            Ok(CallbackReceiveResult::None)
        }
    }

    fn redirection(prompt: i32, token: &str) -> Redirection {
        Redirection::new(
            MessageHandle(prompt),
            token,
            Some(MessageHandle(1)),
            Box::new(NoopContinuation),
        )
    }

    #[test]
    fn resolve_by_prompt_consumes_exactly_once() {
        let mut table = RedirectionTable::default();
        table.register(redirection(10, "tok-a")).unwrap();

        assert!(table.resolve_by_prompt(MessageHandle(10)).is_some());
        assert!(table.resolve_by_prompt(MessageHandle(10)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn resolve_by_token_consumes_both_keys() {
        let mut table = RedirectionTable::default();
        table.register(redirection(10, "tok-a")).unwrap();

        assert!(table.resolve_by_token("tok-a").is_some());
        assert!(table.resolve_by_token("tok-a").is_none());
        assert!(table.resolve_by_prompt(MessageHandle(10)).is_none());
    }

    #[test]
    fn duplicate_prompt_registration_fails() {
        let mut table = RedirectionTable::default();
        table.register(redirection(10, "tok-a")).unwrap();

        let err = table.register(redirection(10, "tok-b")).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateRedirection {
                prompt: MessageHandle(10)
            }
        ));
        // The original entry is untouched.
        assert_eq!(table.len(), 1);
        assert!(table.resolve_by_token("tok-a").is_some());
    }

    #[test]
    fn unknown_keys_resolve_to_none() {
        let mut table = RedirectionTable::default();
        assert!(table.resolve_by_prompt(MessageHandle(99)).is_none());
        assert!(table.resolve_by_token("ghost").is_none());
    }

    #[test]
    fn evict_older_than_drops_expired_entries() {
        let mut table = RedirectionTable::default();
        table.register(redirection(10, "tok-a")).unwrap();
        table.register(redirection(11, "tok-b")).unwrap();

        // Age out the first entry.
        if let Some(r) = table.by_prompt.get_mut(&MessageHandle(10)) {
            r.created_at = Instant::now() - Duration::from_secs(120);
        }

        assert_eq!(table.evict_older_than(Duration::from_secs(60)), 1);
        assert!(table.resolve_by_token("tok-a").is_none());
        assert!(table.resolve_by_prompt(MessageHandle(11)).is_some());
    }
}

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Configuration for the bot's Telegram account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to getUpdates.
    pub poll_timeout_secs: u32,

    /// HTTP client timeout; must exceed the long-polling timeout so the
    /// client does not abort the request before Telegram responds.
    pub client_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            client_timeout_secs: 45,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelegramConfig::default();
        assert_eq!(config.poll_timeout_secs, 30);
        assert_eq!(config.client_timeout_secs, 45);
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: TelegramConfig = serde_json::from_str(r#"{"token": "123:ABC"}"#).unwrap();
        assert_eq!(config.token.expose_secret(), "123:ABC");
        assert_eq!(config.poll_timeout_secs, 30);
    }

    #[test]
    fn debug_redacts_token() {
        let config: TelegramConfig = serde_json::from_str(r#"{"token": "123:ABC"}"#).unwrap();
        let printed = format!("{config:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("123:ABC"));
    }
}

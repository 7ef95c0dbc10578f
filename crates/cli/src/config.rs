//! TOML configuration for the deskbot binary.

use std::path::Path;

use {anyhow::Context, secrecy::Secret, serde::Deserialize};

use {
    deskbot_channels::directory::DirectoryUser, deskbot_receivers::ServiceDeskConfig,
    deskbot_telegram::TelegramConfig,
};

/// Eviction and sweep timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Idle time after which a chat context (and its push bindings) is dropped.
    pub context_idle_secs: u64,
    /// Lifetime of an unanswered redirection.
    pub redirection_ttl_secs: u64,
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            context_idle_secs: 86_400,
            redirection_ttl_secs: 3_600,
            sweep_interval_secs: 300,
        }
    }
}

/// Known-senders section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySection {
    pub users: Vec<DirectoryUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub servicedesk: ServiceDeskConfig,
    pub pipeline: PipelineSettings,
    pub directory: DirectorySection,
}

impl Config {
    /// Load the config file, then apply secret overrides from the
    /// environment (`DESKBOT_TELEGRAM_TOKEN`, `DESKBOT_SERVICEDESK_TOKEN`).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if let Ok(token) = std::env::var("DESKBOT_TELEGRAM_TOKEN") {
            config.telegram.token = Secret::new(token);
        }
        if let Ok(token) = std::env::var("DESKBOT_SERVICEDESK_TOKEN") {
            config.servicedesk.auth_token = Secret::new(token);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use {secrecy::ExposeSecret, std::io::Write};

    fn load(contents: &str) -> Config {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        Config::load(file.path()).unwrap()
    }

    #[test]
    fn full_config_parses() {
        let config = load(
            r#"
            [telegram]
            token = "123:ABC"
            poll_timeout_secs = 20

            [servicedesk]
            auth_token = "Basic dGVzdA=="
            portal_id = 9
            reopen_transition_id = "200"
            request_timeout_secs = 10

            [pipeline]
            context_idle_secs = 600
            redirection_ttl_secs = 60
            sweep_interval_secs = 30

            [[directory.users]]
            user_id = 7
            account = "jdoe"
            display_name = "John Doe"
            role = "employee"

            [[directory.users]]
            user_id = 8
            account = "ext.smith"
            display_name = "Kim Smith"
            role = "contractor"
            "#,
        );

        assert_eq!(config.telegram.token.expose_secret(), "123:ABC");
        assert_eq!(config.telegram.poll_timeout_secs, 20);
        assert_eq!(config.servicedesk.portal_id, 9);
        assert_eq!(config.servicedesk.reopen_transition_id, "200");
        assert_eq!(config.pipeline.redirection_ttl_secs, 60);
        assert_eq!(config.directory.users.len(), 2);
        assert_eq!(config.directory.users[1].account, "ext.smith");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = load(
            r#"
            [telegram]
            token = "123:ABC"
            "#,
        );

        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.servicedesk.portal_id, 4);
        assert_eq!(config.servicedesk.reopen_transition_id, "161");
        assert_eq!(config.pipeline.context_idle_secs, 86_400);
        assert!(config.directory.users.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load(Path::new("/nonexistent/deskbot.toml")).is_err());
    }
}

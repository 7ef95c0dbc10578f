//! HTTP client for the service-desk REST surface.
//!
//! Three calls: customer-portal feedback rating, a scriptrunner comment
//! endpoint taking a base64-wrapped JSON body, and the issue transition
//! endpoint used to reopen a request. Every request carries the bot's
//! pre-built Authorization header and is bounded by the configured timeout,
//! so a hung service desk releases the chat's lane with an error instead of
//! stalling the chat forever.

use std::time::Duration;

use {
    base64::Engine,
    reqwest::{StatusCode, header::AUTHORIZATION},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    thiserror::Error,
    tracing::debug,
};

use deskbot_pipeline::{Error as PipelineError, Result};

/// Deployment-level service-desk settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServiceDeskConfig {
    /// Full Authorization header value, e.g. "Basic …".
    pub auth_token: Secret<String>,

    /// Customer-portal id used in feedback URLs.
    pub portal_id: u32,

    /// Workflow transition applied when a request is reopened.
    pub reopen_transition_id: String,

    /// Upper bound on any single service-desk call.
    pub request_timeout_secs: u64,
}

impl Default for ServiceDeskConfig {
    fn default() -> Self {
        Self {
            auth_token: Secret::new(String::new()),
            portal_id: 4,
            reopen_transition_id: "161".into(),
            request_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for ServiceDeskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDeskConfig")
            .field("auth_token", &"[REDACTED]")
            .field("portal_id", &self.portal_id)
            .field("reopen_transition_id", &self.reopen_transition_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
#[error("unexpected status {status}")]
struct UnexpectedStatus {
    status: StatusCode,
}

#[derive(Serialize)]
struct CommentData<'a> {
    #[serde(rename = "authorName")]
    author_name: &'a str,
    #[serde(rename = "issueKey")]
    issue_key: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct CommentPayload {
    data: String,
}

#[derive(Serialize)]
struct TransitionRef<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct TransitionPayload<'a> {
    transition: TransitionRef<'a>,
}

/// Encode the comment body the way the scriptrunner endpoint expects it:
/// base64 over the JSON comment record.
pub(crate) fn encode_comment(author: &str, issue: &str, text: &str) -> String {
    let record = CommentData {
        author_name: author,
        issue_key: issue,
        text,
    };
    // Serializing a struct of strings cannot fail.
    let json = serde_json::to_vec(&record).unwrap_or_default();
    base64::engine::general_purpose::STANDARD.encode(json)
}

/// Client over the service-desk REST endpoints.
///
/// The base URL comes in per call: it is part of the pushed receiver
/// configuration, not of the deployment config.
pub struct ServiceDeskClient {
    http: reqwest::Client,
    auth_token: Secret<String>,
    portal_id: u32,
    reopen_transition_id: String,
}

impl ServiceDeskClient {
    pub fn new(config: &ServiceDeskConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::external("service desk client setup", e))?;
        Ok(Self {
            http,
            auth_token: config.auth_token.clone(),
            portal_id: config.portal_id,
            reopen_transition_id: config.reopen_transition_id.clone(),
        })
    }

    /// Submit a customer-portal feedback rating for an issue.
    pub async fn submit_rating(
        &self,
        base_url: &str,
        issue: &str,
        token: &str,
        rating: u8,
    ) -> Result<()> {
        let url = format!(
            "{base_url}/servicedesk/customer/portal/{portal}/{issue}/feedback",
            portal = self.portal_id,
        );
        debug!(%issue, rating, "submitting feedback rating");
        let response = self
            .http
            .get(&url)
            .query(&[("token", token), ("rating", &rating.to_string())])
            .header(AUTHORIZATION, self.auth_token.expose_secret())
            .send()
            .await
            .map_err(|e| PipelineError::external("rating submission", e))?;
        Self::check("rating submission", response.status())
    }

    /// Append a comment to an issue on behalf of `author`.
    pub async fn add_comment(
        &self,
        base_url: &str,
        issue: &str,
        author: &str,
        text: &str,
    ) -> Result<()> {
        let url = format!("{base_url}/rest/scriptrunner/latest/custom/comment");
        let payload = CommentPayload {
            data: encode_comment(author, issue, text),
        };
        debug!(%issue, author, "adding comment");
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.auth_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::external("comment submission", e))?;
        Self::check("comment submission", response.status())
    }

    /// Apply the configured reopen transition to an issue.
    pub async fn reopen(&self, base_url: &str, issue: &str) -> Result<()> {
        let url = format!("{base_url}/rest/api/2/issue/{issue}/transitions");
        let payload = TransitionPayload {
            transition: TransitionRef {
                id: &self.reopen_transition_id,
            },
        };
        debug!(%issue, transition = %self.reopen_transition_id, "reopening issue");
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.auth_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::external("issue transition", e))?;
        Self::check("issue transition", response.status())
    }

    fn check(context: &str, status: StatusCode) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(PipelineError::external(context, UnexpectedStatus { status }))
        }
    }
}

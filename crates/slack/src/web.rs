use std::time::Duration;

use async_trait::async_trait;
use hearsay_core::adapters::UserDirectory;
use hearsay_core::config::SlackConfig;
use hearsay_core::errors::AdapterError;
use hearsay_core::reply::TransportMessage;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::transport::{ReplySink, TransportError};

const PROVIDER: &str = "slack";

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("failed to build slack http client: {0}")]
    Client(String),
    #[error("slack {method} request failed: {reason}")]
    Http { method: &'static str, reason: String },
    #[error("slack {method} request timed out")]
    Timeout { method: &'static str },
    #[error("slack {method} failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("slack {method} returned a malformed body: {reason}")]
    Decode { method: &'static str, reason: String },
}

impl WebApiError {
    fn into_adapter_error(self) -> AdapterError {
        match self {
            Self::Timeout { .. } => AdapterError::Timeout { provider: PROVIDER },
            Self::Decode { reason, .. } => AdapterError::Decode { provider: PROVIDER, reason },
            other => AdapterError::Transport { provider: PROVIDER, reason: other.to_string() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    team: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    user: Option<UserInfo>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

impl UserInfo {
    /// Slack leaves `display_name` empty for users who never set one.
    fn preferred_name(self) -> Option<String> {
        let profile = self.profile.unwrap_or(UserProfile { display_name: None, real_name: None });
        [profile.display_name, profile.real_name, self.real_name, self.name]
            .into_iter()
            .flatten()
            .map(|name| name.trim().to_owned())
            .find(|name| !name.is_empty())
    }
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a TransportMessage,
}

/// Minimal Slack Web API client: identity lookup, posting, and user names.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Result<Self, WebApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("hearsay-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|error| WebApiError::Client(error.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    /// Resolves the bot's own user id, which classification needs to spot mentions.
    pub async fn auth_test(&self) -> Result<BotIdentity, WebApiError> {
        let method = "auth.test";
        let response: AuthTestResponse = self
            .send(method, self.http.post(self.url(method)).bearer_auth(self.token()))
            .await?;
        if !response.ok {
            return Err(api_error(method, response.error));
        }

        let user_id = response.user_id.filter(|value| !value.trim().is_empty()).ok_or_else(|| {
            WebApiError::Decode { method, reason: "response did not include user_id".to_owned() }
        })?;
        Ok(BotIdentity { user_id, team: response.team })
    }

    pub async fn post_message(
        &self,
        channel_id: &str,
        message: &TransportMessage,
    ) -> Result<(), WebApiError> {
        let method = "chat.postMessage";
        let body = PostMessageRequest { channel: channel_id, message };
        let response: PostMessageResponse = self
            .send(method, self.http.post(self.url(method)).bearer_auth(self.token()).json(&body))
            .await?;
        if !response.ok {
            return Err(api_error(method, response.error));
        }
        debug!(event_name = "egress.slack.message_posted", channel_id, "posted message");
        Ok(())
    }

    pub async fn user_name(&self, user_id: &str) -> Result<Option<String>, WebApiError> {
        let method = "users.info";
        let response: UserInfoResponse = self
            .send(
                method,
                self.http
                    .get(self.url(method))
                    .bearer_auth(self.token())
                    .query(&[("user", user_id)]),
            )
            .await?;
        if !response.ok {
            if response.error.as_deref() == Some("user_not_found") {
                return Ok(None);
            }
            return Err(api_error(method, response.error));
        }
        Ok(response.user.and_then(UserInfo::preferred_name))
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    fn token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    async fn send<T>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, WebApiError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                WebApiError::Timeout { method }
            } else {
                WebApiError::Http { method, reason: error.to_string() }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebApiError::Http { method, reason: format!("status {}", status.as_u16()) });
        }

        response.json::<T>().await.map_err(|error| WebApiError::Decode {
            method,
            reason: error.to_string(),
        })
    }
}

fn api_error(method: &'static str, error: Option<String>) -> WebApiError {
    WebApiError::Api { method, error: error.unwrap_or_else(|| "unknown error".to_string()) }
}

#[async_trait]
impl ReplySink for SlackWebClient {
    async fn post(
        &self,
        channel_id: &str,
        message: &TransportMessage,
    ) -> Result<(), TransportError> {
        self.post_message(channel_id, message).await.map_err(|error| {
            warn!(
                event_name = "egress.slack.post_failed",
                channel_id,
                error = %error,
                "post failed"
            );
            TransportError::Send(error.to_string())
        })
    }
}

#[async_trait]
impl UserDirectory for SlackWebClient {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, AdapterError> {
        self.user_name(user_id).await.map_err(WebApiError::into_adapter_error)
    }
}

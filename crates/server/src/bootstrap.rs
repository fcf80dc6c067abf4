use std::sync::Arc;

use axum::Router;
use hearsay_bot::{BotDeps, BotRuntime, BotSettings};
use hearsay_core::adapters::UserDirectory;
use hearsay_core::config::{AppConfig, ConfigError, LoadOptions};
use hearsay_core::errors::{AdapterError, ConfigurationError};
use hearsay_slack::events::dispatcher_for;
use hearsay_slack::web::{SlackWebClient, WebApiError};
use thiserror::Error;
use tracing::info;

use crate::health::{self, HealthState};
use crate::providers::{place_search, weather_lookup};
use crate::webhook::{self, WebhookState};

pub struct Application {
    pub config: AppConfig,
    pub bot_user_id: String,
    pub runtime: Arc<BotRuntime>,
    pub slack: Arc<SlackWebClient>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] WebApiError),
    #[error("slack rejected the bot token: {0}")]
    SlackAuth(#[source] WebApiError),
    #[error("adapter setup failed: {0}")]
    Adapter(#[from] AdapterError),
    #[error("bot registration failed: {0}")]
    Registration(#[from] ConfigurationError),
}

impl Application {
    /// The Events API webhook and the health endpoint on one router.
    pub fn router(&self) -> Router {
        let dispatcher = Arc::new(dispatcher_for(Arc::clone(&self.runtime)));
        Router::new()
            .merge(webhook::router(WebhookState::new(
                dispatcher,
                self.slack.clone(),
                self.bot_user_id.clone(),
            )))
            .merge(health::router(HealthState::new(Arc::clone(&self.runtime), &self.config)))
    }
}

/// Builds the bot with the configured adapters. Providers without an API key are
/// registered as not configured.
pub fn build_runtime(
    config: &AppConfig,
    users: Arc<dyn UserDirectory>,
) -> Result<BotRuntime, BootstrapError> {
    let deps = BotDeps {
        places: place_search(&config.yelp)?,
        weather: weather_lookup(&config.weather)?,
        users,
    };
    Ok(BotRuntime::new(BotSettings::from(&config.dialogue), deps)?)
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let slack = Arc::new(SlackWebClient::new(&config.slack).map_err(BootstrapError::SlackClient)?);
    let identity = slack.auth_test().await.map_err(BootstrapError::SlackAuth)?;
    info!(
        event_name = "system.bootstrap.slack_identity",
        correlation_id = "bootstrap",
        bot_user_id = %identity.user_id,
        team = identity.team.as_deref().unwrap_or("unknown"),
        "resolved bot identity"
    );

    let users: Arc<dyn UserDirectory> = slack.clone();
    let runtime = Arc::new(build_runtime(&config, users)?);
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        places_configured = config.yelp.api_key.is_some(),
        weather_configured = config.weather.api_key.is_some(),
        "bot runtime initialized"
    );

    Ok(Application { config, bot_user_id: identity.user_id, runtime, slack })
}

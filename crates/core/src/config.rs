use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::TemperatureUnits;
use crate::dialogue::Vocabulary;

pub const DEFAULT_CONFIG_FILE: &str = "hearsay.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub yelp: YelpConfig,
    pub weather: WeatherConfig,
    pub server: ServerConfig,
    pub dialogue: DialogueConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct YelpConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub result_limit: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub units: TemperatureUnits,
    pub country_code: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    pub session_idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub affirmative: Vec<String>,
    pub negative: Vec<String>,
    pub cancel_words: Vec<String>,
    pub cat_gifs: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
    pub yelp_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
    /// Skips the Slack credential check, for runs that never contact Slack.
    pub offline: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

impl Default for DialogueConfig {
    fn default() -> Self {
        let vocabulary = Vocabulary::english();
        Self {
            session_idle_timeout_secs: 600,
            sweep_interval_secs: 60,
            affirmative: vocabulary.affirmative().iter().cloned().collect(),
            negative: vocabulary.negative().iter().cloned().collect(),
            cancel_words: strings(&["cancel", "quit", "nevermind", "never mind"]),
            cat_gifs: strings(&[
                "https://media.giphy.com/media/JIX9t2j0ZTN9S/giphy.gif",
                "https://media.giphy.com/media/mlvseq9yvZhba/giphy.gif",
                "https://media.giphy.com/media/vFKqnCdLPNOKc/giphy.gif",
                "https://media.giphy.com/media/13CoXDiaCcCoyk/giphy.gif",
            ]),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
                request_timeout_secs: 10,
            },
            yelp: YelpConfig {
                api_key: None,
                base_url: "https://api.yelp.com/v3".to_string(),
                result_limit: 3,
                timeout_secs: 10,
            },
            weather: WeatherConfig {
                api_key: None,
                base_url: "https://api.openweathermap.org/data/2.5".to_string(),
                units: TemperatureUnits::Imperial,
                country_code: "us".to_string(),
                timeout_secs: 10,
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 3001 },
            dialogue: DialogueConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl DialogueConfig {
    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::new(&self.affirmative, &self.negative)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        if options.offline {
            config.validate_offline()?;
        } else {
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(slack) = patch.slack {
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = slack.request_timeout_secs {
                self.slack.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(yelp) = patch.yelp {
            if let Some(yelp_api_key_value) = yelp.api_key {
                self.yelp.api_key = Some(secret_value(yelp_api_key_value));
            }
            if let Some(base_url) = yelp.base_url {
                self.yelp.base_url = base_url;
            }
            if let Some(result_limit) = yelp.result_limit {
                self.yelp.result_limit = result_limit;
            }
            if let Some(timeout_secs) = yelp.timeout_secs {
                self.yelp.timeout_secs = timeout_secs;
            }
        }

        if let Some(weather) = patch.weather {
            if let Some(weather_api_key_value) = weather.api_key {
                self.weather.api_key = Some(secret_value(weather_api_key_value));
            }
            if let Some(base_url) = weather.base_url {
                self.weather.base_url = base_url;
            }
            if let Some(units) = weather.units {
                self.weather.units = parse_units("weather.units", &units)?;
            }
            if let Some(country_code) = weather.country_code {
                self.weather.country_code = country_code;
            }
            if let Some(timeout_secs) = weather.timeout_secs {
                self.weather.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(dialogue) = patch.dialogue {
            if let Some(idle) = dialogue.session_idle_timeout_secs {
                self.dialogue.session_idle_timeout_secs = idle;
            }
            if let Some(sweep) = dialogue.sweep_interval_secs {
                self.dialogue.sweep_interval_secs = sweep;
            }
            if let Some(affirmative) = dialogue.affirmative {
                self.dialogue.affirmative = affirmative;
            }
            if let Some(negative) = dialogue.negative {
                self.dialogue.negative = negative;
            }
            if let Some(cancel_words) = dialogue.cancel_words {
                self.dialogue.cancel_words = cancel_words;
            }
            if let Some(cat_gifs) = dialogue.cat_gifs {
                self.dialogue.cat_gifs = cat_gifs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let bot_token = read_env("HEARSAY_SLACK_BOT_TOKEN").or_else(|| read_env("SLACK_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("HEARSAY_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("HEARSAY_SLACK_REQUEST_TIMEOUT_SECS") {
            self.slack.request_timeout_secs =
                parse_u64("HEARSAY_SLACK_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HEARSAY_YELP_API_KEY") {
            self.yelp.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HEARSAY_YELP_BASE_URL") {
            self.yelp.base_url = value;
        }
        if let Some(value) = read_env("HEARSAY_YELP_RESULT_LIMIT") {
            self.yelp.result_limit = parse_u32("HEARSAY_YELP_RESULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("HEARSAY_YELP_TIMEOUT_SECS") {
            self.yelp.timeout_secs = parse_u64("HEARSAY_YELP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HEARSAY_WEATHER_API_KEY") {
            self.weather.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HEARSAY_WEATHER_BASE_URL") {
            self.weather.base_url = value;
        }
        if let Some(value) = read_env("HEARSAY_WEATHER_UNITS") {
            self.weather.units = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "HEARSAY_WEATHER_UNITS".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = read_env("HEARSAY_WEATHER_COUNTRY_CODE") {
            self.weather.country_code = value;
        }
        if let Some(value) = read_env("HEARSAY_WEATHER_TIMEOUT_SECS") {
            self.weather.timeout_secs = parse_u64("HEARSAY_WEATHER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HEARSAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("HEARSAY_SERVER_PORT")
            .map(|value| ("HEARSAY_SERVER_PORT", value))
            .or_else(|| read_env("PORT").map(|value| ("PORT", value)));
        if let Some((key, value)) = port {
            self.server.port = parse_u16(key, &value)?;
        }

        if let Some(value) = read_env("HEARSAY_DIALOGUE_SESSION_IDLE_TIMEOUT_SECS") {
            self.dialogue.session_idle_timeout_secs =
                parse_u64("HEARSAY_DIALOGUE_SESSION_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HEARSAY_DIALOGUE_SWEEP_INTERVAL_SECS") {
            self.dialogue.sweep_interval_secs =
                parse_u64("HEARSAY_DIALOGUE_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("HEARSAY_DIALOGUE_CANCEL_WORDS") {
            self.dialogue.cancel_words = split_list(&value);
        }
        if let Some(value) = read_env("HEARSAY_DIALOGUE_CAT_GIFS") {
            self.dialogue.cat_gifs = split_list(&value);
        }

        let log_level =
            read_env("HEARSAY_LOGGING_LEVEL").or_else(|| read_env("HEARSAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HEARSAY_LOGGING_FORMAT").or_else(|| read_env("HEARSAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(yelp_api_key) = overrides.yelp_api_key {
            self.yelp.api_key = Some(secret_value(yelp_api_key));
        }
        if let Some(weather_api_key) = overrides.weather_api_key {
            self.weather.api_key = Some(secret_value(weather_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot_token(self.slack.bot_token.expose_secret())?;
        self.validate_offline()
    }

    /// Everything [`AppConfig::validate`] checks except the bot token.
    pub fn validate_offline(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_yelp(&self.yelp)?;
        validate_weather(&self.weather)?;
        validate_server(&self.server)?;
        validate_dialogue(&self.dialogue)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_bot_token(bot_token: &str) -> Result<(), ConfigError> {
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used an app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }
    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    validate_http_url("slack.api_base_url", &slack.api_base_url)?;
    validate_timeout("slack.request_timeout_secs", slack.request_timeout_secs)
}

fn validate_yelp(yelp: &YelpConfig) -> Result<(), ConfigError> {
    validate_optional_key("yelp.api_key", yelp.api_key.as_ref())?;
    validate_http_url("yelp.base_url", &yelp.base_url)?;
    if yelp.result_limit == 0 || yelp.result_limit > 50 {
        return Err(ConfigError::Validation(
            "yelp.result_limit must be in range 1..=50".to_string(),
        ));
    }
    validate_timeout("yelp.timeout_secs", yelp.timeout_secs)
}

fn validate_weather(weather: &WeatherConfig) -> Result<(), ConfigError> {
    validate_optional_key("weather.api_key", weather.api_key.as_ref())?;
    validate_http_url("weather.base_url", &weather.base_url)?;
    let country = weather.country_code.trim();
    if country.len() != 2 || !country.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(
            "weather.country_code must be a two-letter ISO 3166 code such as `us`".to_string(),
        ));
    }
    validate_timeout("weather.timeout_secs", weather.timeout_secs)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_dialogue(dialogue: &DialogueConfig) -> Result<(), ConfigError> {
    if dialogue.session_idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "dialogue.session_idle_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if dialogue.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "dialogue.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    let vocabulary = dialogue.vocabulary();
    if vocabulary.affirmative().is_empty() || vocabulary.negative().is_empty() {
        return Err(ConfigError::Validation(
            "dialogue.affirmative and dialogue.negative must each list at least one word"
                .to_string(),
        ));
    }
    if let Some(word) = vocabulary.affirmative().intersection(vocabulary.negative()).next() {
        return Err(ConfigError::Validation(format!(
            "`{word}` appears in both dialogue.affirmative and dialogue.negative"
        )));
    }

    if dialogue.cat_gifs.iter().any(|url| !is_http_url(url)) {
        return Err(ConfigError::Validation(
            "dialogue.cat_gifs entries must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_optional_key(key: &str, value: Option<&SecretString>) -> Result<(), ConfigError> {
    match value {
        Some(secret) if secret.expose_secret().trim().is_empty() => Err(ConfigError::Validation(
            format!("{key} must not be blank; remove it to disable the provider"),
        )),
        _ => Ok(()),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if is_http_url(value) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_units(key: &str, value: &str) -> Result<TemperatureUnits, ConfigError> {
    value.parse().map_err(|reason: String| ConfigError::Validation(format!("{key}: {reason}")))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    yelp: Option<YelpPatch>,
    weather: Option<WeatherPatch>,
    server: Option<ServerPatch>,
    dialogue: Option<DialoguePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct YelpPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    result_limit: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    units: Option<String>,
    country_code: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DialoguePatch {
    session_idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    affirmative: Option<Vec<String>>,
    negative: Option<Vec<String>>,
    cancel_words: Option<Vec<String>>,
    cat_gifs: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

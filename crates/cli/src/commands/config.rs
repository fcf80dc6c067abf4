use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hearsay_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One reported setting: its dotted key, rendered value, and the env vars that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Field {
    Field { key, value: value.to_string(), env_keys }
}

pub fn run() -> String {
    // Offline load: a missing bot token is reported, not rejected.
    let config = match AppConfig::load(LoadOptions { offline: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    render(&config, detect_config_path().as_deref())
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path,
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let slack = &config.slack;
    let yelp = &config.yelp;
    let weather = &config.weather;
    let dialogue = &config.dialogue;

    vec![
        field(
            "slack.bot_token",
            redact_token(slack.bot_token.expose_secret()),
            &["HEARSAY_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
        ),
        field("slack.api_base_url", &slack.api_base_url, &["HEARSAY_SLACK_API_BASE_URL"]),
        field(
            "slack.request_timeout_secs",
            slack.request_timeout_secs,
            &["HEARSAY_SLACK_REQUEST_TIMEOUT_SECS"],
        ),
        field("yelp.api_key", redact_optional(yelp.api_key.as_ref()), &["HEARSAY_YELP_API_KEY"]),
        field("yelp.base_url", &yelp.base_url, &["HEARSAY_YELP_BASE_URL"]),
        field("yelp.result_limit", yelp.result_limit, &["HEARSAY_YELP_RESULT_LIMIT"]),
        field("yelp.timeout_secs", yelp.timeout_secs, &["HEARSAY_YELP_TIMEOUT_SECS"]),
        field(
            "weather.api_key",
            redact_optional(weather.api_key.as_ref()),
            &["HEARSAY_WEATHER_API_KEY"],
        ),
        field("weather.base_url", &weather.base_url, &["HEARSAY_WEATHER_BASE_URL"]),
        field("weather.units", weather.units.as_str(), &["HEARSAY_WEATHER_UNITS"]),
        field("weather.country_code", &weather.country_code, &["HEARSAY_WEATHER_COUNTRY_CODE"]),
        field("weather.timeout_secs", weather.timeout_secs, &["HEARSAY_WEATHER_TIMEOUT_SECS"]),
        field(
            "server.bind_address",
            &config.server.bind_address,
            &["HEARSAY_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port, &["HEARSAY_SERVER_PORT", "PORT"]),
        field(
            "dialogue.session_idle_timeout_secs",
            dialogue.session_idle_timeout_secs,
            &["HEARSAY_DIALOGUE_SESSION_IDLE_TIMEOUT_SECS"],
        ),
        field(
            "dialogue.sweep_interval_secs",
            dialogue.sweep_interval_secs,
            &["HEARSAY_DIALOGUE_SWEEP_INTERVAL_SECS"],
        ),
        field("dialogue.affirmative", dialogue.affirmative.join(", "), &[]),
        field("dialogue.negative", dialogue.negative.join(", "), &[]),
        field(
            "dialogue.cancel_words",
            dialogue.cancel_words.join(", "),
            &["HEARSAY_DIALOGUE_CANCEL_WORDS"],
        ),
        field(
            "dialogue.cat_gifs",
            format!("{} urls", dialogue.cat_gifs.len()),
            &["HEARSAY_DIALOGUE_CAT_GIFS"],
        ),
        field(
            "logging.level",
            &config.logging.level,
            &["HEARSAY_LOGGING_LEVEL", "HEARSAY_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["HEARSAY_LOGGING_FORMAT", "HEARSAY_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_optional(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

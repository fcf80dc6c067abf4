use std::sync::Arc;

use hearsay_core::adapters::Unconfigured;
use hearsay_core::config::{AppConfig, LoadOptions};
use hearsay_server::build_runtime;
use hearsay_slack::web::SlackWebClient;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(LoadOptions::default());
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

/// Providers without an API key are reported as skipped; only failures fail the report.
pub fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_auth(&config));
            checks.push(check_registration(&config));
            checks.push(check_provider(
                "yelp_adapter",
                config.yelp.api_key.is_some(),
                "yelp.api_key",
                "food searches",
            ));
            checks.push(check_provider(
                "weather_adapter",
                config.weather.api_key.is_some(),
                "weather.api_key",
                "weather lookups",
            ));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_auth", "bot_registration", "yelp_adapter", "weather_adapter"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_auth(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "slack_auth",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = SlackWebClient::new(&config.slack).map_err(|error| error.to_string())?;
        client.auth_test().await.map_err(|error| error.to_string())
    });

    match result {
        Ok(identity) => DoctorCheck {
            name: "slack_auth",
            status: CheckStatus::Pass,
            details: format!(
                "authenticated as {} in {}",
                identity.user_id,
                identity.team.as_deref().unwrap_or("an unnamed team")
            ),
        },
        Err(error) => DoctorCheck { name: "slack_auth", status: CheckStatus::Fail, details: error },
    }
}

fn check_registration(config: &AppConfig) -> DoctorCheck {
    match build_runtime(config, Arc::new(Unconfigured { provider: "slack" })) {
        Ok(_) => DoctorCheck {
            name: "bot_registration",
            status: CheckStatus::Pass,
            details: "intents, scripts, and actions registered".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "bot_registration",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_provider(
    name: &'static str,
    configured: bool,
    key: &str,
    feature: &str,
) -> DoctorCheck {
    if configured {
        DoctorCheck { name, status: CheckStatus::Pass, details: format!("{key} is set") }
    } else {
        DoctorCheck {
            name,
            status: CheckStatus::Skipped,
            details: format!("{key} is not set; {feature} will apologize instead of answering"),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

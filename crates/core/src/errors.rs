use thiserror::Error;

use crate::dialogue::{DialogueError, SessionKey};

/// Wiring mistakes in intents or scripts. Raised while registering, never while a
/// conversation is running.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("script `{script}` has no steps")]
    EmptyScript { script: String },
    #[error("script `{script}` declares step `{step}` more than once")]
    DuplicateStep { script: String, step: String },
    #[error("step `{step}` in script `{script}` has no branches")]
    NoBranches { script: String, step: String },
    #[error(
        "default branch of step `{step}` in script `{script}` is at position {position} of {count}; it must be last"
    )]
    DefaultBranchNotLast { script: String, step: String, position: usize, count: usize },
    #[error(
        "branch {branch} of step `{step}` in script `{script}` must end with next, repeat, goto, or stop"
    )]
    MissingControlAction { script: String, step: String, branch: usize },
    #[error("branch {branch} of step `{step}` in script `{script}` has actions after its control action")]
    ActionAfterControl { script: String, step: String, branch: usize },
    #[error("step `{step}` in script `{script}` jumps to unknown step `{target}`")]
    UnknownGotoTarget { script: String, step: String, target: String },
    #[error("script `{script}` invokes unregistered action `{action}`")]
    UnknownAction { script: String, action: String },
    #[error("script `{script}` is registered more than once")]
    DuplicateScript { script: String },
    #[error("intent `{intent}` starts unknown script `{script}`")]
    UnknownScript { intent: String, script: String },
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("intent `{intent}` is registered more than once")]
    DuplicateIntent { intent: String },
    #[error("intent `{intent}` applies to no message contexts")]
    NoContexts { intent: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{input}` is not a postal code (expected 12345 or 12345-6789)")]
    PostalCode { input: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },
    #[error("{provider} request timed out")]
    Timeout { provider: &'static str },
    #[error("{provider} request failed: {reason}")]
    Transport { provider: &'static str, reason: String },
    #[error("{provider} responded with status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider} returned a malformed body: {reason}")]
    Decode { provider: &'static str, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("conversation for {key} was replaced before it finished")]
pub struct SessionConflictError {
    pub key: SessionKey,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BotError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    SessionConflict(#[from] SessionConflictError),
    #[error(transparent)]
    Dialogue(#[from] DialogueError),
}

impl BotError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "That didn't look right. Mind trying again?",
            Self::Adapter(_) => "I couldn't reach that service just now. Try again in a bit.",
            Self::SessionConflict(_) => "Let's start over.",
            Self::Configuration(_) | Self::Dialogue(_) => {
                "Something went wrong on my end, so I dropped that conversation."
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

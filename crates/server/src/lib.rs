//! Hosts the bot behind the Slack Events API.

pub mod bootstrap;
pub mod health;
pub mod providers;
pub mod sweeper;
pub mod webhook;

pub use bootstrap::{bootstrap, bootstrap_with_config, build_runtime, Application, BootstrapError};

//! Bot runtime - the hearsay conversations wired to Slack
//!
//! - **Scripts** (`scripts`) - shipped intents and multi-turn scripts
//! - **Actions** (`actions`) - adapter calls that scripts invoke by name
//! - **Runtime** (`runtime`) - `BotRuntime`, which routes each message to its
//!   conversation or to a matching intent
//! - **Service** (`service`) - `MessageService` implementation for the Slack dispatcher
//!
//! # Key Types
//!
//! - `BotRuntime` - registration happens once in `BotRuntime::new`
//! - `BotDeps` - the place search, weather, and user directory adapters
//! - `BotSettings` - vocabulary, idle timeout, cancel words, cat gifs

pub mod actions;
pub mod runtime;
pub mod scripts;
pub mod service;

pub use runtime::{BotDeps, BotRuntime, BotSettings};

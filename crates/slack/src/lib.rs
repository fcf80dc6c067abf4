//! Slack interface for hearsay.
//!
//! - **Events** (`events`) - Events API model, message classification, dispatch
//! - **Transport** (`transport`) - envelope pump and reply delivery
//! - **Web API** (`web`) - `auth.test`, `chat.postMessage`, `users.info`
//!
//! # Architecture
//!
//! ```text
//! Events API → classify → EventDispatcher → MessageService → replies
//!                                                   ↓
//!                         chat.postMessage ← render_all
//! ```
//!
//! A message is answered when it is a direct message, starts with a mention of the bot,
//! or mentions the bot anywhere. `app_mention` events repeat channel messages and are
//! skipped so each utterance is handled once.

pub mod events;
pub mod transport;
pub mod web;

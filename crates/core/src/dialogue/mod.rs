//! Multi-turn conversations.
//!
//! `states` holds the static script definitions and their registration checks,
//! `conversation` the per-session state machine, and `engine` the session index.

pub mod conversation;
pub mod engine;
pub mod states;

pub use conversation::{
    ActionControl, ActionError, ActionHandler, ActionOutcome, ActionRequest, Conversation,
    DialogueError, NoActions, Turn,
};
pub use engine::{DialogueEngine, SessionKey, StartOutcome, DEFAULT_IDLE_TIMEOUT};
pub use states::{
    normalize_answer, Action, Branch, ConversationState, KeywordSet, Matcher, Script, Step,
    Vocabulary,
};

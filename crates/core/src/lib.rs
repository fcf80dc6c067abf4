pub mod adapters;
pub mod config;
pub mod dialogue;
pub mod errors;
pub mod intents;
pub mod reply;

pub use adapters::{
    PlaceRecord, PlaceSearch, PostalCode, TemperatureUnits, Unconfigured, UserDirectory,
    WeatherLookup, WeatherReport,
};
pub use dialogue::{DialogueEngine, Script, SessionKey, Vocabulary};
pub use errors::{
    AdapterError, BotError, ConfigurationError, SessionConflictError, ValidationError,
};
pub use intents::{InboundMessage, Intent, IntentMatcher, MessageContext};
pub use reply::{Attachment, Card, ReplyPayload, TransportMessage};

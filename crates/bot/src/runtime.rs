use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use hearsay_core::adapters::{PlaceSearch, UserDirectory, WeatherLookup};
use hearsay_core::config::DialogueConfig;
use hearsay_core::dialogue::{normalize_answer, DialogueEngine, Script, SessionKey, Vocabulary};
use hearsay_core::errors::{BotError, ConfigurationError};
use hearsay_core::intents::{InboundMessage, Intent, IntentMatcher};
use hearsay_core::reply::{Card, ReplyPayload};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::actions::BotActions;
use crate::scripts::{default_intents, default_scripts, IntentAction, HELP_TEXT};

const CAT_ACCENT: &str = "#F2C744";

pub struct BotSettings {
    pub vocabulary: Vocabulary,
    pub idle_timeout: Duration,
    pub cancel_words: Vec<String>,
    pub cat_gifs: Vec<String>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::from(&DialogueConfig::default())
    }
}

impl From<&DialogueConfig> for BotSettings {
    fn from(config: &DialogueConfig) -> Self {
        Self {
            vocabulary: config.vocabulary(),
            idle_timeout: config.idle_timeout(),
            cancel_words: config.cancel_words.clone(),
            cat_gifs: config.cat_gifs.clone(),
        }
    }
}

/// The external services the bot talks to.
pub struct BotDeps {
    pub places: Arc<dyn PlaceSearch>,
    pub weather: Arc<dyn WeatherLookup>,
    pub users: Arc<dyn UserDirectory>,
}

/// Routes every inbound message: to its running conversation if the sender has one,
/// otherwise to the first matching intent.
///
/// All intents and scripts are registered and cross-checked in [`BotRuntime::new`];
/// nothing about them changes afterwards.
pub struct BotRuntime {
    intents: IntentMatcher<IntentAction>,
    scripts: HashMap<String, Arc<Script>>,
    engine: DialogueEngine,
    actions: BotActions,
    users: Arc<dyn UserDirectory>,
    cancel_words: BTreeSet<String>,
    cat_gifs: Vec<String>,
}

impl BotRuntime {
    pub fn new(settings: BotSettings, deps: BotDeps) -> Result<Self, ConfigurationError> {
        Self::with_catalog(settings, deps, default_intents()?, default_scripts()?)
    }

    pub fn with_catalog(
        settings: BotSettings,
        deps: BotDeps,
        intents: Vec<Intent<IntentAction>>,
        scripts: Vec<Script>,
    ) -> Result<Self, ConfigurationError> {
        let actions = BotActions::new(deps.places, deps.weather);
        let known_actions = actions.names();

        let mut registered = HashMap::new();
        for script in scripts {
            if let Some(action) =
                script.invoked_actions().into_iter().find(|name| !known_actions.contains(*name))
            {
                return Err(ConfigurationError::UnknownAction {
                    script: script.name().to_owned(),
                    action: action.to_owned(),
                });
            }
            let name = script.name().to_owned();
            if registered.insert(name.clone(), Arc::new(script)).is_some() {
                return Err(ConfigurationError::DuplicateScript { script: name });
            }
        }

        let mut matcher = IntentMatcher::new();
        for intent in intents {
            if let IntentAction::Start(script) = intent.handler() {
                if !registered.contains_key(script) {
                    return Err(ConfigurationError::UnknownScript {
                        intent: intent.id().to_owned(),
                        script: script.clone(),
                    });
                }
            }
            matcher.register(intent)?;
        }

        info!(
            event_name = "bot.runtime.registered",
            intents = matcher.len(),
            scripts = registered.len(),
            "bot runtime ready"
        );

        Ok(Self {
            intents: matcher,
            scripts: registered,
            engine: DialogueEngine::new(settings.vocabulary, settings.idle_timeout),
            actions,
            users: deps.users,
            cancel_words: settings
                .cancel_words
                .iter()
                .map(|word| normalize_answer(word))
                .filter(|word| !word.is_empty())
                .collect(),
            cat_gifs: settings.cat_gifs,
        })
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }

    pub fn active_sessions(&self) -> usize {
        self.engine.active_sessions()
    }

    pub fn sweep_expired(&self) -> usize {
        self.engine.sweep_expired()
    }

    pub fn script(&self, name: &str) -> Option<&Arc<Script>> {
        self.scripts.get(name)
    }

    /// Produces the replies for one message. Never fails: every error becomes a polite
    /// reply and a log line.
    pub async fn handle(&self, message: &InboundMessage) -> Vec<ReplyPayload> {
        let key = message.session_key();
        let is_cancel = self.cancel_words.contains(&normalize_answer(&message.text));

        if self.engine.has_session(&key) {
            if is_cancel {
                self.engine.abort(&key).await;
                return vec![ReplyPayload::text("Okay, I've dropped that conversation.")];
            }

            match self.engine.submit(&key, &message.text, &self.actions).await {
                Ok(Some(turn)) => return turn.replies,
                // The conversation ended or expired since the lookup; treat it as new.
                Ok(None) => {}
                Err(error) => {
                    let error = BotError::from(error);
                    warn!(
                        event_name = "bot.dialogue.failed",
                        session = %key,
                        error = %error,
                        "conversation failed"
                    );
                    return vec![ReplyPayload::text(error.user_message())];
                }
            }
        } else if !message.context.is_addressed() {
            return Vec::new();
        } else if is_cancel {
            return vec![ReplyPayload::text("There's nothing to cancel.")];
        }

        let Some(intent) = self.intents.find(&message.text, message.context) else {
            debug!(event_name = "bot.intent.unmatched", session = %key, "no intent matched");
            return Vec::new();
        };
        debug!(
            event_name = "bot.intent.matched",
            session = %key,
            intent = intent.id(),
            "intent matched"
        );

        match intent.handler() {
            IntentAction::Greet => self.greet(&message.user_id).await,
            IntentAction::Start(script) => self.start(key, script).await,
            IntentAction::CatGif => vec![self.cat_gif()],
            IntentAction::Help => vec![ReplyPayload::text(HELP_TEXT)],
            IntentAction::Fallback => vec![
                ReplyPayload::text("Vox clamantis in deserto."),
                ReplyPayload::text("(I don't understand you)"),
            ],
        }
    }

    async fn greet(&self, user_id: &str) -> Vec<ReplyPayload> {
        let greeting = match self.users.display_name(user_id).await {
            Ok(Some(name)) => format!("Hello, {name}!"),
            Ok(None) => "Hello there!".to_owned(),
            Err(error) => {
                debug!(
                    event_name = "adapter.slack.user_lookup_failed",
                    user_id,
                    error = %error,
                    "falling back to anonymous greeting"
                );
                "Hello there!".to_owned()
            }
        };
        vec![ReplyPayload::text(greeting)]
    }

    async fn start(&self, key: SessionKey, script: &str) -> Vec<ReplyPayload> {
        let Some(script) = self.scripts.get(script) else {
            let error = BotError::from(ConfigurationError::UnknownScript {
                intent: "unknown".to_owned(),
                script: script.to_owned(),
            });
            warn!(event_name = "bot.dialogue.unknown_script", error = %error, "cannot start");
            return vec![ReplyPayload::text(error.user_message())];
        };

        let outcome = self.engine.start(key, Arc::clone(script)).await;
        if let Some(conflict) = outcome.replaced {
            let error = BotError::from(conflict);
            debug!(event_name = "bot.dialogue.restarted", error = %error, "replaced conversation");
        }
        outcome.replies
    }

    fn cat_gif(&self) -> ReplyPayload {
        let Some(url) = self.cat_gifs.choose(&mut rand::thread_rng()) else {
            return ReplyPayload::text("I'm all out of cats right now.");
        };
        Card::new().summary("Here's a cat for you.").image(url.clone()).accent(CAT_ACCENT).into()
    }
}

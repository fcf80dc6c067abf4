use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::dialogue::SessionKey;
use crate::errors::ConfigurationError;

/// How a message reached the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContext {
    DirectMessage,
    DirectMention,
    Mention,
    /// Channel chatter that does not mention the bot. Only an active conversation in
    /// the channel listens to it; intents never do.
    Ambient,
}

impl MessageContext {
    /// The contexts in which the bot is addressed.
    pub const ADDRESSED: [Self; 3] = [Self::DirectMessage, Self::DirectMention, Self::Mention];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectMessage => "direct_message",
            Self::DirectMention => "direct_mention",
            Self::Mention => "mention",
            Self::Ambient => "ambient",
        }
    }

    pub fn is_addressed(self) -> bool {
        self != Self::Ambient
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
    pub context: MessageContext,
}

impl InboundMessage {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.user_id, &self.channel_id)
    }
}

#[derive(Clone, Debug)]
enum Trigger {
    Phrase(Vec<String>),
    Pattern(Regex),
}

impl Trigger {
    fn matches(&self, words: &[String], raw: &str) -> bool {
        match self {
            Self::Phrase(phrase) => {
                words.windows(phrase.len()).any(|window| window == phrase.as_slice())
            }
            Self::Pattern(pattern) => pattern.is_match(raw),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Intent<H> {
    id: String,
    triggers: Vec<Trigger>,
    contexts: BTreeSet<MessageContext>,
    handler: H,
}

impl<H> Intent<H> {
    pub fn builder(id: impl Into<String>, handler: H) -> IntentBuilder<H> {
        IntentBuilder {
            id: id.into(),
            phrases: Vec::new(),
            patterns: Vec::new(),
            contexts: BTreeSet::new(),
            handler,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn is_catch_all(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn applies_to(&self, context: MessageContext) -> bool {
        self.contexts.contains(&context)
    }

    fn hears(&self, words: &[String], raw: &str) -> bool {
        self.is_catch_all() || self.triggers.iter().any(|trigger| trigger.matches(words, raw))
    }
}

pub struct IntentBuilder<H> {
    id: String,
    phrases: Vec<String>,
    patterns: Vec<String>,
    contexts: BTreeSet<MessageContext>,
    handler: H,
}

impl<H> IntentBuilder<H> {
    /// Phrases match case-insensitively on whole words anywhere in the message.
    /// A phrase with no words (such as `""`) adds nothing.
    pub fn hears<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phrases.extend(phrases.into_iter().map(Into::into));
        self
    }

    /// A case-insensitive regular expression tested against the raw message.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn contexts<I>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = MessageContext>,
    {
        self.contexts.extend(contexts);
        self
    }

    pub fn build(self) -> Result<Intent<H>, ConfigurationError> {
        if self.contexts.is_empty() {
            return Err(ConfigurationError::NoContexts { intent: self.id });
        }

        let mut triggers = self
            .phrases
            .iter()
            .map(|phrase| words(phrase))
            .filter(|phrase| !phrase.is_empty())
            .map(Trigger::Phrase)
            .collect::<Vec<_>>();

        for pattern in &self.patterns {
            let compiled = RegexBuilder::new(pattern).case_insensitive(true).build().map_err(
                |error| ConfigurationError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: error.to_string(),
                },
            )?;
            triggers.push(Trigger::Pattern(compiled));
        }

        Ok(Intent { id: self.id, triggers, contexts: self.contexts, handler: self.handler })
    }
}

/// Registered intents, looked up read-only for every inbound message.
///
/// Intents with triggers are tried in registration order; catch-all intents only
/// after every one of them missed, however they were registered.
pub struct IntentMatcher<H> {
    specific: Vec<Intent<H>>,
    catch_all: Vec<Intent<H>>,
}

impl<H> Default for IntentMatcher<H> {
    fn default() -> Self {
        Self { specific: Vec::new(), catch_all: Vec::new() }
    }
}

impl<H> IntentMatcher<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, intent: Intent<H>) -> Result<(), ConfigurationError> {
        let duplicate = self.iter().any(|existing| existing.id == intent.id);
        if duplicate {
            return Err(ConfigurationError::DuplicateIntent { intent: intent.id });
        }

        if intent.is_catch_all() {
            self.catch_all.push(intent);
        } else {
            self.specific.push(intent);
        }
        Ok(())
    }

    pub fn find(&self, utterance: &str, context: MessageContext) -> Option<&Intent<H>> {
        if !context.is_addressed() {
            return None;
        }
        let words = words(utterance);
        self.specific
            .iter()
            .chain(self.catch_all.iter())
            .find(|intent| intent.applies_to(context) && intent.hears(&words, utterance))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent<H>> {
        self.specific.iter().chain(self.catch_all.iter())
    }

    pub fn len(&self) -> usize {
        self.specific.len() + self.catch_all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|ch: char| !(ch.is_alphanumeric() || ch == '\''))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

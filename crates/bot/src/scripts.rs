//! The conversations and intents the bot ships with.

use hearsay_core::adapters::POSTAL_CODE_PATTERN;
use hearsay_core::dialogue::{Action, Branch, Script, Step};
use hearsay_core::errors::ConfigurationError;
use hearsay_core::intents::{Intent, MessageContext};

use crate::actions::{CURRENT_WEATHER, SEARCH_PLACES};

pub const FOOD_SCRIPT: &str = "food";
pub const WEATHER_SCRIPT: &str = "weather";

/// What a matched intent does. Intents that start a conversation name the script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentAction {
    Greet,
    Start(String),
    CatGif,
    Help,
    Fallback,
}

pub const HELP_TEXT: &str = "Here's what I can do:\n\
    • say hello and I'll greet you by name\n\
    • tell me you're hungry and I'll find food near you\n\
    • ask about the weather and I'll check a zip code\n\
    • mention cats and I'll find you one\n\
    • say cancel to drop a conversation we started";

pub fn food_script() -> Result<Script, ConfigurationError> {
    Script::new(
        FOOD_SCRIPT,
        vec![
            Step::new("offer", "Would you like food recommendations near you?")
                .branch(Branch::no(vec![
                    Action::say("So what do you want from me???"),
                    Action::Stop,
                ]))
                .branch(Branch::yes(vec![Action::say("Sweet!"), Action::Next]))
                .branch(Branch::otherwise(vec![
                    Action::say("Be civilized. Answer the question."),
                    Action::Repeat,
                ])),
            Step::new("type", "What type of food would you like?").branch(Branch::otherwise(vec![
                Action::Capture,
                Action::say("Ok."),
                Action::Next,
            ])),
            Step::new("location", "Where are you?").branch(Branch::otherwise(vec![
                Action::Capture,
                Action::say("Ok! Let me look that up for you:"),
                Action::invoke(SEARCH_PLACES),
                Action::Next,
            ])),
        ],
    )
}

pub fn weather_script() -> Result<Script, ConfigurationError> {
    Script::new(
        WEATHER_SCRIPT,
        vec![Step::new("zip", "What zip code should I check the weather for?")
            .branch(Branch::no(vec![Action::say("Okay, no weather then."), Action::Stop]))
            .branch(Branch::pattern(
                POSTAL_CODE_PATTERN,
                vec![Action::Capture, Action::invoke(CURRENT_WEATHER), Action::Next],
            )?)
            .branch(Branch::otherwise(vec![
                Action::say("That doesn't look like a zip code. Try five digits, like 03755."),
                Action::Repeat,
            ]))],
    )
}

pub fn default_scripts() -> Result<Vec<Script>, ConfigurationError> {
    Ok(vec![food_script()?, weather_script()?])
}

pub fn default_intents() -> Result<Vec<Intent<IntentAction>>, ConfigurationError> {
    Ok(vec![
        Intent::builder("greeting", IntentAction::Greet)
            .hears(["hello", "hi", "howdy", "hey"])
            .contexts(MessageContext::ADDRESSED)
            .build()?,
        Intent::builder("food", IntentAction::Start(FOOD_SCRIPT.to_owned()))
            .hears(["hungry", "hunger", "food"])
            .contexts(MessageContext::ADDRESSED)
            .build()?,
        Intent::builder("weather", IntentAction::Start(WEATHER_SCRIPT.to_owned()))
            .hears(["weather", "forecast", "temperature"])
            .contexts(MessageContext::ADDRESSED)
            .build()?,
        Intent::builder("cats", IntentAction::CatGif)
            .hears(["cat", "cats", "kitten", "kitty"])
            .contexts(MessageContext::ADDRESSED)
            .build()?,
        Intent::builder("help", IntentAction::Help)
            .hears(["help"])
            .contexts([MessageContext::DirectMessage, MessageContext::DirectMention])
            .build()?,
        Intent::builder("fallback", IntentAction::Fallback)
            .hears([""])
            .contexts(MessageContext::ADDRESSED)
            .build()?,
    ])
}

#[cfg(test)]
mod tests {
    use super::{default_intents, food_script, weather_script, IntentAction};
    use hearsay_core::dialogue::Vocabulary;

    #[test]
    fn shipped_scripts_register() {
        let food = food_script().expect("food script");
        let weather = weather_script().expect("weather script");

        assert_eq!(food.steps().len(), 3);
        assert_eq!(food.invoked_actions().into_iter().collect::<Vec<_>>(), vec!["search_places"]);
        assert_eq!(
            weather.invoked_actions().into_iter().collect::<Vec<_>>(),
            vec!["current_weather"]
        );
    }

    #[test]
    fn zip_step_routes_valid_and_invalid_answers_differently() {
        let weather = weather_script().expect("weather script");
        let zip = weather.step(0).expect("zip step");
        let vocabulary = Vocabulary::default();

        let valid = zip.select("03755", &vocabulary).expect("branch");
        let invalid = zip.select("abc", &vocabulary).expect("branch");
        let declined = zip.select("nope", &vocabulary).expect("branch");

        assert!(!valid.matcher().is_default());
        assert!(invalid.matcher().is_default());
        assert!(!declined.matcher().is_default());
        assert_ne!(valid.actions(), declined.actions());
    }

    #[test]
    fn shipped_intents_have_one_catch_all() {
        let intents = default_intents().expect("intents");

        let catch_all = intents.iter().filter(|intent| intent.is_catch_all()).collect::<Vec<_>>();
        assert_eq!(catch_all.len(), 1);
        assert_eq!(catch_all[0].handler(), &IntentAction::Fallback);
    }
}

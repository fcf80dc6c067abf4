use std::collections::{BTreeSet, HashSet};

use regex::Regex;

use crate::errors::ConfigurationError;
use crate::reply::ReplyPayload;

/// Affirmative and negative utterances used by keyword branches.
///
/// Entries are stored normalized, so `"Yes"` and `"yes!"` configure the same word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    affirmative: BTreeSet<String>,
    negative: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new<A, N, S>(affirmative: A, negative: N) -> Self
    where
        A: IntoIterator<Item = S>,
        N: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { affirmative: normalize_all(affirmative), negative: normalize_all(negative) }
    }

    pub fn english() -> Self {
        Self::new(
            ["yes", "yea", "yup", "yep", "ya", "sure", "ok", "okay", "y", "yeah", "yah", "yes please"],
            ["no", "nah", "nope", "n", "no thanks", "not really"],
        )
    }

    pub fn is_affirmative(&self, answer: &str) -> bool {
        self.affirmative.contains(&normalize_answer(answer))
    }

    pub fn is_negative(&self, answer: &str) -> bool {
        self.negative.contains(&normalize_answer(answer))
    }

    pub fn affirmative(&self) -> &BTreeSet<String> {
        &self.affirmative
    }

    pub fn negative(&self) -> &BTreeSet<String> {
        &self.negative
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::english()
    }
}

/// Lower-cases, trims, and drops trailing `.`, `!`, `?` so keyword tests compare whole
/// messages.
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().trim_end_matches(['.', '!', '?']).trim_end().to_lowercase()
}

fn normalize_all<I, S>(words: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|word| normalize_answer(word.as_ref()))
        .filter(|word| !word.is_empty())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeywordSet {
    Affirmative,
    Negative,
    Custom(BTreeSet<String>),
}

#[derive(Clone, Debug)]
pub enum Matcher {
    Keyword(KeywordSet),
    Regex(Regex),
    Default,
}

impl Matcher {
    pub fn matches(&self, answer: &str, vocabulary: &Vocabulary) -> bool {
        match self {
            Self::Keyword(KeywordSet::Affirmative) => vocabulary.is_affirmative(answer),
            Self::Keyword(KeywordSet::Negative) => vocabulary.is_negative(answer),
            Self::Keyword(KeywordSet::Custom(words)) => words.contains(&normalize_answer(answer)),
            Self::Regex(pattern) => pattern.is_match(answer),
            Self::Default => true,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Say(ReplyPayload),
    /// Store the trimmed answer under the current step's name.
    Capture,
    /// Run a named action on the host and wait for it before continuing.
    Invoke(String),
    Next,
    Repeat,
    Goto(String),
    Stop,
}

impl Action {
    pub fn say(payload: impl Into<ReplyPayload>) -> Self {
        Self::Say(payload.into())
    }

    pub fn invoke(name: impl Into<String>) -> Self {
        Self::Invoke(name.into())
    }

    pub fn goto(step: impl Into<String>) -> Self {
        Self::Goto(step.into())
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Self::Next | Self::Repeat | Self::Goto(_) | Self::Stop)
    }
}

#[derive(Clone, Debug)]
pub struct Branch {
    matcher: Matcher,
    actions: Vec<Action>,
}

impl Branch {
    pub fn new(matcher: Matcher, actions: Vec<Action>) -> Self {
        Self { matcher, actions }
    }

    pub fn yes(actions: Vec<Action>) -> Self {
        Self::new(Matcher::Keyword(KeywordSet::Affirmative), actions)
    }

    pub fn no(actions: Vec<Action>) -> Self {
        Self::new(Matcher::Keyword(KeywordSet::Negative), actions)
    }

    pub fn keywords<I, S>(words: I, actions: Vec<Action>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(Matcher::Keyword(KeywordSet::Custom(normalize_all(words))), actions)
    }

    pub fn pattern(pattern: &str, actions: Vec<Action>) -> Result<Self, ConfigurationError> {
        let compiled = Regex::new(pattern).map_err(|error| ConfigurationError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: error.to_string(),
        })?;
        Ok(Self::new(Matcher::Regex(compiled), actions))
    }

    /// Matches any answer; must be the last branch of its step.
    pub fn otherwise(actions: Vec<Action>) -> Self {
        Self::new(Matcher::Default, actions)
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

#[derive(Clone, Debug)]
pub struct Step {
    name: String,
    prompt: ReplyPayload,
    branches: Vec<Branch>,
}

impl Step {
    pub fn new(name: impl Into<String>, prompt: impl Into<ReplyPayload>) -> Self {
        Self { name: name.into(), prompt: prompt.into(), branches: Vec::new() }
    }

    pub fn branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &ReplyPayload {
        &self.prompt
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn select(&self, answer: &str, vocabulary: &Vocabulary) -> Option<&Branch> {
        self.branches.iter().find(|branch| branch.matcher.matches(answer, vocabulary))
    }
}

/// A validated, named sequence of steps. Only constructible through [`Script::new`], so
/// every script in a running engine is known to be well wired.
#[derive(Clone, Debug)]
pub struct Script {
    name: String,
    steps: Vec<Step>,
}

impl Script {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate_steps(&name, &steps)?;
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn position(&self, step_name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == step_name)
    }

    pub fn invoked_actions(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .flat_map(|step| step.branches.iter())
            .flat_map(|branch| branch.actions.iter())
            .filter_map(|action| match action {
                Action::Invoke(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn validate_steps(script: &str, steps: &[Step]) -> Result<(), ConfigurationError> {
    if steps.is_empty() {
        return Err(ConfigurationError::EmptyScript { script: script.to_owned() });
    }

    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.name.as_str()) {
            return Err(ConfigurationError::DuplicateStep {
                script: script.to_owned(),
                step: step.name.clone(),
            });
        }
    }

    for step in steps {
        validate_branches(script, step, &seen)?;
    }
    Ok(())
}

fn validate_branches(
    script: &str,
    step: &Step,
    step_names: &HashSet<&str>,
) -> Result<(), ConfigurationError> {
    let count = step.branches.len();
    if count == 0 {
        return Err(ConfigurationError::NoBranches {
            script: script.to_owned(),
            step: step.name.clone(),
        });
    }

    for (index, branch) in step.branches.iter().enumerate() {
        let position = index + 1;
        if branch.matcher.is_default() && position != count {
            return Err(ConfigurationError::DefaultBranchNotLast {
                script: script.to_owned(),
                step: step.name.clone(),
                position,
                count,
            });
        }

        let Some((last, leading)) = branch.actions.split_last() else {
            return Err(ConfigurationError::MissingControlAction {
                script: script.to_owned(),
                step: step.name.clone(),
                branch: position,
            });
        };
        if !last.is_control() {
            return Err(ConfigurationError::MissingControlAction {
                script: script.to_owned(),
                step: step.name.clone(),
                branch: position,
            });
        }
        if leading.iter().any(Action::is_control) {
            return Err(ConfigurationError::ActionAfterControl {
                script: script.to_owned(),
                step: step.name.clone(),
                branch: position,
            });
        }

        for action in &branch.actions {
            if let Action::Goto(target) = action {
                if !step_names.contains(target.as_str()) {
                    return Err(ConfigurationError::UnknownGotoTarget {
                        script: script.to_owned(),
                        step: step.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingAnswer(usize),
    Completed,
    Aborted,
}

impl ConversationState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::AwaitingAnswer(_))
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::dialogue::states::{Action, ConversationState, Script, Vocabulary};
use crate::reply::ReplyPayload;

/// What an invoked action sees: the step it was invoked from, the answer that triggered
/// it, and every answer captured so far.
#[derive(Clone, Copy, Debug)]
pub struct ActionRequest<'a> {
    pub name: &'a str,
    pub step: &'a str,
    pub answer: &'a str,
    pub answers: &'a BTreeMap<String, String>,
}

impl ActionRequest<'_> {
    pub fn captured(&self, step: &str) -> Result<&str, ActionError> {
        self.answers
            .get(step)
            .map(String::as_str)
            .ok_or_else(|| ActionError::MissingAnswer(step.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionControl {
    Continue,
    /// End the conversation after emitting the action's replies.
    Stop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub replies: Vec<ReplyPayload>,
    pub control: ActionControl,
}

impl ActionOutcome {
    pub fn proceed(replies: Vec<ReplyPayload>) -> Self {
        Self { replies, control: ActionControl::Continue }
    }

    pub fn stop(replies: Vec<ReplyPayload>) -> Self {
        Self { replies, control: ActionControl::Stop }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("no action named `{0}` is registered")]
    Unknown(String),
    #[error("answer for step `{0}` was never captured")]
    MissingAnswer(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("conversation is no longer active")]
    Closed,
    #[error("action failed during step `{step}`: {source}")]
    Action { step: String, source: ActionError },
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, request: ActionRequest<'_>) -> Result<ActionOutcome, ActionError>;
}

/// Handler for scripts that never invoke anything.
pub struct NoActions;

#[async_trait]
impl ActionHandler for NoActions {
    async fn invoke(&self, request: ActionRequest<'_>) -> Result<ActionOutcome, ActionError> {
        Err(ActionError::Unknown(request.name.to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub replies: Vec<ReplyPayload>,
    pub state: ConversationState,
}

/// One running script. Once the state leaves `AwaitingAnswer` the conversation is inert:
/// further answers are refused and nothing about it changes.
#[derive(Debug)]
pub struct Conversation {
    script: Arc<Script>,
    state: ConversationState,
    answers: BTreeMap<String, String>,
    last_activity: Instant,
}

impl Conversation {
    pub fn start(script: Arc<Script>) -> (Self, Vec<ReplyPayload>) {
        let replies = script.step(0).map(|step| vec![step.prompt().clone()]).unwrap_or_default();
        let state = if replies.is_empty() {
            ConversationState::Completed
        } else {
            ConversationState::AwaitingAnswer(0)
        };
        let conversation =
            Self { script, state, answers: BTreeMap::new(), last_activity: Instant::now() };
        (conversation, replies)
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub fn abort(&mut self) {
        self.state = ConversationState::Aborted;
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    pub async fn submit<H>(
        &mut self,
        answer: &str,
        vocabulary: &Vocabulary,
        handler: &H,
    ) -> Result<Turn, DialogueError>
    where
        H: ActionHandler + ?Sized,
    {
        let ConversationState::AwaitingAnswer(index) = self.state else {
            return Err(DialogueError::Closed);
        };
        let script = Arc::clone(&self.script);
        let Some(step) = script.step(index) else {
            self.state = ConversationState::Completed;
            return Err(DialogueError::Closed);
        };
        self.last_activity = Instant::now();

        let mut replies = Vec::new();
        let Some(branch) = step.select(answer, vocabulary) else {
            replies.push(step.prompt().clone());
            return Ok(self.turn(replies));
        };

        for action in branch.actions() {
            match action {
                Action::Say(payload) => replies.push(payload.clone()),
                Action::Capture => {
                    self.answers.insert(step.name().to_owned(), answer.trim().to_owned());
                }
                Action::Invoke(name) => {
                    let request = ActionRequest {
                        name,
                        step: step.name(),
                        answer,
                        answers: &self.answers,
                    };
                    match handler.invoke(request).await {
                        Ok(outcome) => {
                            replies.extend(outcome.replies);
                            if outcome.control == ActionControl::Stop {
                                self.state = ConversationState::Completed;
                                break;
                            }
                        }
                        Err(source) => {
                            self.state = ConversationState::Aborted;
                            return Err(DialogueError::Action {
                                step: step.name().to_owned(),
                                source,
                            });
                        }
                    }
                }
                Action::Next => self.enter(index + 1, &mut replies),
                Action::Repeat => replies.push(step.prompt().clone()),
                Action::Goto(target) => match script.position(target) {
                    Some(position) => self.enter(position, &mut replies),
                    None => self.state = ConversationState::Aborted,
                },
                Action::Stop => self.state = ConversationState::Completed,
            }
        }

        Ok(self.turn(replies))
    }

    fn enter(&mut self, index: usize, replies: &mut Vec<ReplyPayload>) {
        match self.script.step(index) {
            Some(step) => {
                replies.push(step.prompt().clone());
                self.state = ConversationState::AwaitingAnswer(index);
            }
            None => self.state = ConversationState::Completed,
        }
    }

    fn turn(&self, replies: Vec<ReplyPayload>) -> Turn {
        Turn { replies, state: self.state }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{
        ActionError, ActionHandler, ActionOutcome, ActionRequest, Conversation, DialogueError,
        NoActions,
    };
    use crate::dialogue::states::{Action, Branch, ConversationState, Script, Step, Vocabulary};
    use crate::reply::ReplyPayload;

    #[derive(Default)]
    struct RecordingHandler {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
        stop: bool,
    }

    #[async_trait]
    impl ActionHandler for RecordingHandler {
        async fn invoke(&self, request: ActionRequest<'_>) -> Result<ActionOutcome, ActionError> {
            let term = request.captured("type")?.to_owned();
            self.calls.lock().expect("calls").push((request.name.to_owned(), term.clone()));
            if self.fail {
                return Err(ActionError::Failed("boom".to_owned()));
            }
            let replies = vec![ReplyPayload::text(format!("results for {term}"))];
            Ok(if self.stop { ActionOutcome::stop(replies) } else { ActionOutcome::proceed(replies) })
        }
    }

    fn text(value: &str) -> ReplyPayload {
        ReplyPayload::text(value)
    }

    fn two_defaults() -> Arc<Script> {
        Arc::new(
            Script::new(
                "ab",
                vec![
                    Step::new("a", "askA").branch(Branch::otherwise(vec![Action::Next])),
                    Step::new("b", "askB").branch(Branch::otherwise(vec![Action::Next])),
                ],
            )
            .expect("script"),
        )
    }

    fn food() -> Arc<Script> {
        Arc::new(
            Script::new(
                "food",
                vec![
                    Step::new("want", "Would you like food recommendations near you?")
                        .branch(Branch::no(vec![Action::say("So what do you want from me???"), Action::Stop]))
                        .branch(Branch::yes(vec![Action::say("Sweet!"), Action::Next]))
                        .branch(Branch::otherwise(vec![
                            Action::say("Be civilized. Answer the question."),
                            Action::Repeat,
                        ])),
                    Step::new("type", "What type of food would you like?")
                        .branch(Branch::otherwise(vec![Action::Capture, Action::say("Ok."), Action::Next])),
                    Step::new("where", "Where are you?").branch(Branch::otherwise(vec![
                        Action::Capture,
                        Action::invoke("search"),
                        Action::Next,
                    ])),
                ],
            )
            .expect("script"),
        )
    }

    #[tokio::test]
    async fn default_next_steps_complete_after_exactly_two_answers() {
        for answers in [["x", "y"], ["yes", "no"], ["", "🍕"]] {
            let (mut conversation, prompts) = Conversation::start(two_defaults());
            assert_eq!(prompts, vec![text("askA")]);

            let first = conversation
                .submit(answers[0], &Vocabulary::default(), &NoActions)
                .await
                .expect("first answer");
            assert_eq!(first.state, ConversationState::AwaitingAnswer(1));
            assert_eq!(first.replies, vec![text("askB")]);

            let second = conversation
                .submit(answers[1], &Vocabulary::default(), &NoActions)
                .await
                .expect("second answer");
            assert_eq!(second.state, ConversationState::Completed);
            assert!(second.replies.is_empty());
        }
    }

    #[tokio::test]
    async fn answers_after_completion_are_refused_without_mutation() {
        let (mut conversation, _) = Conversation::start(two_defaults());
        let vocabulary = Vocabulary::default();
        conversation.submit("1", &vocabulary, &NoActions).await.expect("1");
        conversation.submit("2", &vocabulary, &NoActions).await.expect("2");

        let error = conversation.submit("3", &vocabulary, &NoActions).await.expect_err("closed");
        assert_eq!(error, DialogueError::Closed);
        assert_eq!(conversation.state(), ConversationState::Completed);
        assert!(conversation.answers().is_empty());
    }

    #[tokio::test]
    async fn answers_after_abort_are_refused() {
        let (mut conversation, _) = Conversation::start(food());
        conversation.abort();

        let error = conversation
            .submit("yes", &Vocabulary::default(), &NoActions)
            .await
            .expect_err("aborted");

        assert_eq!(error, DialogueError::Closed);
        assert_eq!(conversation.state(), ConversationState::Aborted);
    }

    #[tokio::test]
    async fn unrecognized_answer_says_and_repeats() {
        let (mut conversation, _) = Conversation::start(food());

        let turn = conversation
            .submit("what?", &Vocabulary::default(), &NoActions)
            .await
            .expect("turn");

        assert_eq!(turn.state, ConversationState::AwaitingAnswer(0));
        assert_eq!(
            turn.replies,
            vec![
                text("Be civilized. Answer the question."),
                text("Would you like food recommendations near you?"),
            ]
        );
    }

    #[tokio::test]
    async fn negative_answer_stops_the_conversation() {
        let (mut conversation, _) = Conversation::start(food());

        let turn = conversation.submit("Nope", &Vocabulary::default(), &NoActions).await.expect("turn");

        assert_eq!(turn.state, ConversationState::Completed);
        assert_eq!(turn.replies, vec![text("So what do you want from me???")]);
    }

    #[tokio::test]
    async fn full_flow_captures_answers_and_invokes_action() {
        let handler = RecordingHandler::default();
        let vocabulary = Vocabulary::default();
        let (mut conversation, _) = Conversation::start(food());

        let turn = conversation.submit("yes!", &vocabulary, &handler).await.expect("yes");
        assert_eq!(turn.replies, vec![text("Sweet!"), text("What type of food would you like?")]);

        let turn = conversation.submit(" pizza ", &vocabulary, &handler).await.expect("type");
        assert_eq!(turn.replies, vec![text("Ok."), text("Where are you?")]);

        let turn = conversation.submit("Hanover, NH", &vocabulary, &handler).await.expect("where");
        assert_eq!(turn.state, ConversationState::Completed);
        assert_eq!(turn.replies, vec![text("results for pizza")]);
        assert_eq!(conversation.answers().get("where").map(String::as_str), Some("Hanover, NH"));
        assert_eq!(
            handler.calls.lock().expect("calls").clone(),
            vec![("search".to_owned(), "pizza".to_owned())]
        );
    }

    #[tokio::test]
    async fn failing_action_aborts_and_surfaces_error() {
        let handler = RecordingHandler { fail: true, ..RecordingHandler::default() };
        let vocabulary = Vocabulary::default();
        let (mut conversation, _) = Conversation::start(food());
        conversation.submit("yes", &vocabulary, &handler).await.expect("yes");
        conversation.submit("pizza", &vocabulary, &handler).await.expect("type");

        let error = conversation.submit("Hanover", &vocabulary, &handler).await.expect_err("fails");

        assert!(matches!(error, DialogueError::Action { ref step, .. } if step == "where"));
        assert_eq!(conversation.state(), ConversationState::Aborted);
    }

    #[tokio::test]
    async fn action_can_end_the_conversation_early() {
        let script = Arc::new(
            Script::new(
                "stoppable",
                vec![
                    Step::new("type", "type?").branch(Branch::otherwise(vec![
                        Action::Capture,
                        Action::invoke("search"),
                        Action::Next,
                    ])),
                    Step::new("never", "never asked").branch(Branch::otherwise(vec![Action::Next])),
                ],
            )
            .expect("script"),
        );
        let handler = RecordingHandler { stop: true, ..RecordingHandler::default() };
        let (mut conversation, _) = Conversation::start(script);

        let turn = conversation.submit("tacos", &Vocabulary::default(), &handler).await.expect("turn");

        assert_eq!(turn.state, ConversationState::Completed);
        assert_eq!(turn.replies, vec![text("results for tacos")]);
    }

    #[tokio::test]
    async fn goto_jumps_to_named_step() {
        let script = Arc::new(
            Script::new(
                "loop",
                vec![
                    Step::new("first", "first?").branch(Branch::otherwise(vec![Action::Next])),
                    Step::new("second", "second?")
                        .branch(Branch::keywords(["again"], vec![Action::goto("first")]))
                        .branch(Branch::otherwise(vec![Action::Stop])),
                ],
            )
            .expect("script"),
        );
        let (mut conversation, _) = Conversation::start(script);
        let vocabulary = Vocabulary::default();
        conversation.submit("go", &vocabulary, &NoActions).await.expect("go");

        let turn = conversation.submit("Again", &vocabulary, &NoActions).await.expect("again");

        assert_eq!(turn.state, ConversationState::AwaitingAnswer(0));
        assert_eq!(turn.replies, vec![text("first?")]);
    }

    #[tokio::test]
    async fn step_without_default_reprompts_on_no_match() {
        let script = Arc::new(
            Script::new(
                "strict",
                vec![Step::new("confirm", "yes or no?")
                    .branch(Branch::yes(vec![Action::Stop]))
                    .branch(Branch::no(vec![Action::Stop]))],
            )
            .expect("script"),
        );
        let (mut conversation, _) = Conversation::start(script);

        let turn = conversation.submit("maybe", &Vocabulary::default(), &NoActions).await.expect("turn");

        assert_eq!(turn.state, ConversationState::AwaitingAnswer(0));
        assert_eq!(turn.replies, vec![text("yes or no?")]);
    }
}

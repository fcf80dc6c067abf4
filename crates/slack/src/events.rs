use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use hearsay_core::intents::{InboundMessage, MessageContext};
use hearsay_core::reply::{render_all, ReplyPayload, TransportMessage};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(InboundMessage),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    Unsupported,
}

/// The `event_callback` body the Events API delivers.
#[derive(Clone, Debug, Deserialize)]
pub struct EventCallback {
    #[serde(default)]
    pub event_id: Option<String>,
    pub event: RawEvent,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl SlackEnvelope {
    /// Builds the envelope for one callback. Anything the bot should not answer becomes
    /// `Unsupported`, tagged with why it was skipped.
    pub fn from_callback(callback: EventCallback, bot_user_id: &str) -> Self {
        let envelope_id = callback
            .event_id
            .clone()
            .or_else(|| callback.event.ts.clone())
            .unwrap_or_else(|| "unknown-event-id".to_owned());
        let event = match classify(&callback.event, bot_user_id) {
            Ok(message) => SlackEvent::Message(message),
            Err(skipped) => SlackEvent::Unsupported { event_type: skipped.to_owned() },
        };
        Self { envelope_id, event }
    }
}

/// Decides how a raw event reached the bot. Channel messages without a mention come
/// back as `Ambient`, since they may answer a conversation already running there.
///
/// Returns the reason as `Err` when the event is ignored.
pub fn classify(event: &RawEvent, bot_user_id: &str) -> Result<InboundMessage, &'static str> {
    match event.event_type.as_str() {
        "message" => {}
        "app_mention" => return Err("app_mention"),
        _ => return Err("unsupported"),
    }
    if event.subtype.is_some() {
        return Err("message.subtype");
    }
    if event.bot_id.is_some() {
        return Err("message.bot");
    }

    let user_id = match event.user.as_deref().map(str::trim) {
        Some(user) if !user.is_empty() => user,
        _ => return Err("message.anonymous"),
    };
    if user_id == bot_user_id {
        return Err("message.self");
    }
    let channel_id = match event.channel.as_deref().map(str::trim) {
        Some(channel) if !channel.is_empty() => channel,
        _ => return Err("message.no_channel"),
    };
    let text = event.text.as_deref().unwrap_or_default().trim();

    let mention = format!("<@{bot_user_id}>");
    let (context, text) = if event.channel_type.as_deref() == Some("im") {
        (MessageContext::DirectMessage, strip_leading_mention(text, &mention).unwrap_or(text))
    } else if let Some(rest) = strip_leading_mention(text, &mention) {
        (MessageContext::DirectMention, rest)
    } else if text.contains(&mention) {
        (MessageContext::Mention, text)
    } else {
        (MessageContext::Ambient, text)
    };

    Ok(InboundMessage {
        user_id: user_id.to_owned(),
        channel_id: channel_id.to_owned(),
        text: text.to_owned(),
        context,
    })
}

fn strip_leading_mention<'a>(text: &'a str, mention: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(mention)?.trim_start();
    let rest = rest.strip_prefix([':', ',']).unwrap_or(rest);
    Some(rest.trim())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded { channel_id: String, messages: Vec<TransportMessage> },
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message handler failure: {0}")]
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn dispatcher_for<S>(service: S) -> EventDispatcher
where
    S: MessageService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service));
    dispatcher
}

/// Produces the replies for one classified message.
#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        message: &InboundMessage,
        ctx: &EventContext,
    ) -> Result<Vec<ReplyPayload>, EventHandlerError>;
}

#[async_trait]
impl<S> MessageService for Arc<S>
where
    S: MessageService + ?Sized,
{
    async fn handle_message(
        &self,
        message: &InboundMessage,
        ctx: &EventContext,
    ) -> Result<Vec<ReplyPayload>, EventHandlerError> {
        self.as_ref().handle_message(message, ctx).await
    }
}

pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(message) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let replies = self.service.handle_message(message, ctx).await?;
        let messages = render_all(&replies);
        if messages.is_empty() {
            return Ok(HandlerResult::Processed);
        }
        Ok(HandlerResult::Responded { channel_id: message.channel_id.clone(), messages })
    }
}

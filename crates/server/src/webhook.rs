//! Slack Events API endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use hearsay_core::dialogue::SessionKey;
use hearsay_slack::events::{
    EventCallback, EventContext, EventDispatcher, SlackEnvelope, SlackEvent,
};
use hearsay_slack::transport::{deliver, ReplySink};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

const RETRY_HEADER: &str = "x-slack-retry-num";

/// One queue per conversation key with events still waiting. A key's events are
/// processed in the order Slack delivered them; distinct keys run concurrently.
type Lanes = Mutex<HashMap<SessionKey, UnboundedSender<SlackEnvelope>>>;

#[derive(Clone)]
pub struct WebhookState {
    dispatcher: Arc<EventDispatcher>,
    sink: Arc<dyn ReplySink>,
    bot_user_id: Arc<str>,
    lanes: Arc<Lanes>,
}

impl WebhookState {
    pub fn new(
        dispatcher: Arc<EventDispatcher>,
        sink: Arc<dyn ReplySink>,
        bot_user_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            dispatcher,
            sink,
            bot_user_id: bot_user_id.into(),
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_lanes(&self) -> MutexGuard<'_, HashMap<SessionKey, UnboundedSender<SlackEnvelope>>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventsRequest {
    UrlVerification { challenge: String },
    EventCallback(EventCallback),
    #[serde(other)]
    Other,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/slack/events", post(slack_events)).with_state(state)
}

async fn slack_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(request): Json<EventsRequest>,
) -> Response {
    match request {
        EventsRequest::UrlVerification { challenge } => {
            info!(event_name = "ingress.slack.url_verification", "answered url verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        EventsRequest::EventCallback(mut callback) => {
            let correlation_id = callback
                .event_id
                .get_or_insert_with(|| format!("evt-{}", Uuid::new_v4()))
                .clone();

            if let Some(retry) = headers.get(RETRY_HEADER).and_then(|value| value.to_str().ok()) {
                info!(
                    event_name = "ingress.slack.retry_skipped",
                    correlation_id = %correlation_id,
                    retry,
                    "skipping redelivered event"
                );
                return StatusCode::OK.into_response();
            }

            let envelope = SlackEnvelope::from_callback(callback, &state.bot_user_id);
            let key = match &envelope.event {
                SlackEvent::Message(message) => Some(message.session_key()),
                SlackEvent::Unsupported { event_type } => {
                    debug!(
                        event_name = "ingress.slack.event_skipped",
                        correlation_id = %correlation_id,
                        reason = %event_type,
                        "skipping event the bot does not answer"
                    );
                    None
                }
            };
            if let Some(key) = key {
                enqueue(&state, key, envelope);
            }
            StatusCode::OK.into_response()
        }
        EventsRequest::Other => {
            debug!(event_name = "ingress.slack.unhandled_request", "ignoring events api request");
            StatusCode::OK.into_response()
        }
    }
}

/// Appends the envelope to its key's lane, starting a worker when the key has none.
fn enqueue(state: &WebhookState, key: SessionKey, envelope: SlackEnvelope) {
    let mut lanes = state.lock_lanes();
    let envelope = match lanes.get(&key) {
        Some(lane) => match lane.send(envelope) {
            Ok(()) => return,
            // The worker died without clearing its lane.
            Err(SendError(envelope)) => envelope,
        },
        None => envelope,
    };

    let (sender, receiver) = mpsc::unbounded_channel();
    lanes.insert(key.clone(), sender);
    drop(lanes);
    tokio::spawn(drain_lane(state.clone(), key, envelope, receiver));
}

async fn drain_lane(
    state: WebhookState,
    key: SessionKey,
    first: SlackEnvelope,
    mut receiver: UnboundedReceiver<SlackEnvelope>,
) {
    let mut next = Some(first);
    while let Some(envelope) = next {
        process_envelope(&state, envelope).await;

        // Checked under the lanes lock so a concurrent `enqueue` either lands in this
        // receiver or finds the lane gone and starts a new worker.
        next = {
            let mut lanes = state.lock_lanes();
            let queued = receiver.try_recv().ok();
            if queued.is_none() {
                lanes.remove(&key);
            }
            queued
        };
    }
}

async fn process_envelope(state: &WebhookState, envelope: SlackEnvelope) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    info!(
        event_name = "ingress.slack.envelope_received",
        correlation_id = %context.correlation_id,
        event_type = ?envelope.event.event_type(),
        "received slack event"
    );

    let result = match state.dispatcher.dispatch(&envelope, &context).await {
        Ok(result) => result,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.dispatch_failed",
                correlation_id = %context.correlation_id,
                error = %error,
                "event dispatch failed"
            );
            return;
        }
    };

    if let Err(error) = deliver(state.sink.as_ref(), &result, &context).await {
        warn!(
            event_name = "egress.slack.reply_failed",
            correlation_id = %context.correlation_id,
            error = %error,
            "failed to deliver replies"
        );
    }
}

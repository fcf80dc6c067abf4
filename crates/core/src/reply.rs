//! Transport-agnostic replies.
//!
//! Handlers and scripts produce [`ReplyPayload`]s; [`render`] turns them into a
//! [`TransportMessage`] that a transport can serialize as-is. Rendering never does I/O
//! and never invents text for fields the payload left out.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyPayload {
    Text(String),
    Card(Card),
}

impl ReplyPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl From<&str> for ReplyPayload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ReplyPayload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Card> for ReplyPayload {
    fn from(value: Card) -> Self {
        Self::Card(value)
    }
}

/// A rich reply. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Card {
    pub summary_text: Option<String>,
    pub title: Option<String>,
    pub title_link: Option<String>,
    pub body_text: Option<String>,
    pub image_url: Option<String>,
    pub accent_color: Option<String>,
}

impl Card {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.summary_text = Some(text.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn title_link(mut self, link: impl Into<String>) -> Self {
        self.title_link = Some(link.into());
        self
    }

    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body_text = Some(text.into());
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn accent(mut self, color: impl Into<String>) -> Self {
        self.accent_color = Some(color.into());
        self
    }

    fn has_attachment_content(&self) -> bool {
        self.title.is_some()
            || self.title_link.is_some()
            || self.body_text.is_some()
            || self.image_url.is_some()
            || self.accent_color.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransportMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TransportMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), attachments: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachments.is_empty()
    }

    /// Flattens the message for transports that only carry text, such as a terminal.
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(text) = &self.text {
            lines.push(text.clone());
        }
        for attachment in &self.attachments {
            match (&attachment.title, &attachment.title_link) {
                (Some(title), Some(link)) => lines.push(format!("{title} <{link}>")),
                (Some(title), None) => lines.push(title.clone()),
                (None, Some(link)) => lines.push(format!("<{link}>")),
                (None, None) => {}
            }
            if let Some(text) = &attachment.text {
                lines.push(text.clone());
            }
            if let Some(image_url) = &attachment.image_url {
                lines.push(format!("[image] {image_url}"));
            }
        }
        lines.join("\n")
    }
}

pub fn render(payload: &ReplyPayload) -> TransportMessage {
    match payload {
        ReplyPayload::Text(text) => TransportMessage::text(text.clone()),
        ReplyPayload::Card(card) => {
            let attachments = if card.has_attachment_content() {
                vec![Attachment {
                    fallback: card.summary_text.clone(),
                    title: card.title.clone(),
                    title_link: card.title_link.clone(),
                    text: card.body_text.clone(),
                    image_url: card.image_url.clone(),
                    color: card.accent_color.clone(),
                }]
            } else {
                Vec::new()
            };
            TransportMessage { text: card.summary_text.clone(), attachments }
        }
    }
}

pub fn render_all(payloads: &[ReplyPayload]) -> Vec<TransportMessage> {
    payloads.iter().map(render).filter(|message| !message.is_empty()).collect()
}

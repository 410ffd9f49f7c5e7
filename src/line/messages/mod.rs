//! Reply message assembly.
//!
//! Builders validate against Messaging API shape limits and never touch the
//! network, so a payload that reaches the client is always sendable.

use serde::Serialize;
use serde_json::{Value, json};

use crate::errors::{ShiftlineError, ShiftlineResult};
use crate::utils::truncate_chars;

pub const MAX_CAROUSEL_COLUMNS: usize = 10;
pub const MAX_COLUMN_ACTIONS: usize = 3;
pub const MAX_TEXT_CHARS: usize = 5000;
pub const MAX_ACTION_LABEL_CHARS: usize = 20;
pub const MAX_ACTION_DATA_CHARS: usize = 300;
pub const MAX_COLUMN_TITLE_CHARS: usize = 40;
/// Column text limit when the column has neither image nor title.
pub const MAX_COLUMN_TEXT_CHARS: usize = 120;
/// Column text limit when an image or title is present.
pub const MAX_COLUMN_TEXT_WITH_HEADER_CHARS: usize = 60;
pub const MAX_CONFIRM_TEXT_CHARS: usize = 240;

pub const CAROUSEL_ALT_TEXT: &str = "Carousel template";
pub const CONFIRM_ALT_TEXT: &str = "Confirm template";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PickerMode {
    Date,
    Time,
    Datetime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Message {
        label: String,
        text: String,
    },
    Postback {
        label: String,
        data: String,
    },
    Uri {
        label: String,
        uri: String,
    },
    #[serde(rename = "datetimepicker")]
    DatetimePicker {
        label: String,
        data: String,
        mode: PickerMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<String>,
    },
}

impl Action {
    pub fn message(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Message {
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn postback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Postback {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn uri(label: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::Uri {
            label: label.into(),
            uri: uri.into(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Message { label, .. }
            | Self::Postback { label, .. }
            | Self::Uri { label, .. }
            | Self::DatetimePicker { label, .. } => label,
        }
    }

    fn validate(&self) -> ShiftlineResult<()> {
        let label = self.label();
        if label.is_empty() {
            return Err(too_large("action label must not be empty"));
        }
        check_len("action label", label, MAX_ACTION_LABEL_CHARS)?;
        match self {
            Self::Message { text, .. } => {
                if text.is_empty() {
                    return Err(too_large("message action text must not be empty"));
                }
                check_len("message action text", text, MAX_ACTION_DATA_CHARS)
            }
            Self::Postback { data, .. } | Self::DatetimePicker { data, .. } => {
                check_len("postback data", data, MAX_ACTION_DATA_CHARS)
            }
            Self::Uri { uri, .. } => match url::Url::parse(uri) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https" | "tel" | "line") => {
                    Ok(())
                }
                _ => Err(too_large(&format!("unsupported action uri '{}'", uri))),
            },
        }
    }
}

/// Input for one carousel column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub actions: Vec<Action>,
}

impl Column {
    fn validate(&self, position: usize) -> ShiftlineResult<()> {
        if self.actions.is_empty() {
            return Err(too_large(&format!("column {} has no actions", position)));
        }
        if self.actions.len() > MAX_COLUMN_ACTIONS {
            return Err(too_large(&format!(
                "column {} has {} actions (max {})",
                position,
                self.actions.len(),
                MAX_COLUMN_ACTIONS
            )));
        }
        if let Some(title) = &self.title {
            check_len("column title", title, MAX_COLUMN_TITLE_CHARS)?;
        }
        let text_limit = if self.image_url.is_some() || self.title.is_some() {
            MAX_COLUMN_TEXT_WITH_HEADER_CHARS
        } else {
            MAX_COLUMN_TEXT_CHARS
        };
        if self.body.is_empty() {
            return Err(too_large(&format!("column {} has empty text", position)));
        }
        check_len("column text", &self.body, text_limit)?;
        self.actions.iter().try_for_each(Action::validate)
    }

    fn to_json(&self) -> Value {
        let mut col = json!({
            "text": self.body,
            "actions": self.actions,
        });
        if let Some(url) = &self.image_url {
            col["thumbnailImageUrl"] = json!(url);
        }
        if let Some(title) = &self.title {
            col["title"] = json!(title);
        }
        col
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReply {
    text: String,
}

impl TextReply {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselReply {
    columns: Vec<Column>,
}

impl CarouselReply {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmReply {
    prompt: String,
    actions: [Action; 2],
}

impl ConfirmReply {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn actions(&self) -> &[Action; 2] {
        &self.actions
    }
}

/// A fully validated reply. Only the builders below produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    Text(TextReply),
    Carousel(CarouselReply),
    Confirm(ConfirmReply),
}

impl ReplyPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Carousel(_) => "carousel",
            Self::Confirm(_) => "confirm",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t.text()),
            _ => None,
        }
    }

    /// Render as a Messaging API message object.
    pub fn to_message(&self) -> Value {
        match self {
            Self::Text(t) => json!({"type": "text", "text": t.text}),
            Self::Carousel(c) => json!({
                "type": "template",
                "altText": CAROUSEL_ALT_TEXT,
                "template": {
                    "type": "carousel",
                    "columns": c.columns.iter().map(Column::to_json).collect::<Vec<_>>(),
                },
            }),
            Self::Confirm(c) => json!({
                "type": "template",
                "altText": CONFIRM_ALT_TEXT,
                "template": {
                    "type": "confirm",
                    "text": c.prompt,
                    "actions": c.actions,
                },
            }),
        }
    }
}

/// Plain text reply. Text beyond the platform limit is cut at a character
/// boundary.
pub fn build_text(text: impl Into<String>) -> ReplyPayload {
    let text = text.into();
    let text = if text.chars().count() > MAX_TEXT_CHARS {
        truncate_chars(&text, MAX_TEXT_CHARS)
    } else {
        text
    };
    ReplyPayload::Text(TextReply { text })
}

/// Carousel reply; column order is preserved.
pub fn build_carousel(columns: Vec<Column>) -> ShiftlineResult<ReplyPayload> {
    if columns.is_empty() {
        return Err(too_large("carousel needs at least one column"));
    }
    if columns.len() > MAX_CAROUSEL_COLUMNS {
        return Err(too_large(&format!(
            "carousel has {} columns (max {})",
            columns.len(),
            MAX_CAROUSEL_COLUMNS
        )));
    }
    for (i, column) in columns.iter().enumerate() {
        column.validate(i)?;
    }
    let first = columns[0].actions.len();
    if columns.iter().any(|c| c.actions.len() != first) {
        return Err(too_large(
            "every carousel column must carry the same number of actions",
        ));
    }
    // The platform also requires images/titles on all columns or none
    let with_image = columns.iter().filter(|c| c.image_url.is_some()).count();
    let with_title = columns.iter().filter(|c| c.title.is_some()).count();
    if (with_image != 0 && with_image != columns.len())
        || (with_title != 0 && with_title != columns.len())
    {
        return Err(too_large(
            "carousel columns must all have images/titles or none",
        ));
    }
    Ok(ReplyPayload::Carousel(CarouselReply { columns }))
}

/// Two-button confirm reply: "yes" sends `yes_text` as a user message, "no"
/// posts back `no_data`.
pub fn build_confirm(
    prompt: &str,
    yes_label: &str,
    yes_text: &str,
    no_label: &str,
    no_data: &str,
) -> ShiftlineResult<ReplyPayload> {
    if prompt.is_empty() {
        return Err(too_large("confirm prompt must not be empty"));
    }
    check_len("confirm prompt", prompt, MAX_CONFIRM_TEXT_CHARS)?;
    let actions = [
        Action::message(yes_label, yes_text),
        Action::postback(no_label, no_data),
    ];
    actions.iter().try_for_each(Action::validate)?;
    Ok(ReplyPayload::Confirm(ConfirmReply {
        prompt: prompt.to_string(),
        actions,
    }))
}

fn check_len(what: &str, value: &str, max: usize) -> ShiftlineResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(too_large(&format!(
            "{} is {} characters (max {})",
            what, len, max
        )));
    }
    Ok(())
}

fn too_large(detail: &str) -> ShiftlineError {
    ShiftlineError::TemplateTooLarge(detail.to_string())
}

//! Typed decoding of postback `data` strings.

use std::fmt;

/// A postback action this bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostbackIntent {
    ShiftInput { item_id: Option<String> },
    SurveyDecline,
}

/// Why a postback was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownPostback {
    MissingAction,
    UnknownAction(String),
    UnexpectedKey { action: String, key: String },
    DuplicateKey(String),
}

impl fmt::Display for UnknownPostback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAction => write!(f, "no action key"),
            Self::UnknownAction(action) => write!(f, "unknown action '{}'", action),
            Self::UnexpectedKey { action, key } => {
                write!(f, "unexpected key '{}' for action '{}'", key, action)
            }
            Self::DuplicateKey(key) => write!(f, "duplicate key '{}'", key),
        }
    }
}

impl PostbackIntent {
    /// Decode `key=value&key=value` data. Unknown actions and keys are
    /// rejected rather than ignored.
    pub fn parse(data: &str) -> Result<Self, UnknownPostback> {
        let mut action: Option<String> = None;
        let mut item_id: Option<String> = None;
        let mut extra: Option<String> = None;

        for (key, value) in form_urlencoded::parse(data.as_bytes()) {
            let slot = match key.as_ref() {
                "action" => &mut action,
                "item_id" => &mut item_id,
                _ => {
                    extra.get_or_insert_with(|| key.into_owned());
                    continue;
                }
            };
            if slot.is_some() {
                return Err(UnknownPostback::DuplicateKey(key.into_owned()));
            }
            *slot = Some(value.into_owned());
        }

        let action = action.ok_or(UnknownPostback::MissingAction)?;
        match action.as_str() {
            "shift_input" => {
                if let Some(key) = extra {
                    return Err(UnknownPostback::UnexpectedKey { action, key });
                }
                Ok(Self::ShiftInput { item_id })
            }
            "survey_decline" => {
                let stray = extra.or_else(|| item_id.map(|_| "item_id".to_string()));
                if let Some(key) = stray {
                    return Err(UnknownPostback::UnexpectedKey { action, key });
                }
                Ok(Self::SurveyDecline)
            }
            _ => Err(UnknownPostback::UnknownAction(action)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ShiftInput { .. } => "shift_input",
            Self::SurveyDecline => "survey_decline",
        }
    }
}

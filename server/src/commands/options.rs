//! Command option definitions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::invocation::Context;
use super::tree::{AutocompleteHandler, HandlerError, HandlerFuture};

/// Value type of a command option, fixed when the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Free text.
    String,
    /// True / false.
    Boolean,
    /// Whole number.
    Integer,
    /// Floating point number.
    Number,
    /// Channel mention.
    Channel,
    /// User mention.
    User,
    /// Role mention.
    Role,
    /// Uploaded file.
    Attachment,
}

impl OptionKind {
    /// Numeric option type used by the chat platform's command schema.
    #[must_use]
    pub const fn wire_type(self) -> u8 {
        match self {
            Self::String => 3,
            Self::Integer => 4,
            Self::Boolean => 5,
            Self::User => 6,
            Self::Channel => 7,
            Self::Role => 8,
            Self::Number => 10,
            Self::Attachment => 11,
        }
    }

    /// Inverse of [`Self::wire_type`]. Selector and unsupported codes map to `None`.
    #[must_use]
    pub const fn from_wire(code: u8) -> Option<Self> {
        match code {
            3 => Some(Self::String),
            4 => Some(Self::Integer),
            5 => Some(Self::Boolean),
            6 => Some(Self::User),
            7 => Some(Self::Channel),
            8 => Some(Self::Role),
            10 => Some(Self::Number),
            11 => Some(Self::Attachment),
            _ => None,
        }
    }

    /// Whether an option of this kind may declare fixed choices.
    #[must_use]
    pub const fn supports_choices(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number)
    }

    /// Whether `value` has the shape this kind expects.
    #[must_use]
    pub const fn accepts(self, value: &OptionValue) -> bool {
        match (self, value) {
            (Self::Boolean, OptionValue::Boolean(_))
            | (Self::Integer, OptionValue::Integer(_))
            | (Self::Number, OptionValue::Number(_) | OptionValue::Integer(_)) => true,
            (
                Self::String | Self::Channel | Self::User | Self::Role | Self::Attachment,
                OptionValue::String(_),
            ) => true,
            _ => false,
        }
    }
}

/// A concrete option value. Mentions and attachments carry their id as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// A fixed choice offered for an option, or an autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: OptionValue,
}

impl OptionChoice {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Definition of one command option.
pub struct CommandOption<S> {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
    pub choices: Vec<OptionChoice>,
    pub options: Vec<CommandOption<S>>,
    pub(crate) autocomplete: Option<AutocompleteHandler<S>>,
}

impl<S> CommandOption<S> {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            choices: Vec::new(),
            options: Vec::new(),
            autocomplete: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn choice(mut self, choice: OptionChoice) -> Self {
        self.choices.push(choice);
        self
    }

    #[must_use]
    pub fn nested(mut self, option: Self) -> Self {
        self.options.push(option);
        self
    }

    /// Attach an autocomplete handler for this option.
    #[must_use]
    pub fn autocomplete<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Context<S>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<OptionChoice>, HandlerError>> + Send + 'static,
    {
        self.autocomplete = Some(Arc::new(
            move |ctx| -> HandlerFuture<Vec<OptionChoice>> { Box::pin(handler(ctx)) },
        ));
        self
    }

    #[must_use]
    pub fn has_autocomplete(&self) -> bool {
        self.autocomplete.is_some()
    }
}

impl<S> std::fmt::Debug for CommandOption<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandOption")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("choices", &self.choices.len())
            .field("autocomplete", &self.autocomplete.is_some())
            .finish_non_exhaustive()
    }
}

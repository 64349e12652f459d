//! Inbound invocations and the argument accessor handed to handlers.

use std::sync::Arc;

use taubot_common::{PlatformId, Principal};

use super::options::{OptionKind, OptionValue};

/// What an inbound option entry is: a path selector or a leaf argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Subcommand,
    SubcommandGroup,
    Value(OptionKind),
}

impl EntryKind {
    /// Selectors name a child node instead of carrying a value.
    #[must_use]
    pub const fn is_selector(self) -> bool {
        matches!(self, Self::Subcommand | Self::SubcommandGroup)
    }
}

/// One entry of an invocation's (possibly nested) option payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOption {
    pub name: String,
    pub kind: EntryKind,
    pub value: Option<OptionValue>,
    /// Set on the field the user is typing into during autocomplete.
    pub focused: bool,
    /// Entries nested under a selector.
    pub options: Vec<InvocationOption>,
}

impl InvocationOption {
    /// Leaf argument entry.
    #[must_use]
    pub fn value(name: impl Into<String>, kind: OptionKind, value: impl Into<OptionValue>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Value(kind),
            value: Some(value.into()),
            focused: false,
            options: Vec::new(),
        }
    }

    /// Subcommand selector entry.
    #[must_use]
    pub fn subcommand(name: impl Into<String>, options: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Subcommand,
            value: None,
            focused: false,
            options,
        }
    }

    /// Subcommand-group selector entry.
    #[must_use]
    pub fn group(name: impl Into<String>, options: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::SubcommandGroup,
            value: None,
            focused: false,
            options,
        }
    }

    /// Mark this entry as the autocomplete focus.
    #[must_use]
    pub const fn focused(mut self) -> Self {
        self.focused = true;
        self
    }
}

/// A command invocation as received from the platform.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Top-level command name.
    pub command: String,
    pub options: Vec<InvocationOption>,
    pub principal: Principal,
    pub channel_id: Option<PlatformId>,
}

/// Missing or mistyped argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("Missing required option `{0}`")]
    Missing(String),

    #[error("Option `{name}` should be a {expected}")]
    WrongType { name: String, expected: &'static str },
}

/// Read-only view of the leaf-level arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Arc<[InvocationOption]>,
    /// Entry being completed, when several are marked focused.
    focus: Option<usize>,
}

impl Arguments {
    #[must_use]
    pub fn new(entries: Vec<InvocationOption>) -> Self {
        Self {
            entries: entries.into(),
            focus: None,
        }
    }

    /// Same arguments, completing the entry at `index`.
    #[must_use]
    pub(crate) fn with_focus(&self, index: usize) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            focus: Some(index),
        }
    }

    /// All collected entries, in payload order.
    pub fn iter(&self) -> impl Iterator<Item = &InvocationOption> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value of the first entry called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_ref())
    }

    /// The entry under autocomplete focus, if any.
    ///
    /// During dispatch this is the entry whose handler is running; otherwise
    /// the first entry marked focused.
    #[must_use]
    pub fn focused(&self) -> Option<&InvocationOption> {
        match self.focus {
            Some(index) => self.entries.get(index),
            None => self.entries.iter().find(|e| e.focused),
        }
    }

    /// Text typed so far into the focused field (empty if none).
    #[must_use]
    pub fn focused_text(&self) -> String {
        match self.focused().and_then(|e| e.value.as_ref()) {
            Some(OptionValue::String(s)) => s.clone(),
            Some(OptionValue::Integer(n)) => n.to_string(),
            Some(OptionValue::Number(n)) => n.to_string(),
            Some(OptionValue::Boolean(b)) => b.to_string(),
            None => String::new(),
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<&str>, ArgumentError> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::String(s)) => Ok(Some(s)),
            Some(_) => Err(wrong_type(name, "string")),
        }
    }

    pub fn integer(&self, name: &str) -> Result<Option<i64>, ArgumentError> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Integer(n)) => Ok(Some(*n)),
            Some(_) => Err(wrong_type(name, "whole number")),
        }
    }

    pub fn number(&self, name: &str) -> Result<Option<f64>, ArgumentError> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Number(n)) => Ok(Some(*n)),
            #[allow(clippy::cast_precision_loss)]
            Some(OptionValue::Integer(n)) => Ok(Some(*n as f64)),
            Some(_) => Err(wrong_type(name, "number")),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>, ArgumentError> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Boolean(b)) => Ok(Some(*b)),
            Some(_) => Err(wrong_type(name, "true/false value")),
        }
    }

    /// A user, role, channel or attachment reference.
    pub fn id(&self, name: &str) -> Result<Option<PlatformId>, ArgumentError> {
        self.string(name)?
            .map(|raw| PlatformId::parse(raw).map_err(|_| wrong_type(name, "mention")))
            .transpose()
    }

    pub fn require_string(&self, name: &str) -> Result<&str, ArgumentError> {
        self.string(name)?.ok_or_else(|| missing(name))
    }

    pub fn require_integer(&self, name: &str) -> Result<i64, ArgumentError> {
        self.integer(name)?.ok_or_else(|| missing(name))
    }

    pub fn require_boolean(&self, name: &str) -> Result<bool, ArgumentError> {
        self.boolean(name)?.ok_or_else(|| missing(name))
    }

    pub fn require_id(&self, name: &str) -> Result<PlatformId, ArgumentError> {
        self.id(name)?.ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> ArgumentError {
    ArgumentError::Missing(name.to_string())
}

fn wrong_type(name: &str, expected: &'static str) -> ArgumentError {
    ArgumentError::WrongType {
        name: name.to_string(),
        expected,
    }
}

/// Everything a handler gets to see for one invocation.
#[derive(Debug, Clone)]
pub struct Context<S> {
    /// Application state shared by all handlers.
    pub state: S,
    pub principal: Principal,
    pub channel_id: Option<PlatformId>,
    arguments: Arguments,
}

impl<S> Context<S> {
    #[must_use]
    pub const fn new(
        state: S,
        principal: Principal,
        channel_id: Option<PlatformId>,
        arguments: Arguments,
    ) -> Self {
        Self {
            state,
            principal,
            channel_id,
            arguments,
        }
    }

    /// Leaf-level arguments of this invocation.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.arguments
    }
}

//! The command tree: an immutable forest of groups and leaves.
//!
//! Trees are built once at startup and handed to the dispatcher. All
//! structural rules are checked in [`CommandTree::new`], so a tree that
//! exists is a tree the dispatcher can walk without further validation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use super::invocation::Context;
use super::options::{CommandOption, OptionChoice};

/// Error type returned by command handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by command handlers.
pub type HandlerFuture<T> = BoxFuture<'static, Result<T, HandlerError>>;

/// Handler invoked when a leaf command is run.
pub type ActionHandler<S> = Arc<dyn Fn(Context<S>) -> HandlerFuture<Reply> + Send + Sync>;

/// Handler invoked when the user is typing into an option.
pub type AutocompleteHandler<S> =
    Arc<dyn Fn(Context<S>) -> HandlerFuture<Vec<OptionChoice>> + Send + Sync>;

/// Maximum length of command and option names.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum length of command and option descriptions.
pub const MAX_DESCRIPTION_LEN: usize = 100;

/// Message produced by a leaf handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoking user.
    pub ephemeral: bool,
}

impl Reply {
    #[must_use]
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    #[must_use]
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Structural problems found while building a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("Invalid name `{0}`: must be 1-32 lowercase letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("Invalid description for `{0}`: must be 1-100 characters")]
    InvalidDescription(String),

    #[error("Duplicate command `{0}`")]
    DuplicateCommand(String),

    #[error("Duplicate option `{option}` on `{command}`")]
    DuplicateOption { command: String, option: String },

    #[error("Group `{0}` cannot declare options")]
    GroupWithOptions(String),

    #[error("Group `{0}` cannot have a handler")]
    GroupWithHandler(String),

    #[error("Command `{0}` has neither subcommands nor a handler")]
    MissingHandler(String),

    #[error("Choices on option `{0}` do not match its type")]
    ChoiceTypeMismatch(String),
}

/// A command node: a group (has subcommands) or a leaf (has a handler).
pub struct CommandNode<S> {
    pub name: String,
    pub description: String,
    /// Platform permission mask required to see the command by default.
    pub default_member_permissions: Option<u64>,
    pub subcommands: Vec<CommandNode<S>>,
    pub options: Vec<CommandOption<S>>,
    handler: Option<ActionHandler<S>>,
}

impl<S> CommandNode<S> {
    /// A node that only holds subcommands.
    #[must_use]
    pub fn group(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_member_permissions: None,
            subcommands: Vec::new(),
            options: Vec::new(),
            handler: None,
        }
    }

    /// A node that runs `handler` when invoked.
    #[must_use]
    pub fn leaf<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Context<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        let mut node = Self::group(name, description);
        node.handler = Some(Arc::new(move |ctx| -> HandlerFuture<Reply> {
            Box::pin(handler(ctx))
        }));
        node
    }

    #[must_use]
    pub fn with_subcommand(mut self, node: Self) -> Self {
        self.subcommands.push(node);
        self
    }

    #[must_use]
    pub fn with_option(mut self, option: CommandOption<S>) -> Self {
        self.options.push(option);
        self
    }

    #[must_use]
    pub const fn with_default_member_permissions(mut self, mask: u64) -> Self {
        self.default_member_permissions = Some(mask);
        self
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        !self.subcommands.is_empty()
    }

    #[must_use]
    pub const fn handler(&self) -> Option<&ActionHandler<S>> {
        self.handler.as_ref()
    }

    /// Child node by name.
    #[must_use]
    pub fn subcommand(&self, name: &str) -> Option<&Self> {
        self.subcommands.iter().find(|c| c.name == name)
    }

    /// Option definition by name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&CommandOption<S>> {
        self.options.iter().find(|o| o.name == name)
    }

    fn validate(&self) -> Result<(), TreeError> {
        validate_name(&self.name)?;
        validate_description(&self.name, &self.description)?;

        if self.is_group() {
            if !self.options.is_empty() {
                return Err(TreeError::GroupWithOptions(self.name.clone()));
            }
            if self.handler.is_some() {
                return Err(TreeError::GroupWithHandler(self.name.clone()));
            }
            validate_siblings(&self.subcommands)?;
        } else if self.handler.is_none() {
            return Err(TreeError::MissingHandler(self.name.clone()));
        }

        validate_options(&self.name, &self.options)
    }
}

impl<S> std::fmt::Debug for CommandNode<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("subcommands", &self.subcommands)
            .field("options", &self.options)
            .field("handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

/// Validate a command or option name.
fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_description(name: &str, description: &str) -> Result<(), TreeError> {
    let len = description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION_LEN {
        return Err(TreeError::InvalidDescription(name.to_string()));
    }
    Ok(())
}

fn validate_siblings<S>(nodes: &[CommandNode<S>]) -> Result<(), TreeError> {
    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(TreeError::DuplicateCommand(node.name.clone()));
        }
        node.validate()?;
    }
    Ok(())
}

fn validate_options<S>(command: &str, options: &[CommandOption<S>]) -> Result<(), TreeError> {
    let mut seen = HashSet::new();
    for option in options {
        validate_name(&option.name)?;
        validate_description(&option.name, &option.description)?;
        if !seen.insert(option.name.as_str()) {
            return Err(TreeError::DuplicateOption {
                command: command.to_string(),
                option: option.name.clone(),
            });
        }
        if !option.choices.is_empty()
            && (!option.kind.supports_choices()
                || option.choices.iter().any(|c| !option.kind.accepts(&c.value)))
        {
            return Err(TreeError::ChoiceTypeMismatch(option.name.clone()));
        }
        validate_options(&option.name, &option.options)?;
    }
    Ok(())
}

/// Validated, read-only command forest.
pub struct CommandTree<S> {
    commands: Vec<CommandNode<S>>,
}

impl<S> CommandTree<S> {
    /// Build a tree, rejecting any structural problem.
    pub fn new(commands: Vec<CommandNode<S>>) -> Result<Self, TreeError> {
        validate_siblings(&commands)?;
        Ok(Self { commands })
    }

    /// Top-level command by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandNode<S>> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Top-level commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandNode<S>> {
        self.commands.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<S> std::fmt::Debug for CommandTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.commands).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::options::{OptionChoice, OptionKind};

    async fn noop(_ctx: Context<()>) -> Result<Reply, HandlerError> {
        Ok(Reply::public("ok"))
    }

    fn leaf(name: &str) -> CommandNode<()> {
        CommandNode::leaf(name, "does a thing", noop)
    }

    #[test]
    fn test_valid_tree() {
        let tree = CommandTree::new(vec![
            CommandNode::group("account", "Accounts")
                .with_subcommand(
                    leaf("pay")
                        .with_option(
                            CommandOption::new("to", "Recipient", OptionKind::User).required(),
                        )
                        .with_option(
                            CommandOption::new("amount", "Amount", OptionKind::Integer).required(),
                        ),
                )
                .with_subcommand(leaf("balance")),
            leaf("ping"),
        ])
        .unwrap();

        assert_eq!(tree.len(), 2);
        let account = tree.get("account").unwrap();
        assert!(account.is_group());
        assert!(account.handler().is_none());
        let pay = account.subcommand("pay").unwrap();
        assert!(pay.handler().is_some());
        assert_eq!(pay.option("amount").unwrap().kind, OptionKind::Integer);
        assert!(tree.get("missing").is_none());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("pay").is_ok());
        assert!(validate_name("set-grant_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Pay").is_err());
        assert!(validate_name("with space").is_err());
        assert!(validate_name(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_duplicate_siblings_rejected() {
        let err = CommandTree::new(vec![leaf("ping"), leaf("ping")]).unwrap_err();
        assert_eq!(err, TreeError::DuplicateCommand("ping".into()));

        let err = CommandTree::new(vec![CommandNode::group("account", "Accounts")
            .with_subcommand(leaf("pay"))
            .with_subcommand(leaf("pay"))])
        .unwrap_err();
        assert_eq!(err, TreeError::DuplicateCommand("pay".into()));
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let err = CommandTree::new(vec![leaf("pay")
            .with_option(CommandOption::new("to", "Recipient", OptionKind::User))
            .with_option(CommandOption::new("to", "Again", OptionKind::User))])
        .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateOption { .. }));
    }

    #[test]
    fn test_group_shape_rules() {
        let err = CommandTree::new(vec![CommandNode::group("account", "Accounts")
            .with_subcommand(leaf("pay"))
            .with_option(CommandOption::new("to", "Recipient", OptionKind::User))])
        .unwrap_err();
        assert_eq!(err, TreeError::GroupWithOptions("account".into()));

        let err = CommandTree::new(vec![leaf("account").with_subcommand(leaf("pay"))]).unwrap_err();
        assert_eq!(err, TreeError::GroupWithHandler("account".into()));

        let err = CommandTree::new(vec![CommandNode::<()>::group("empty", "Nothing")]).unwrap_err();
        assert_eq!(err, TreeError::MissingHandler("empty".into()));
    }

    #[test]
    fn test_choice_type_checked() {
        let err = CommandTree::new(vec![leaf("open").with_option(
            CommandOption::new("kind", "Kind", OptionKind::Integer)
                .choice(OptionChoice::new("user", "user")),
        )])
        .unwrap_err();
        assert_eq!(err, TreeError::ChoiceTypeMismatch("kind".into()));

        let err = CommandTree::new(vec![leaf("open").with_option(
            CommandOption::new("who", "Who", OptionKind::User).choice(OptionChoice::new("me", "1")),
        )])
        .unwrap_err();
        assert_eq!(err, TreeError::ChoiceTypeMismatch("who".into()));
    }

    #[test]
    fn test_description_required() {
        let err = CommandTree::new(vec![CommandNode::leaf("ping", "", noop)]).unwrap_err();
        assert_eq!(err, TreeError::InvalidDescription("ping".into()));
    }
}

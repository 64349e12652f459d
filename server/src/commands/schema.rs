//! Registrable projection of the command tree.

use serde::Serialize;

use super::options::{CommandOption, OptionChoice, OptionKind};
use super::tree::{CommandNode, CommandTree};

/// One command (or subcommand) in registrable form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSchema {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<u64>,
    pub options: Vec<OptionSchema>,
    pub subcommands: Vec<CommandSchema>,
}

/// One option in registrable form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    /// Numeric platform code for `kind`.
    pub wire_type: u8,
    pub required: bool,
    pub autocomplete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSchema>,
}

impl<S> From<&CommandOption<S>> for OptionSchema {
    fn from(option: &CommandOption<S>) -> Self {
        Self {
            name: option.name.clone(),
            description: option.description.clone(),
            kind: option.kind,
            wire_type: option.kind.wire_type(),
            required: option.required,
            autocomplete: option.has_autocomplete(),
            choices: option.choices.clone(),
            options: option.options.iter().map(Self::from).collect(),
        }
    }
}

impl<S> From<&CommandNode<S>> for CommandSchema {
    fn from(node: &CommandNode<S>) -> Self {
        Self {
            name: node.name.clone(),
            description: node.description.clone(),
            default_member_permissions: node.default_member_permissions,
            options: node.options.iter().map(OptionSchema::from).collect(),
            subcommands: node.subcommands.iter().map(Self::from).collect(),
        }
    }
}

impl<S> CommandTree<S> {
    /// Project the tree for the registrar, preserving sibling order.
    #[must_use]
    pub fn schema(&self) -> Vec<CommandSchema> {
        self.iter().map(CommandSchema::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::invocation::Context;
    use crate::commands::tree::{HandlerError, Reply};

    async fn noop(_ctx: Context<()>) -> Result<Reply, HandlerError> {
        Ok(Reply::public("ok"))
    }

    async fn suggest(_ctx: Context<()>) -> Result<Vec<OptionChoice>, HandlerError> {
        Ok(Vec::new())
    }

    #[test]
    fn test_schema_preserves_order_and_shape() {
        let tree = CommandTree::new(vec![
            CommandNode::group("account", "Accounts")
                .with_default_member_permissions(0)
                .with_subcommand(
                    CommandNode::leaf("pay", "Send money", noop)
                        .with_option(
                            CommandOption::new("to", "Recipient", OptionKind::User).required(),
                        )
                        .with_option(
                            CommandOption::new("amount", "Amount", OptionKind::Integer).required(),
                        ),
                )
                .with_subcommand(CommandNode::leaf("balance", "Show balance", noop).with_option(
                    CommandOption::new("account", "Account", OptionKind::String).autocomplete(suggest),
                )),
            CommandNode::leaf("ping", "Ping", noop),
        ])
        .unwrap();

        let schema = tree.schema();
        let names: Vec<_> = schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["account", "ping"]);

        let account = &schema[0];
        assert_eq!(account.default_member_permissions, Some(0));
        let subs: Vec<_> = account.subcommands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(subs, ["pay", "balance"]);

        let pay = &account.subcommands[0];
        assert_eq!(pay.options[0].name, "to");
        assert_eq!(pay.options[0].wire_type, 6);
        assert_eq!(pay.options[1].wire_type, 4);
        assert!(account.subcommands[1].options[0].autocomplete);
    }

    #[test]
    fn test_schema_serializes_type_tag() {
        let tree = CommandTree::new(vec![CommandNode::leaf("ping", "Ping", noop).with_option(
            CommandOption::new("loud", "Shout", OptionKind::Boolean),
        )])
        .unwrap();

        let json = serde_json::to_value(tree.schema()).unwrap();
        assert_eq!(json[0]["options"][0]["type"], "boolean");
        assert_eq!(json[0]["options"][0]["wire_type"], 5);
        assert!(json[0].get("default_member_permissions").is_none());
    }
}

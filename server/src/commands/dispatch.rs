//! Routes invocations through the command tree to a single leaf.

use std::sync::Arc;

use tracing::{debug, error};

use super::invocation::{Arguments, Context, Invocation, InvocationOption};
use super::options::OptionChoice;
use super::tree::{CommandNode, CommandTree, HandlerError, Reply};

/// Failure raised by a handler during dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Handler for `{command}` failed: {source}")]
    Handler {
        command: String,
        #[source]
        source: HandlerError,
    },
}

/// Walk from `node` through the selector entries in `options`.
///
/// The first subcommand or group selector at each level picks the branch and
/// anything collected before it is dropped. A selector naming no known child
/// is flattened through on the same node. Pure in `(node, options)`.
pub fn traverse<'t, S>(
    mut node: &'t CommandNode<S>,
    options: &[InvocationOption],
) -> (&'t CommandNode<S>, Vec<InvocationOption>) {
    let mut remaining = options;

    'descend: loop {
        let mut collected = Vec::new();
        for option in remaining {
            if option.kind.is_selector() {
                node = node.subcommand(&option.name).unwrap_or(node);
                remaining = &option.options;
                continue 'descend;
            }
            collected.push(option.clone());
        }
        return (node, collected);
    }
}

/// A resolved invocation: the leaf and its arguments.
pub struct Route<'t, S> {
    pub leaf: &'t CommandNode<S>,
    pub arguments: Arguments,
}

/// Suggestions produced for one focused option.
#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteResult {
    pub option: String,
    pub choices: Vec<OptionChoice>,
}

/// Dispatches invocations against an immutable [`CommandTree`].
pub struct Dispatcher<S> {
    tree: Arc<CommandTree<S>>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
        }
    }
}

impl<S: Clone> Dispatcher<S> {
    #[must_use]
    pub fn new(tree: CommandTree<S>) -> Self {
        Self {
            tree: Arc::new(tree),
        }
    }

    #[must_use]
    pub fn tree(&self) -> &CommandTree<S> {
        &self.tree
    }

    /// Resolve the leaf and arguments for an invocation without running anything.
    ///
    /// Returns `None` when the top-level command is not registered.
    #[must_use]
    pub fn route(&self, invocation: &Invocation) -> Option<Route<'_, S>> {
        let root = self.tree.get(&invocation.command)?;
        let (leaf, collected) = traverse(root, &invocation.options);
        Some(Route {
            leaf,
            arguments: Arguments::new(collected),
        })
    }

    /// Run the leaf handler for `invocation`.
    ///
    /// Unknown commands, and paths that end on a group, produce `Ok(None)`.
    pub async fn dispatch(
        &self,
        state: S,
        invocation: Invocation,
    ) -> Result<Option<Reply>, DispatchError> {
        let Some(route) = self.route(&invocation) else {
            debug!(command = %invocation.command, "Ignoring unknown command");
            return Ok(None);
        };
        let Some(handler) = route.leaf.handler() else {
            debug!(
                command = %invocation.command,
                node = %route.leaf.name,
                "Invocation resolved to a group, ignoring"
            );
            return Ok(None);
        };

        let leaf = route.leaf.name.clone();
        let ctx = Context::new(
            state,
            invocation.principal,
            invocation.channel_id,
            route.arguments,
        );

        match handler(ctx).await {
            Ok(reply) => {
                debug!(command = %invocation.command, leaf = %leaf, "Command handled");
                Ok(Some(reply))
            }
            Err(source) => {
                error!(command = %invocation.command, leaf = %leaf, error = %source, "Command handler failed");
                Err(DispatchError::Handler {
                    command: invocation.command,
                    source,
                })
            }
        }
    }

    /// Run autocomplete handlers for every focused option of `invocation`.
    ///
    /// Each handler sees its own entry as the focus. Focused entries without
    /// a matching handler are skipped, so the result may be empty. Returns
    /// `None` when the top-level command is not registered.
    pub async fn autocomplete(
        &self,
        state: S,
        invocation: Invocation,
    ) -> Result<Option<Vec<AutocompleteResult>>, DispatchError> {
        let Some(route) = self.route(&invocation) else {
            debug!(command = %invocation.command, "Ignoring autocomplete for unknown command");
            return Ok(None);
        };

        let mut results = Vec::new();
        for (index, entry) in route.arguments.iter().enumerate().filter(|(_, e)| e.focused) {
            let Some(handler) = route
                .leaf
                .option(&entry.name)
                .and_then(|option| option.autocomplete.as_ref())
            else {
                continue;
            };

            let ctx = Context::new(
                state.clone(),
                invocation.principal.clone(),
                invocation.channel_id.clone(),
                route.arguments.with_focus(index),
            );
            match handler(ctx).await {
                Ok(choices) => results.push(AutocompleteResult {
                    option: entry.name.clone(),
                    choices,
                }),
                Err(source) => {
                    error!(command = %invocation.command, option = %entry.name, error = %source, "Autocomplete handler failed");
                    return Err(DispatchError::Handler {
                        command: invocation.command.clone(),
                        source,
                    });
                }
            }
        }
        Ok(Some(results))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use taubot_common::{PlatformId, Principal};

    use super::*;
    use crate::commands::options::{CommandOption, OptionKind};

    type Calls = Arc<Mutex<Vec<String>>>;

    async fn pay(ctx: Context<Calls>) -> Result<Reply, HandlerError> {
        let args = ctx.arguments();
        let to = args.require_id("to")?;
        let amount = args.require_integer("amount")?;
        ctx.state
            .lock()
            .unwrap()
            .push(format!("pay {to} {amount}"));
        Ok(Reply::public(format!("Sent {amount} to {to}")))
    }

    async fn balance(_ctx: Context<Calls>) -> Result<Reply, HandlerError> {
        Ok(Reply::ephemeral("You have 5"))
    }

    async fn broken(_ctx: Context<Calls>) -> Result<Reply, HandlerError> {
        Err("store unavailable".into())
    }

    async fn account_names(ctx: Context<Calls>) -> Result<Vec<OptionChoice>, HandlerError> {
        let typed = ctx.arguments().focused_text();
        Ok(["savings", "spending"]
            .into_iter()
            .filter(|name| name.starts_with(&typed))
            .map(|name| OptionChoice::new(name, name))
            .collect())
    }

    fn dispatcher() -> Dispatcher<Calls> {
        let tree = CommandTree::new(vec![
            CommandNode::group("account", "Accounts")
                .with_subcommand(
                    CommandNode::leaf("pay", "Send money", pay)
                        .with_option(
                            CommandOption::new("to", "Recipient", OptionKind::User).required(),
                        )
                        .with_option(
                            CommandOption::new("amount", "Amount", OptionKind::Integer).required(),
                        ),
                )
                .with_subcommand(
                    CommandNode::leaf("balance", "Show balance", balance)
                        .with_option(
                            CommandOption::new("account", "Account", OptionKind::String)
                                .autocomplete(account_names),
                        )
                        .with_option(CommandOption::new("note", "Note", OptionKind::String)),
                ),
            CommandNode::leaf("broken", "Always fails", broken),
        ])
        .unwrap();
        Dispatcher::new(tree)
    }

    fn invocation(command: &str, options: Vec<InvocationOption>) -> Invocation {
        Invocation {
            command: command.to_string(),
            options,
            principal: Principal::new(PlatformId::parse("U1").unwrap()),
            channel_id: None,
        }
    }

    fn pay_args() -> Vec<InvocationOption> {
        vec![
            InvocationOption::value("to", OptionKind::User, "U2"),
            InvocationOption::value("amount", OptionKind::Integer, 100),
        ]
    }

    #[test]
    fn test_nested_pay_resolves_leaf_and_arguments() {
        let dispatcher = dispatcher();
        let inv = invocation("account", vec![InvocationOption::subcommand("pay", pay_args())]);

        let route = dispatcher.route(&inv).unwrap();
        assert_eq!(route.leaf.name, "pay");
        assert_eq!(route.arguments.len(), 2);
        assert_eq!(route.arguments.require_id("to").unwrap().as_str(), "U2");
        assert_eq!(route.arguments.require_integer("amount").unwrap(), 100);
    }

    #[test]
    fn test_traverse_is_pure() {
        let dispatcher = dispatcher();
        let inv = invocation("account", vec![InvocationOption::subcommand("pay", pay_args())]);

        let first = dispatcher.route(&inv).unwrap();
        let second = dispatcher.route(&inv).unwrap();
        assert!(std::ptr::eq(first.leaf, second.leaf));
        assert_eq!(first.arguments, second.arguments);
    }

    #[test]
    fn test_unknown_group_is_flattened() {
        let dispatcher = dispatcher();
        let inv = invocation(
            "account",
            vec![InvocationOption::group(
                "legacy",
                vec![InvocationOption::subcommand("pay", pay_args())],
            )],
        );

        let route = dispatcher.route(&inv).unwrap();
        assert_eq!(route.leaf.name, "pay");
        assert_eq!(route.arguments.len(), 2);
    }

    #[test]
    fn test_first_selector_wins_and_drops_earlier_arguments() {
        let dispatcher = dispatcher();
        let inv = invocation(
            "account",
            vec![
                InvocationOption::value("stray", OptionKind::String, "x"),
                InvocationOption::subcommand("pay", pay_args()),
                InvocationOption::subcommand("balance", vec![]),
            ],
        );

        let route = dispatcher.route(&inv).unwrap();
        assert_eq!(route.leaf.name, "pay");
        assert!(route.arguments.get("stray").is_none());
        assert_eq!(route.arguments.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_runs_leaf_handler() {
        let dispatcher = dispatcher();
        let calls = Calls::default();
        let inv = invocation("account", vec![InvocationOption::subcommand("pay", pay_args())]);

        let reply = dispatcher.dispatch(calls.clone(), inv).await.unwrap().unwrap();
        assert_eq!(reply.content, "Sent 100 to U2");
        assert!(!reply.ephemeral);
        assert_eq!(*calls.lock().unwrap(), ["pay U2 100"]);
    }

    #[tokio::test]
    async fn test_unknown_command_is_a_no_op() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .dispatch(Calls::default(), invocation("nope", vec![]))
            .await
            .unwrap();
        assert!(reply.is_none());
        assert!(dispatcher.route(&invocation("nope", vec![])).is_none());
    }

    #[tokio::test]
    async fn test_path_ending_on_group_is_a_no_op() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .dispatch(
                Calls::default(),
                invocation("account", vec![InvocationOption::subcommand("nope", vec![])]),
            )
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_handler_failure_propagates() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .dispatch(Calls::default(), invocation("broken", vec![]))
            .await
            .unwrap_err();
        let DispatchError::Handler { command, source } = err;
        assert_eq!(command, "broken");
        assert_eq!(source.to_string(), "store unavailable");
    }

    #[tokio::test]
    async fn test_autocomplete_invokes_focused_option_handler() {
        let dispatcher = dispatcher();
        let inv = invocation(
            "account",
            vec![InvocationOption::subcommand(
                "balance",
                vec![
                    InvocationOption::value("note", OptionKind::String, "hi"),
                    InvocationOption::value("account", OptionKind::String, "sa").focused(),
                ],
            )],
        );

        let results = dispatcher
            .autocomplete(Calls::default(), inv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            results,
            vec![AutocompleteResult {
                option: "account".into(),
                choices: vec![OptionChoice::new("savings", "savings")],
            }]
        );
    }

    #[tokio::test]
    async fn test_autocomplete_without_handler_yields_nothing() {
        let dispatcher = dispatcher();
        let inv = invocation(
            "account",
            vec![InvocationOption::subcommand(
                "balance",
                vec![InvocationOption::value("note", OptionKind::String, "h").focused()],
            )],
        );

        let results = dispatcher
            .autocomplete(Calls::default(), inv)
            .await
            .unwrap()
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_autocomplete_for_unknown_command_is_none() {
        let dispatcher = dispatcher();
        let results = dispatcher
            .autocomplete(Calls::default(), invocation("nope", vec![]))
            .await
            .unwrap();
        assert!(results.is_none());
    }

    async fn echo(ctx: Context<Calls>) -> Result<Vec<OptionChoice>, HandlerError> {
        let typed = ctx.arguments().focused_text();
        Ok(vec![OptionChoice::new(typed.clone(), typed)])
    }

    #[tokio::test]
    async fn test_each_focused_option_completes_its_own_text() {
        let tree = CommandTree::new(vec![CommandNode::leaf("swap", "Swap", balance)
            .with_option(CommandOption::new("a", "First", OptionKind::String).autocomplete(echo))
            .with_option(CommandOption::new("b", "Second", OptionKind::String).autocomplete(echo))])
        .unwrap();
        let dispatcher = Dispatcher::new(tree);
        let inv = invocation(
            "swap",
            vec![
                InvocationOption::value("a", OptionKind::String, "AAA").focused(),
                InvocationOption::value("b", OptionKind::String, "BBB").focused(),
            ],
        );

        let results = dispatcher
            .autocomplete(Calls::default(), inv)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            results,
            vec![
                AutocompleteResult {
                    option: "a".into(),
                    choices: vec![OptionChoice::new("AAA", "AAA")],
                },
                AutocompleteResult {
                    option: "b".into(),
                    choices: vec![OptionChoice::new("BBB", "BBB")],
                },
            ]
        );
    }
}

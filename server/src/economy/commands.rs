//! The economy command set.
//!
//! `economy {create, delete, list, register, unregister}`,
//! `account {open, close, balance, pay}` and
//! `permissions {set, clear, view}`.

use std::fmt::Write as _;
use std::future::Future;

use taubot_common::{AccountType, PlatformId};

use super::error::{EconomyError, EconomyResult};
use super::operations::{self, GrantTarget, NewAccount, NewEconomy, TransferRequest};
use crate::api::AppState;
use crate::commands::{
    CommandNode, CommandOption, CommandTree, Context, HandlerError, OptionChoice, OptionKind,
    Reply, TreeError,
};
use crate::permissions::{Grant, GrantScope, Permission};

/// Platform permission bit for "Manage Server"; hides admin groups by default.
const MANAGE_GUILD: u64 = 1 << 5;

/// Turn an operation result into a reply.
///
/// User mistakes and denials become an ephemeral message. Store failures fail
/// the command so the host can log and report them.
fn respond(result: EconomyResult<Reply>) -> Result<Reply, HandlerError> {
    match result {
        Ok(reply) => Ok(reply),
        Err(err) if err.is_user_facing() => Ok(Reply::ephemeral(err.to_string())),
        Err(err) => Err(err.into()),
    }
}

/// Leaf whose handler returns an [`EconomyResult`].
fn leaf<F, Fut>(name: &str, description: &str, run: F) -> CommandNode<AppState>
where
    F: Fn(Context<AppState>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EconomyResult<Reply>> + Send + 'static,
{
    CommandNode::leaf(name, description, move |ctx| {
        let fut = run(ctx);
        async move { respond(fut.await) }
    })
}

fn to_choices(names: Vec<String>) -> Vec<OptionChoice> {
    names
        .into_iter()
        .map(|name| OptionChoice::new(name.clone(), name))
        .collect()
}

async fn economy_names(ctx: Context<AppState>) -> Result<Vec<OptionChoice>, HandlerError> {
    let prefix = ctx.arguments().focused_text();
    Ok(to_choices(
        operations::suggest_economies(&ctx.state, &prefix).await?,
    ))
}

async fn account_names(ctx: Context<AppState>) -> Result<Vec<OptionChoice>, HandlerError> {
    let prefix = ctx.arguments().focused_text();
    Ok(to_choices(
        operations::suggest_accounts(&ctx.state, &ctx.principal, &prefix).await?,
    ))
}

fn economy_option(description: &str) -> CommandOption<AppState> {
    CommandOption::new("name", description, OptionKind::String)
        .required()
        .autocomplete(economy_names)
}

fn account_option(name: &str, description: &str) -> CommandOption<AppState> {
    CommandOption::new(name, description, OptionKind::String).autocomplete(account_names)
}

fn permission_option() -> CommandOption<AppState> {
    Permission::ALL.into_iter().fold(
        CommandOption::new("permission", "Permission to change", OptionKind::Integer).required(),
        |option, permission| {
            option.choice(OptionChoice::new(
                permission.label(),
                i64::from(permission.id()),
            ))
        },
    )
}

fn scope_option() -> CommandOption<AppState> {
    CommandOption::new(
        "scope",
        "Where the grant applies (default: this server's economy)",
        OptionKind::String,
    )
    .choice(OptionChoice::new("Global", "global"))
    .choice(OptionChoice::new("Economy", "economy"))
    .choice(OptionChoice::new("Account", "account"))
}

fn grantee_options(node: CommandNode<AppState>) -> CommandNode<AppState> {
    node.with_option(CommandOption::new("user", "User to target", OptionKind::User))
        .with_option(CommandOption::new("role", "Role to target", OptionKind::Role))
}

/// Build the full command tree.
pub fn build_tree() -> Result<CommandTree<AppState>, TreeError> {
    CommandTree::new(vec![
        CommandNode::group("economy", "Create and manage economies")
            .with_default_member_permissions(MANAGE_GUILD)
            .with_subcommand(
                leaf("create", "Create an economy for this server", economy_create)
                    .with_option(
                        CommandOption::new("name", "Economy name", OptionKind::String).required(),
                    )
                    .with_option(
                        CommandOption::new("currency", "Currency name", OptionKind::String)
                            .required(),
                    )
                    .with_option(
                        CommandOption::new("unit", "Currency symbol", OptionKind::String)
                            .required(),
                    ),
            )
            .with_subcommand(
                leaf("delete", "Delete an economy and all of its accounts", economy_delete)
                    .with_option(economy_option("Economy to delete")),
            )
            .with_subcommand(leaf("list", "List every economy", economy_list))
            .with_subcommand(
                leaf("register", "Make this server use an economy", economy_register)
                    .with_option(economy_option("Economy to use")),
            )
            .with_subcommand(leaf(
                "unregister",
                "Detach this server from its economy",
                economy_unregister,
            )),
        CommandNode::group("account", "Open, close and use accounts")
            .with_subcommand(
                leaf("open", "Open an account", account_open)
                    .with_option(
                        CommandOption::new("name", "Account name", OptionKind::String).required(),
                    )
                    .with_option(AccountType::ALL.into_iter().fold(
                        CommandOption::new("type", "Account type (default: user)", OptionKind::String),
                        |option, kind| option.choice(OptionChoice::new(kind.as_str(), kind.as_str())),
                    )),
            )
            .with_subcommand(
                leaf("close", "Close an account", account_close)
                    .with_option(account_option("account", "Account to close").required()),
            )
            .with_subcommand(
                leaf("balance", "Show an account balance", account_balance)
                    .with_option(account_option("account", "Account (default: your own)")),
            )
            .with_subcommand(
                leaf("pay", "Send money to another user", account_pay)
                    .with_option(
                        CommandOption::new("to", "Recipient", OptionKind::User).required(),
                    )
                    .with_option(
                        CommandOption::new("amount", "Amount to send", OptionKind::Integer)
                            .required(),
                    )
                    .with_option(account_option("from", "Account to pay from (default: your own)")),
            ),
        CommandNode::group("permissions", "Grant and revoke economy permissions")
            .with_default_member_permissions(MANAGE_GUILD)
            .with_subcommand(grantee_options(
                leaf("set", "Allow or deny a permission", permissions_set)
                    .with_option(permission_option())
                    .with_option(
                        CommandOption::new("value", "Allow (true) or deny (false)", OptionKind::Boolean)
                            .required(),
                    ),
            )
            .with_option(scope_option())
            .with_option(account_option("account", "Account, when scope is account")))
            .with_subcommand(grantee_options(
                leaf("clear", "Remove a permission grant", permissions_clear)
                    .with_option(permission_option()),
            )
            .with_option(scope_option())
            .with_option(account_option("account", "Account, when scope is account")))
            .with_subcommand(grantee_options(leaf(
                "view",
                "List permission grants (default: your own)",
                permissions_view,
            ))),
    ])
}

// ============================================================================
// economy
// ============================================================================

async fn economy_create(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let args = ctx.arguments();
    let params = NewEconomy {
        name: args.require_string("name")?.to_string(),
        currency_name: args.require_string("currency")?.to_string(),
        currency_unit: args.require_string("unit")?.to_string(),
    };
    let economy = operations::create_economy(&ctx.state, &ctx.principal, params).await?;
    Ok(Reply::public(format!(
        "Created economy **{}** using {} ({}). This server is now registered to it.",
        economy.name, economy.currency_name, economy.currency_unit
    )))
}

async fn economy_delete(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let name = ctx.arguments().require_string("name")?;
    let economy = operations::delete_economy(&ctx.state, &ctx.principal, name).await?;
    Ok(Reply::public(format!("Deleted economy **{}**", economy.name)))
}

async fn economy_list(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let economies = operations::list_economies(&ctx.state).await?;
    if economies.is_empty() {
        return Ok(Reply::ephemeral("There are no economies yet"));
    }
    let mut content = String::from("Economies:");
    for economy in &economies {
        let _ = write!(
            content,
            "\n- **{}** ({}, {})",
            economy.name, economy.currency_name, economy.currency_unit
        );
    }
    Ok(Reply::ephemeral(content))
}

async fn economy_register(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let name = ctx.arguments().require_string("name")?;
    let economy = operations::register_guild(&ctx.state, &ctx.principal, name).await?;
    Ok(Reply::public(format!(
        "This server now uses the **{}** economy",
        economy.name
    )))
}

async fn economy_unregister(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let economy = operations::unregister_guild(&ctx.state, &ctx.principal).await?;
    Ok(Reply::public(format!(
        "This server no longer uses the **{}** economy",
        economy.name
    )))
}

// ============================================================================
// account
// ============================================================================

async fn account_open(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let args = ctx.arguments();
    let account_type = match args.string("type")? {
        Some(raw) => raw
            .parse::<AccountType>()
            .map_err(|e| EconomyError::Validation(e.to_string()))?,
        None => AccountType::User,
    };
    let params = NewAccount {
        name: args.require_string("name")?.to_string(),
        account_type,
    };
    let (economy, account) = operations::open_account(&ctx.state, &ctx.principal, params).await?;
    Ok(Reply::ephemeral(format!(
        "Opened {} account **{}** in {}",
        account.account_type, account.name, economy.name
    )))
}

async fn account_close(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let name = ctx.arguments().require_string("account")?;
    let account = operations::close_account(&ctx.state, &ctx.principal, name).await?;
    Ok(Reply::ephemeral(format!("Closed account **{}**", account.name)))
}

async fn account_balance(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let name = ctx.arguments().string("account")?;
    let (economy, account) = operations::view_balance(&ctx.state, &ctx.principal, name).await?;
    Ok(Reply::ephemeral(format!(
        "**{}** holds {}",
        account.name,
        economy.format_amount(account.balance)
    )))
}

async fn account_pay(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let args = ctx.arguments();
    let request = TransferRequest {
        from: args.string("from")?.map(str::to_string),
        to: args.require_id("to")?,
        amount: args.require_integer("amount")?,
    };
    let to = request.to.clone();
    let (economy, transfer) = operations::transfer(&ctx.state, &ctx.principal, request).await?;
    Ok(Reply::public(format!(
        "Sent {} to <@{to}>",
        economy.format_amount(transfer.amount)
    )))
}

// ============================================================================
// permissions
// ============================================================================

/// Which grantee a permissions command targets, and how to mention it.
fn grantee(ctx: &Context<AppState>, default_self: bool) -> EconomyResult<(PlatformId, String)> {
    let args = ctx.arguments();
    match (args.id("user")?, args.id("role")?) {
        (Some(user), None) => {
            let mention = format!("<@{user}>");
            Ok((user, mention))
        }
        (None, Some(role)) => {
            let mention = format!("<@&{role}>");
            Ok((role, mention))
        }
        (None, None) if default_self => {
            let user = ctx.principal.user_id.clone();
            let mention = format!("<@{user}>");
            Ok((user, mention))
        }
        (None, None) => Err(EconomyError::Validation(
            "Specify a user or a role".into(),
        )),
        (Some(_), Some(_)) => Err(EconomyError::Validation(
            "Specify either a user or a role, not both".into(),
        )),
    }
}

fn permission_arg(ctx: &Context<AppState>) -> EconomyResult<Permission> {
    let raw = ctx.arguments().require_integer("permission")?;
    Permission::from_id(raw)
        .ok_or_else(|| EconomyError::Validation(format!("Unknown permission id {raw}")))
}

fn target_arg(ctx: &Context<AppState>) -> EconomyResult<GrantTarget> {
    let args = ctx.arguments();
    match args.string("scope")?.unwrap_or("economy") {
        "global" => Ok(GrantTarget::Global),
        "economy" => Ok(GrantTarget::Economy),
        "account" => Ok(GrantTarget::Account(
            args.require_string("account")?.to_string(),
        )),
        other => Err(EconomyError::Validation(format!("Unknown scope `{other}`"))),
    }
}

fn describe_scope(scope: GrantScope) -> &'static str {
    match scope {
        GrantScope::Global => "everywhere",
        GrantScope::Economy(_) => "in this economy",
        GrantScope::Account(_) => "on one account",
    }
}

async fn permissions_set(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let (grantee, mention) = grantee(&ctx, false)?;
    let permission = permission_arg(&ctx)?;
    let target = target_arg(&ctx)?;
    let value = ctx.arguments().require_boolean("value")?;

    let grant = operations::set_grant(&ctx.state, &ctx.principal, &grantee, permission, target, value)
        .await?;
    Ok(Reply::public(format!(
        "{} `{permission}` for {mention} {}",
        if grant.value { "Allowed" } else { "Denied" },
        describe_scope(grant.scope)
    )))
}

async fn permissions_clear(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let (grantee, mention) = grantee(&ctx, false)?;
    let permission = permission_arg(&ctx)?;
    let target = target_arg(&ctx)?;

    operations::clear_grant(&ctx.state, &ctx.principal, &grantee, permission, target).await?;
    Ok(Reply::public(format!(
        "Cleared `{permission}` for {mention}"
    )))
}

fn render_grants(mention: &str, grants: &[Grant]) -> String {
    if grants.is_empty() {
        return format!("{mention} has no permission grants");
    }
    let mut content = format!("Grants for {mention}:");
    for grant in grants {
        let _ = write!(
            content,
            "\n- {} `{}` {}",
            if grant.value { "allow" } else { "deny" },
            grant.permission,
            describe_scope(grant.scope)
        );
    }
    content
}

async fn permissions_view(ctx: Context<AppState>) -> EconomyResult<Reply> {
    let (grantee, mention) = grantee(&ctx, true)?;
    let grants = operations::list_grants(&ctx.state, &ctx.principal, &grantee).await?;
    Ok(Reply::ephemeral(render_grants(&mention, &grants)))
}

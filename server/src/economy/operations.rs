//! Economy operations.
//!
//! Every mutating operation checks its permission through the resolver before
//! touching the store. Checks use the effective scope chain (global, then the
//! economy, then the account), so a global grant applies everywhere unless a
//! narrower grant overrides it.

use taubot_common::{AccountType, PlatformId, Principal};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::error::{EconomyError, EconomyResult};
use crate::api::AppState;
use crate::db::{self, Account, Economy, Transfer, TransferOutcome};
use crate::permissions::{queries as grants, Grant, GrantScope, Permission, PermissionSet};

/// Permissions that let a principal read other principals' grants.
const GRANT_VIEWERS: PermissionSet =
    PermissionSet::MANAGE_PERMISSIONS.union(PermissionSet::MANAGE_ECONOMIES);

/// Granted to an account's owner on that account when it is opened.
pub const OWNER_PERMISSIONS: PermissionSet = PermissionSet::TRANSFER_FUNDS
    .union(PermissionSet::CLOSE_ACCOUNT)
    .union(PermissionSet::VIEW_BALANCE);

/// Parameters for a new economy.
#[derive(Debug, Clone, Validate)]
pub struct NewEconomy {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub currency_name: String,
    #[validate(length(min = 1, max = 8))]
    pub currency_unit: String,
}

/// Parameters for a new account.
#[derive(Debug, Clone, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    pub account_type: AccountType,
}

/// Parameters for a transfer.
#[derive(Debug, Clone, Validate)]
pub struct TransferRequest {
    /// Source account name. The caller's personal account when absent.
    pub from: Option<String>,
    pub to: PlatformId,
    #[validate(range(min = 1))]
    pub amount: i64,
}

/// Where a grant should apply, as named by the invoking user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantTarget {
    Global,
    /// The economy of the invoking guild.
    Economy,
    /// A named account in the invoking guild's economy.
    Account(String),
}

/// A resolved grant scope together with the chain it is checked against.
struct ScopeChain {
    scope: GrantScope,
    economy: Option<Uuid>,
    account: Option<Uuid>,
}

fn guild_of(principal: &Principal) -> EconomyResult<&PlatformId> {
    principal.guild_id.as_ref().ok_or(EconomyError::NoGuild)
}

/// Economy the invoking guild is bound to.
pub async fn guild_economy(state: &AppState, principal: &Principal) -> EconomyResult<Economy> {
    let guild = guild_of(principal)?;
    db::economy_for_guild(&state.db, guild)
        .await?
        .ok_or(EconomyError::Unregistered)
}

async fn economy_named(state: &AppState, name: &str) -> EconomyResult<Economy> {
    db::find_economy_by_name(&state.db, name)
        .await?
        .ok_or_else(|| EconomyError::not_found(format!("Economy `{name}`")))
}

async fn account_named(state: &AppState, economy: &Economy, name: &str) -> EconomyResult<Account> {
    db::find_account_by_name(&state.db, economy.id, name)
        .await?
        .ok_or_else(|| EconomyError::not_found(format!("Account `{name}`")))
}

async fn personal_account(
    state: &AppState,
    economy: &Economy,
    owner: &PlatformId,
) -> EconomyResult<Account> {
    db::find_user_account(&state.db, economy.id, owner)
        .await?
        .ok_or_else(|| EconomyError::not_found(format!("Personal account of {owner}")))
}

/// Check `permission` against one account.
///
/// The owner is checked across the whole scope chain. Anyone else needs a
/// grant bound to the account itself; global and economy grants never reach
/// into accounts the caller does not own.
async fn require_on_account(
    state: &AppState,
    principal: &Principal,
    permission: Permission,
    account: &Account,
) -> EconomyResult<()> {
    let resolver = state.resolver();
    if principal.is_self(&account.owner_id) {
        resolver
            .require(principal, permission, Some(account.economy_id), Some(account.id))
            .await?;
        return Ok(());
    }

    if resolver
        .resolve(principal, permission, Some(GrantScope::Account(account.id)))
        .await?
        .is_granted()
    {
        Ok(())
    } else {
        Err(EconomyError::Unauthorized(permission))
    }
}

fn conflict_on_unique(err: sqlx::Error, message: &str) -> EconomyError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            EconomyError::Conflict(message.to_string())
        }
        other => EconomyError::Database(other),
    }
}

// ============================================================================
// Economies
// ============================================================================

/// Create an economy and bind the invoking guild to it.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn create_economy(
    state: &AppState,
    principal: &Principal,
    params: NewEconomy,
) -> EconomyResult<Economy> {
    params.validate()?;
    let guild = guild_of(principal)?;
    state
        .resolver()
        .require(principal, Permission::ManageEconomies, None, None)
        .await?;

    let economy = db::create_economy(
        &state.db,
        &params.name,
        &params.currency_name,
        &params.currency_unit,
        guild,
    )
    .await
    .map_err(|e| conflict_on_unique(e, "An economy with that name or currency already exists"))?;

    info!(economy_id = %economy.id, name = %economy.name, guild = %guild, "Economy created");
    Ok(economy)
}

/// Delete an economy by name.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn delete_economy(
    state: &AppState,
    principal: &Principal,
    name: &str,
) -> EconomyResult<Economy> {
    state
        .resolver()
        .require(principal, Permission::ManageEconomies, None, None)
        .await?;
    let economy = economy_named(state, name).await?;

    if !db::delete_economy(&state.db, economy.id).await? {
        return Err(EconomyError::not_found(format!("Economy `{name}`")));
    }

    info!(economy_id = %economy.id, name = %economy.name, "Economy deleted");
    Ok(economy)
}

pub async fn list_economies(state: &AppState) -> EconomyResult<Vec<Economy>> {
    Ok(db::list_economies(&state.db).await?)
}

/// Bind the invoking guild to a named economy, replacing any prior binding.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn register_guild(
    state: &AppState,
    principal: &Principal,
    economy_name: &str,
) -> EconomyResult<Economy> {
    let guild = guild_of(principal)?;
    let economy = economy_named(state, economy_name).await?;
    state
        .resolver()
        .require(principal, Permission::ManageEconomies, Some(economy.id), None)
        .await?;

    db::rebind_guild(&state.db, guild, economy.id).await?;

    info!(economy_id = %economy.id, guild = %guild, "Guild registered");
    Ok(economy)
}

/// Unbind the invoking guild from its economy.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn unregister_guild(state: &AppState, principal: &Principal) -> EconomyResult<Economy> {
    let guild = guild_of(principal)?;
    let economy = guild_economy(state, principal).await?;
    state
        .resolver()
        .require(principal, Permission::ManageEconomies, Some(economy.id), None)
        .await?;

    if !db::unbind_guild(&state.db, guild).await? {
        return Err(EconomyError::Unregistered);
    }

    info!(economy_id = %economy.id, guild = %guild, "Guild unregistered");
    Ok(economy)
}

// ============================================================================
// Accounts
// ============================================================================

/// Open an account owned by the invoking user in the guild's economy.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn open_account(
    state: &AppState,
    principal: &Principal,
    params: NewAccount,
) -> EconomyResult<(Economy, Account)> {
    params.validate()?;
    let economy = guild_economy(state, principal).await?;

    let permission = if params.account_type.is_special() {
        Permission::OpenSpecialAccount
    } else {
        Permission::OpenAccount
    };
    state
        .resolver()
        .require(principal, permission, Some(economy.id), None)
        .await?;

    if params.account_type == AccountType::User
        && db::find_user_account(&state.db, economy.id, &principal.user_id)
            .await?
            .is_some()
    {
        return Err(EconomyError::Conflict(
            "You already have a personal account in this economy".into(),
        ));
    }

    let account = db::create_account(
        &state.db,
        economy.id,
        &params.name,
        params.account_type,
        &principal.user_id,
        OWNER_PERMISSIONS,
    )
    .await
    .map_err(|e| conflict_on_unique(e, "An account with that name already exists"))?;

    info!(account_id = %account.id, economy_id = %economy.id, kind = %account.account_type, "Account opened");
    Ok((economy, account))
}

/// Close a named account.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn close_account(
    state: &AppState,
    principal: &Principal,
    name: &str,
) -> EconomyResult<Account> {
    let economy = guild_economy(state, principal).await?;
    let account = account_named(state, &economy, name).await?;
    require_on_account(state, principal, Permission::CloseAccount, &account).await?;

    if !db::close_account(&state.db, account.id).await? {
        return Err(EconomyError::not_found(format!("Account `{name}`")));
    }

    info!(account_id = %account.id, "Account closed");
    Ok(account)
}

/// Balance of a named account, or of the caller's personal account.
///
/// Owners may always see their own balance.
pub async fn view_balance(
    state: &AppState,
    principal: &Principal,
    name: Option<&str>,
) -> EconomyResult<(Economy, Account)> {
    let economy = guild_economy(state, principal).await?;
    let account = match name {
        Some(name) => account_named(state, &economy, name).await?,
        None => personal_account(state, &economy, &principal.user_id).await?,
    };

    if !principal.is_self(&account.owner_id) {
        state
            .resolver()
            .require(principal, Permission::ViewBalance, Some(economy.id), Some(account.id))
            .await?;
    }

    Ok((economy, account))
}

/// Pay another user from one of the caller's accounts.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn transfer(
    state: &AppState,
    principal: &Principal,
    request: TransferRequest,
) -> EconomyResult<(Economy, Transfer)> {
    request.validate()?;
    let economy = guild_economy(state, principal).await?;

    let from = match request.from.as_deref() {
        Some(name) => account_named(state, &economy, name).await?,
        None => personal_account(state, &economy, &principal.user_id).await?,
    };
    let to = personal_account(state, &economy, &request.to).await?;
    if from.id == to.id {
        return Err(EconomyError::Validation(
            "Cannot transfer to the same account".into(),
        ));
    }

    require_on_account(state, principal, Permission::TransferFunds, &from).await?;

    match db::transfer_funds(&state.db, from.id, to.id, request.amount, &principal.user_id).await? {
        TransferOutcome::Completed(transfer) => {
            info!(
                transfer_id = %transfer.id,
                from = %from.id,
                to = %to.id,
                amount = transfer.amount,
                "Transfer completed"
            );
            Ok((economy, transfer))
        }
        TransferOutcome::AccountMissing(id) => Err(EconomyError::not_found(format!("Account {id}"))),
        TransferOutcome::CrossEconomy => Err(EconomyError::Validation(
            "Both accounts must belong to the same economy".into(),
        )),
        TransferOutcome::InsufficientFunds { available } => {
            Err(EconomyError::InsufficientFunds { available })
        }
    }
}

// ============================================================================
// Permission management
// ============================================================================

async fn scope_chain(
    state: &AppState,
    principal: &Principal,
    target: &GrantTarget,
) -> EconomyResult<ScopeChain> {
    Ok(match target {
        GrantTarget::Global => ScopeChain {
            scope: GrantScope::Global,
            economy: None,
            account: None,
        },
        GrantTarget::Economy => {
            let economy = guild_economy(state, principal).await?;
            ScopeChain {
                scope: GrantScope::Economy(economy.id),
                economy: Some(economy.id),
                account: None,
            }
        }
        GrantTarget::Account(name) => {
            let economy = guild_economy(state, principal).await?;
            let account = account_named(state, &economy, name).await?;
            ScopeChain {
                scope: GrantScope::Account(account.id),
                economy: Some(economy.id),
                account: Some(account.id),
            }
        }
    })
}

/// Grant or deny `permission` to a user or role at `target`.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn set_grant(
    state: &AppState,
    principal: &Principal,
    grantee: &PlatformId,
    permission: Permission,
    target: GrantTarget,
    value: bool,
) -> EconomyResult<Grant> {
    let chain = scope_chain(state, principal, &target).await?;
    state
        .resolver()
        .require(principal, Permission::ManagePermissions, chain.economy, chain.account)
        .await?;

    let grant = grants::set_grant(&state.db, grantee, permission, chain.scope, value).await?;
    info!(grant_id = %grant.id, grantee = %grantee, %permission, scope = %chain.scope, value, "Grant set");
    Ok(grant)
}

/// Remove the grant of `permission` for a user or role at `target`.
#[tracing::instrument(skip(state, principal), fields(user = %principal.user_id))]
pub async fn clear_grant(
    state: &AppState,
    principal: &Principal,
    grantee: &PlatformId,
    permission: Permission,
    target: GrantTarget,
) -> EconomyResult<()> {
    let chain = scope_chain(state, principal, &target).await?;
    state
        .resolver()
        .require(principal, Permission::ManagePermissions, chain.economy, chain.account)
        .await?;

    if !grants::clear_grant(&state.db, grantee, permission, chain.scope).await? {
        return Err(EconomyError::not_found(format!(
            "Grant of `{permission}` to {grantee} at {}",
            chain.scope
        )));
    }

    info!(grantee = %grantee, %permission, scope = %chain.scope, "Grant cleared");
    Ok(())
}

/// Grants held by `grantee`.
///
/// Anyone may list their own grants. Listing someone else's is read-only, so
/// any allowing `ManagePermissions` or `ManageEconomies` grant suffices, at
/// whatever scope it was given.
pub async fn list_grants(
    state: &AppState,
    principal: &Principal,
    grantee: &PlatformId,
) -> EconomyResult<Vec<Grant>> {
    if !principal.is_self(grantee)
        && !state
            .resolver()
            .has_any(principal, GRANT_VIEWERS, None)
            .await?
    {
        return Err(EconomyError::Unauthorized(Permission::ManagePermissions));
    }

    Ok(grants::list_grants(&state.db, grantee).await?)
}

// ============================================================================
// Autocomplete lookups
// ============================================================================

/// Economy names starting with `prefix`.
pub async fn suggest_economies(state: &AppState, prefix: &str) -> EconomyResult<Vec<String>> {
    Ok(db::search_economy_names(&state.db, prefix).await?)
}

/// Account names in the invoking guild's economy starting with `prefix`.
///
/// Empty when the guild is not registered.
pub async fn suggest_accounts(
    state: &AppState,
    principal: &Principal,
    prefix: &str,
) -> EconomyResult<Vec<String>> {
    let Some(guild) = principal.guild_id.as_ref() else {
        return Ok(Vec::new());
    };
    match db::economy_for_guild(&state.db, guild).await? {
        Some(economy) => Ok(db::search_account_names(&state.db, economy.id, prefix).await?),
        None => Ok(Vec::new()),
    }
}

//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.

use sqlx::{PgConnection, PgPool};
use taubot_common::{AccountType, PlatformId};
use tracing::error;
use uuid::Uuid;

use super::models::{Account, Economy, GuildBinding, Transfer, TransferOutcome};
use crate::permissions::PermissionSet;

/// Log and return a database error with context.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

/// Upper bound on rows returned to autocomplete.
pub const SUGGESTION_LIMIT: i64 = 25;

// ============================================================================
// Economy Queries
// ============================================================================

/// Create an economy and bind `guild_id` to it in one transaction.
pub async fn create_economy(
    pool: &PgPool,
    name: &str,
    currency_name: &str,
    currency_unit: &str,
    guild_id: &PlatformId,
) -> sqlx::Result<Economy> {
    let mut tx = pool.begin().await?;

    let economy = sqlx::query_as::<_, Economy>(
        r"
        INSERT INTO economies (name, currency_name, currency_unit, parent_guild_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(name)
    .bind(currency_name)
    .bind(currency_unit)
    .bind(guild_id.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error!("create_economy", name = %name))?;

    rebind_guild_in(&mut tx, guild_id, economy.id).await?;
    tx.commit().await?;

    Ok(economy)
}

/// Find economy by ID.
pub async fn find_economy_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Economy>> {
    sqlx::query_as::<_, Economy>("SELECT * FROM economies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_economy_by_id", economy_id = %id))
}

/// Find economy by name (case-insensitive).
pub async fn find_economy_by_name(pool: &PgPool, name: &str) -> sqlx::Result<Option<Economy>> {
    sqlx::query_as::<_, Economy>("SELECT * FROM economies WHERE lower(name) = lower($1)")
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_economy_by_name", name = %name))
}

/// All economies, by name.
pub async fn list_economies(pool: &PgPool) -> sqlx::Result<Vec<Economy>> {
    sqlx::query_as::<_, Economy>("SELECT * FROM economies ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(query = "list_economies", error = %e, "Database query failed");
            e
        })
}

/// Economy names starting with `prefix`, for autocomplete.
pub async fn search_economy_names(pool: &PgPool, prefix: &str) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r"
        SELECT name FROM economies
        WHERE name ILIKE $1 || '%'
        ORDER BY name
        LIMIT $2
        ",
    )
    .bind(escape_like(prefix))
    .bind(SUGGESTION_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(db_error!("search_economy_names", prefix = %prefix))
}

/// Delete an economy. Accounts cascade; guild bindings are left unbound.
///
/// Returns `true` if a row was removed.
pub async fn delete_economy(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM economies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_economy", economy_id = %id))?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Guild Binding Queries
// ============================================================================

/// Current binding row for a guild.
pub async fn find_guild_binding(
    pool: &PgPool,
    guild_id: &PlatformId,
) -> sqlx::Result<Option<GuildBinding>> {
    sqlx::query_as::<_, GuildBinding>("SELECT * FROM guild_bindings WHERE guild_id = $1")
        .bind(guild_id.as_str())
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_guild_binding", guild_id = %guild_id))
}

/// Economy a guild is bound to, if any.
pub async fn economy_for_guild(
    pool: &PgPool,
    guild_id: &PlatformId,
) -> sqlx::Result<Option<Economy>> {
    sqlx::query_as::<_, Economy>(
        r"
        SELECT e.*
        FROM economies e
        JOIN guild_bindings g ON g.economy_id = e.id
        WHERE g.guild_id = $1
        ",
    )
    .bind(guild_id.as_str())
    .fetch_optional(pool)
    .await
    .map_err(db_error!("economy_for_guild", guild_id = %guild_id))
}

/// Drop any existing binding for `guild_id`, then bind it to `economy_id`.
async fn rebind_guild_in(
    conn: &mut PgConnection,
    guild_id: &PlatformId,
    economy_id: Uuid,
) -> sqlx::Result<GuildBinding> {
    sqlx::query("DELETE FROM guild_bindings WHERE guild_id = $1")
        .bind(guild_id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error!("rebind_guild.unbind", guild_id = %guild_id))?;

    sqlx::query_as::<_, GuildBinding>(
        r"
        INSERT INTO guild_bindings (guild_id, economy_id)
        VALUES ($1, $2)
        RETURNING *
        ",
    )
    .bind(guild_id.as_str())
    .bind(economy_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("rebind_guild.bind", guild_id = %guild_id, economy_id = %economy_id))
}

/// Bind a guild to an economy, replacing any prior binding atomically.
pub async fn rebind_guild(
    pool: &PgPool,
    guild_id: &PlatformId,
    economy_id: Uuid,
) -> sqlx::Result<GuildBinding> {
    let mut tx = pool.begin().await?;
    let binding = rebind_guild_in(&mut tx, guild_id, economy_id).await?;
    tx.commit().await?;
    Ok(binding)
}

/// Remove a guild's binding. Returns `true` if one existed.
pub async fn unbind_guild(pool: &PgPool, guild_id: &PlatformId) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM guild_bindings WHERE guild_id = $1")
        .bind(guild_id.as_str())
        .execute(pool)
        .await
        .map_err(db_error!("unbind_guild", guild_id = %guild_id))?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Account Queries
// ============================================================================

/// Open a new account with a zero balance.
///
/// The owner receives an allowing account-scoped grant of each of
/// `owner_permissions` in the same transaction.
pub async fn create_account(
    pool: &PgPool,
    economy_id: Uuid,
    name: &str,
    account_type: AccountType,
    owner_id: &PlatformId,
    owner_permissions: PermissionSet,
) -> sqlx::Result<Account> {
    let mut tx = pool.begin().await?;

    let account = sqlx::query_as::<_, Account>(
        r"
        INSERT INTO accounts (economy_id, name, account_type, owner_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(economy_id)
    .bind(name)
    .bind(account_type.as_str())
    .bind(owner_id.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error!("create_account", economy_id = %economy_id, owner_id = %owner_id))?;

    sqlx::query(
        r"
        INSERT INTO grants (grantee_id, permission_id, account_id, value)
        SELECT $1, permission_id, $3, TRUE
        FROM UNNEST($2::SMALLINT[]) AS permission_id
        ON CONFLICT ON CONSTRAINT grants_unique_scope DO NOTHING
        ",
    )
    .bind(owner_id.as_str())
    .bind(owner_permissions.ids())
    .bind(account.id)
    .execute(&mut *tx)
    .await
    .map_err(db_error!("grant_account_owner", account_id = %account.id, owner_id = %owner_id))?;

    tx.commit().await?;
    Ok(account)
}

/// Find a live account by ID.
pub async fn find_account(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND NOT deleted")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_account", account_id = %id))
}

/// Find a live account by name inside an economy (case-insensitive).
pub async fn find_account_by_name(
    pool: &PgPool,
    economy_id: Uuid,
    name: &str,
) -> sqlx::Result<Option<Account>> {
    sqlx::query_as::<_, Account>(
        r"
        SELECT * FROM accounts
        WHERE economy_id = $1 AND lower(name) = lower($2) AND NOT deleted
        ",
    )
    .bind(economy_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_account_by_name", economy_id = %economy_id, name = %name))
}

/// The owner's live personal account in an economy.
pub async fn find_user_account(
    pool: &PgPool,
    economy_id: Uuid,
    owner_id: &PlatformId,
) -> sqlx::Result<Option<Account>> {
    sqlx::query_as::<_, Account>(
        r"
        SELECT * FROM accounts
        WHERE economy_id = $1 AND owner_id = $2 AND account_type = 'user' AND NOT deleted
        ",
    )
    .bind(economy_id)
    .bind(owner_id.as_str())
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_user_account", economy_id = %economy_id, owner_id = %owner_id))
}

/// Live account names in an economy starting with `prefix`, for autocomplete.
pub async fn search_account_names(
    pool: &PgPool,
    economy_id: Uuid,
    prefix: &str,
) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r"
        SELECT name FROM accounts
        WHERE economy_id = $1 AND NOT deleted AND name ILIKE $2 || '%'
        ORDER BY name
        LIMIT $3
        ",
    )
    .bind(economy_id)
    .bind(escape_like(prefix))
    .bind(SUGGESTION_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(db_error!("search_account_names", economy_id = %economy_id, prefix = %prefix))
}

/// Soft-delete an account. Returns `true` if a live account was closed.
pub async fn close_account(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE accounts SET deleted = TRUE WHERE id = $1 AND NOT deleted")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("close_account", account_id = %id))?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Transfer Queries
// ============================================================================

/// Move `amount` between two accounts.
///
/// Both rows are locked in id order before any check, so concurrent transfers
/// touching the same pair cannot deadlock or overdraw. Business failures are
/// reported through [`TransferOutcome`] and roll the transaction back.
pub async fn transfer_funds(
    pool: &PgPool,
    from_id: Uuid,
    to_id: Uuid,
    amount: i64,
    initiated_by: &PlatformId,
) -> sqlx::Result<TransferOutcome> {
    let mut tx = pool.begin().await?;

    let locked = sqlx::query_as::<_, Account>(
        r"
        SELECT * FROM accounts
        WHERE id = ANY($1) AND NOT deleted
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(vec![from_id, to_id])
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error!("transfer_funds.lock", from = %from_id, to = %to_id))?;

    let Some(from) = locked.iter().find(|a| a.id == from_id) else {
        return Ok(TransferOutcome::AccountMissing(from_id));
    };
    let Some(to) = locked.iter().find(|a| a.id == to_id) else {
        return Ok(TransferOutcome::AccountMissing(to_id));
    };
    if from.economy_id != to.economy_id {
        return Ok(TransferOutcome::CrossEconomy);
    }
    if from.balance < amount {
        return Ok(TransferOutcome::InsufficientFunds {
            available: from.balance,
        });
    }

    sqlx::query("UPDATE accounts SET balance = balance - $2 WHERE id = $1")
        .bind(from_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error!("transfer_funds.debit", account_id = %from_id))?;

    sqlx::query(
        "UPDATE accounts SET balance = balance + $2, total_balance = total_balance + $2 WHERE id = $1",
    )
    .bind(to_id)
    .bind(amount)
    .execute(&mut *tx)
    .await
    .map_err(db_error!("transfer_funds.credit", account_id = %to_id))?;

    let transfer = sqlx::query_as::<_, Transfer>(
        r"
        INSERT INTO transfers (economy_id, from_account_id, to_account_id, amount, initiated_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(from.economy_id)
    .bind(from_id)
    .bind(to_id)
    .bind(amount)
    .bind(initiated_by.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error!("transfer_funds.record", from = %from_id, to = %to_id))?;

    tx.commit().await?;
    Ok(TransferOutcome::Completed(transfer))
}

/// Escape `%`, `_` and `\` so user input matches literally in `LIKE`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

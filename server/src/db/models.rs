//! Database Models

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use taubot_common::{AccountType, PlatformId};
use uuid::Uuid;

/// Economy (tenant) model.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Economy {
    pub id: Uuid,
    pub name: String,
    pub currency_name: String,
    /// Short symbol printed next to amounts.
    pub currency_unit: String,
    #[sqlx(try_from = "String")]
    pub parent_guild_id: PlatformId,
    pub created_at: DateTime<Utc>,
}

impl Economy {
    /// Render an amount in this economy's currency.
    #[must_use]
    pub fn format_amount(&self, amount: i64) -> String {
        format!("{}{amount} {}", self.currency_unit, self.currency_name)
    }
}

/// Guild to economy binding. `economy_id` is `None` once the economy is gone.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct GuildBinding {
    #[sqlx(try_from = "String")]
    pub guild_id: PlatformId,
    pub economy_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Account model.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub economy_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub account_type: AccountType,
    #[sqlx(try_from = "String")]
    pub owner_id: PlatformId,
    pub balance: i64,
    /// Lifetime total credited to this account.
    pub total_balance: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Completed transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Transfer {
    pub id: Uuid,
    pub economy_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: i64,
    #[sqlx(try_from = "String")]
    pub initiated_by: PlatformId,
    pub created_at: DateTime<Utc>,
}

/// Result of a transfer attempt, checked under row locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed(Transfer),
    /// An account does not exist or is closed.
    AccountMissing(Uuid),
    /// The accounts belong to different economies.
    CrossEconomy,
    InsufficientFunds { available: i64 },
}

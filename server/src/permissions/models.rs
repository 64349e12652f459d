//! Grant records and their scopes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use taubot_common::PlatformId;
use uuid::Uuid;

use super::catalogue::Permission;
use super::store::StoreError;

/// Breadth at which a grant applies.
///
/// A grant is bound to at most one of an economy or an account. Account scope
/// implies the account's own economy; it never carries a separate economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GrantScope {
    /// No economy or account restriction.
    Global,
    /// Bound to one economy (tenant).
    Economy(Uuid),
    /// Bound to one account.
    Account(Uuid),
}

impl GrantScope {
    /// Specificity rank: global 1, economy 2, account 3. Higher is narrower.
    #[must_use]
    pub const fn specificity(self) -> u8 {
        match self {
            Self::Global => 1,
            Self::Economy(_) => 2,
            Self::Account(_) => 3,
        }
    }

    #[must_use]
    pub const fn economy_id(self) -> Option<Uuid> {
        match self {
            Self::Economy(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn account_id(self) -> Option<Uuid> {
        match self {
            Self::Account(id) => Some(id),
            _ => None,
        }
    }

    /// Rebuild a scope from its two nullable storage columns.
    ///
    /// Returns `None` when both are set, which the schema forbids.
    #[must_use]
    pub const fn from_columns(economy_id: Option<Uuid>, account_id: Option<Uuid>) -> Option<Self> {
        match (economy_id, account_id) {
            (None, None) => Some(Self::Global),
            (Some(id), None) => Some(Self::Economy(id)),
            (None, Some(id)) => Some(Self::Account(id)),
            (Some(_), Some(_)) => None,
        }
    }
}

impl std::fmt::Display for GrantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Economy(id) => write!(f, "economy {id}"),
            Self::Account(id) => write!(f, "account {id}"),
        }
    }
}

/// A stored permission assertion at one scope with a boolean outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub id: Uuid,
    /// User or role the grant is attributed to.
    pub grantee_id: PlatformId,
    pub permission: Permission,
    pub scope: GrantScope,
    pub value: bool,
}

/// Raw `grants` row.
#[derive(Debug, Clone, FromRow)]
pub struct GrantRow {
    pub id: Uuid,
    pub grantee_id: String,
    pub permission_id: i16,
    pub economy_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub value: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<GrantRow> for Grant {
    type Error = StoreError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| StoreError::Malformed {
            id: row.id,
            reason: reason.to_string(),
        };

        let grantee_id =
            PlatformId::parse(row.grantee_id.clone()).map_err(|_| malformed("bad grantee id"))?;
        let permission = Permission::from_id(i64::from(row.permission_id))
            .ok_or_else(|| malformed("unknown permission id"))?;
        let scope = GrantScope::from_columns(row.economy_id, row.account_id)
            .ok_or_else(|| malformed("bound to both an economy and an account"))?;

        Ok(Self {
            id: row.id,
            grantee_id,
            permission,
            scope,
            value: row.value,
        })
    }
}

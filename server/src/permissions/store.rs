//! Collaborator contracts the resolver depends on.
//!
//! The grant store answers "which grants exist for these identities", and the
//! role rank lookup answers "where does this role sit in its guild". Both are
//! object-safe so the application can hold them behind `Arc<dyn _>`.

use futures::future::BoxFuture;
use taubot_common::PlatformId;
use uuid::Uuid;

use super::catalogue::PermissionSet;
use super::models::{Grant, GrantScope};

/// Grant store failures. Never interpreted as "no grant".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row violates the grant invariants.
    #[error("Malformed grant {id}: {reason}")]
    Malformed { id: Uuid, reason: String },

    /// Backend could not be reached (used by non-SQL stores).
    #[error("Grant store unavailable: {0}")]
    Unavailable(String),
}

/// Which scopes a grant query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Every scope.
    Any,
    /// Global grants only.
    Global,
    /// Grants bound to exactly this economy.
    Economy(Uuid),
    /// Grants bound to exactly this account.
    Account(Uuid),
    /// Global grants plus those bound to the given economy or account.
    Chain {
        economy: Option<Uuid>,
        account: Option<Uuid>,
    },
}

impl ScopeFilter {
    /// Exact filter for an optional query scope; absence means global only.
    #[must_use]
    pub const fn exact(scope: Option<GrantScope>) -> Self {
        match scope {
            None | Some(GrantScope::Global) => Self::Global,
            Some(GrantScope::Economy(id)) => Self::Economy(id),
            Some(GrantScope::Account(id)) => Self::Account(id),
        }
    }

    /// Whether a grant at `scope` passes this filter.
    #[must_use]
    pub fn matches(self, scope: GrantScope) -> bool {
        match self {
            Self::Any => true,
            Self::Global => scope == GrantScope::Global,
            Self::Economy(id) => scope == GrantScope::Economy(id),
            Self::Account(id) => scope == GrantScope::Account(id),
            Self::Chain { economy, account } => match scope {
                GrantScope::Global => true,
                GrantScope::Economy(id) => economy == Some(id),
                GrantScope::Account(id) => account == Some(id),
            },
        }
    }
}

/// Read side of the grant store.
pub trait GrantStore: Send + Sync {
    /// Grants whose grantee is one of `grantee_ids`, whose permission is in
    /// `permissions`, and whose scope passes `filter`.
    ///
    /// Implementations return rows in a stable order (oldest first) so that
    /// resolution over them is deterministic.
    fn find_grants<'a>(
        &'a self,
        grantee_ids: &'a [PlatformId],
        permissions: PermissionSet,
        filter: ScopeFilter,
    ) -> BoxFuture<'a, Result<Vec<Grant>, StoreError>>;
}

/// Hierarchy position of a role within its guild. Higher outranks lower.
pub trait RoleRankLookup: Send + Sync {
    /// `None` when the role (or guild) is unknown.
    fn role_rank(&self, guild_id: &PlatformId, role_id: &PlatformId) -> Option<i64>;
}

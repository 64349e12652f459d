//! Permission resolution logic.
//!
//! Decides whether a principal may perform an action by adjudicating between
//! the grants that apply to it.
//!
//! Policy: the most specific grant wins (account over economy over global).
//! Between grants of equal specificity, a grant attributed to the principal's
//! own user id beats one attributed to any of its roles; between two role
//! grants, the role with the greater hierarchy position wins. If positions are
//! equal or unknown, the grant seen first is kept, so the outcome depends only
//! on the store's (stable) ordering.

use std::cmp::Ordering;

use taubot_common::Principal;
use tracing::debug;
use uuid::Uuid;

use super::catalogue::{Permission, PermissionSet};
use super::models::{Grant, GrantScope};
use super::store::{GrantStore, RoleRankLookup, ScopeFilter, StoreError};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl From<bool> for Decision {
    fn from(value: bool) -> Self {
        if value {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

/// Pick the single grant that decides the request.
///
/// Single pass over `candidates` in order; returns `None` only when there are
/// no candidates.
pub fn select_best_grant<'g>(
    principal: &Principal,
    candidates: &'g [Grant],
    ranks: &dyn RoleRankLookup,
) -> Option<&'g Grant> {
    let (first, rest) = candidates.split_first()?;
    let mut best = first;

    for candidate in rest {
        match candidate
            .scope
            .specificity()
            .cmp(&best.scope.specificity())
        {
            Ordering::Greater => best = candidate,
            Ordering::Less => {}
            Ordering::Equal => {
                if outranks_on_tie(principal, candidate, best, ranks) {
                    best = candidate;
                }
            }
        }
    }

    Some(best)
}

/// Whether `candidate` displaces `best` when both have the same specificity.
fn outranks_on_tie(
    principal: &Principal,
    candidate: &Grant,
    best: &Grant,
    ranks: &dyn RoleRankLookup,
) -> bool {
    if principal.is_self(&best.grantee_id) {
        return false;
    }
    if principal.is_self(&candidate.grantee_id) {
        return true;
    }

    // Both role-attributed: compare hierarchy positions in the invoking guild.
    let Some(guild_id) = principal.guild_id.as_ref() else {
        return false;
    };
    match (
        ranks.role_rank(guild_id, &candidate.grantee_id),
        ranks.role_rank(guild_id, &best.grantee_id),
    ) {
        (Some(candidate_rank), Some(best_rank)) => candidate_rank > best_rank,
        _ => false,
    }
}

/// Permission checks against a grant store.
///
/// Holds no mutable state; cheap to construct per request.
#[derive(Clone, Copy)]
pub struct PermissionResolver<'a> {
    store: &'a dyn GrantStore,
    ranks: &'a dyn RoleRankLookup,
}

impl<'a> PermissionResolver<'a> {
    #[must_use]
    pub fn new(store: &'a dyn GrantStore, ranks: &'a dyn RoleRankLookup) -> Self {
        Self { store, ranks }
    }

    /// Adjudicated check at exactly one scope.
    ///
    /// `scope = None` considers global grants only. An economy or account scope
    /// considers only grants bound to exactly that economy or account.
    #[tracing::instrument(skip(self, principal), fields(user = %principal.user_id))]
    pub async fn resolve(
        &self,
        principal: &Principal,
        permission: Permission,
        scope: Option<GrantScope>,
    ) -> Result<Decision, StoreError> {
        self.decide(principal, permission, ScopeFilter::exact(scope))
            .await
    }

    /// Adjudicated check across the scope chain of an account and/or economy.
    ///
    /// Fetches global grants together with those bound to `economy` and
    /// `account` in one query, then lets the most specific one decide. A global
    /// grant therefore applies inside every economy unless a narrower grant
    /// overrides it.
    #[tracing::instrument(skip(self, principal), fields(user = %principal.user_id))]
    pub async fn resolve_effective(
        &self,
        principal: &Principal,
        permission: Permission,
        economy: Option<Uuid>,
        account: Option<Uuid>,
    ) -> Result<Decision, StoreError> {
        self.decide(principal, permission, ScopeFilter::Chain { economy, account })
            .await
    }

    /// Whether the principal holds at least one of `permissions`.
    ///
    /// Union check without precedence: any grant with a true value counts.
    /// `scope = None` matches grants at every scope. An empty set is never
    /// satisfied.
    pub async fn has_any(
        &self,
        principal: &Principal,
        permissions: PermissionSet,
        scope: Option<GrantScope>,
    ) -> Result<bool, StoreError> {
        let held = self.held(principal, permissions, scope).await?;
        Ok(held.intersects(permissions))
    }

    /// Whether the principal holds every one of `permissions`.
    ///
    /// Same matching rules as [`Self::has_any`]. An empty set is always
    /// satisfied.
    pub async fn has_all(
        &self,
        principal: &Principal,
        permissions: PermissionSet,
        scope: Option<GrantScope>,
    ) -> Result<bool, StoreError> {
        let held = self.held(principal, permissions, scope).await?;
        Ok(held.contains(permissions))
    }

    async fn held(
        &self,
        principal: &Principal,
        permissions: PermissionSet,
        scope: Option<GrantScope>,
    ) -> Result<PermissionSet, StoreError> {
        if permissions.is_empty() {
            return Ok(PermissionSet::empty());
        }

        let filter = scope.map_or(ScopeFilter::Any, |s| ScopeFilter::exact(Some(s)));
        let identities = principal.identities();
        let grants = self
            .store
            .find_grants(&identities, permissions, filter)
            .await?;

        Ok(grants
            .iter()
            .filter(|g| g.value)
            .map(|g| g.permission)
            .collect())
    }

    async fn decide(
        &self,
        principal: &Principal,
        permission: Permission,
        filter: ScopeFilter,
    ) -> Result<Decision, StoreError> {
        let identities = principal.identities();
        let candidates = self
            .store
            .find_grants(&identities, permission.flag(), filter)
            .await?;

        let decision = match select_best_grant(principal, &candidates, self.ranks) {
            Some(grant) => {
                debug!(
                    %permission,
                    grant_id = %grant.id,
                    grantee = %grant.grantee_id,
                    scope = %grant.scope,
                    value = grant.value,
                    candidates = candidates.len(),
                    "Permission resolved"
                );
                Decision::from(grant.value)
            }
            None => {
                debug!(%permission, ?filter, "No applicable grant");
                Decision::Denied
            }
        };

        Ok(decision)
    }
}

/// Permission check errors.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// The resolver denied the permission.
    #[error("Missing permission: {0}")]
    Denied(Permission),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PermissionResolver<'_> {
    /// [`Self::resolve_effective`], turning a denial into an error.
    pub async fn require(
        &self,
        principal: &Principal,
        permission: Permission,
        economy: Option<Uuid>,
        account: Option<Uuid>,
    ) -> Result<(), PermissionError> {
        if self
            .resolve_effective(principal, permission, economy, account)
            .await?
            .is_granted()
        {
            Ok(())
        } else {
            Err(PermissionError::Denied(permission))
        }
    }
}

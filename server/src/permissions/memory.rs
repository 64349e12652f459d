//! In-process grant store.
//!
//! Keeps grants in insertion order behind a mutex. Used by tests and by
//! tooling that needs a resolver without a database.

use std::sync::Mutex;

use futures::future::BoxFuture;
use taubot_common::PlatformId;

use super::catalogue::PermissionSet;
use super::models::Grant;
use super::store::{GrantStore, ScopeFilter, StoreError};

#[derive(Default)]
pub struct MemoryGrantStore {
    grants: Mutex<Vec<Grant>>,
    failure: Mutex<Option<String>>,
}

impl MemoryGrantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a grant.
    pub fn insert(&self, grant: Grant) {
        self.grants
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(grant);
    }

    /// Make every subsequent query fail with [`StoreError::Unavailable`].
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self
            .failure
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(reason.into());
    }
}

impl GrantStore for MemoryGrantStore {
    fn find_grants<'a>(
        &'a self,
        grantee_ids: &'a [PlatformId],
        permissions: PermissionSet,
        filter: ScopeFilter,
    ) -> BoxFuture<'a, Result<Vec<Grant>, StoreError>> {
        Box::pin(async move {
            if let Some(reason) = self
                .failure
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
            {
                return Err(StoreError::Unavailable(reason));
            }

            let grants = self
                .grants
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(grants
                .iter()
                .filter(|g| grantee_ids.contains(&g.grantee_id))
                .filter(|g| permissions.contains(g.permission.flag()))
                .filter(|g| filter.matches(g.scope))
                .cloned()
                .collect())
        })
    }
}

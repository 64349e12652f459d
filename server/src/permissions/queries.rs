//! Database queries for the permission system.
//!
//! Provides:
//! - [`PgGrantStore`], the `PostgreSQL` implementation of [`GrantStore`]
//! - Grant management (set / clear / list), used by the permission commands
//!   and by startup bootstrap

use futures::future::BoxFuture;
use sqlx::PgPool;
use taubot_common::PlatformId;
use uuid::Uuid;

use super::catalogue::{Permission, PermissionSet};
use super::models::{Grant, GrantRow, GrantScope};
use super::store::{GrantStore, ScopeFilter, StoreError};

const GRANT_COLUMNS: &str =
    "id, grantee_id, permission_id, economy_id, account_id, value, created_at";

/// Grant store backed by the `grants` table.
#[derive(Debug, Clone)]
pub struct PgGrantStore {
    pool: PgPool,
}

impl PgGrantStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bind values for the scope clause of [`find_grants`].
fn scope_binds(filter: ScopeFilter) -> (&'static str, Option<Uuid>, Option<Uuid>) {
    match filter {
        ScopeFilter::Any => ("any", None, None),
        ScopeFilter::Global => ("global", None, None),
        ScopeFilter::Economy(id) => ("economy", Some(id), None),
        ScopeFilter::Account(id) => ("account", None, Some(id)),
        ScopeFilter::Chain { economy, account } => ("chain", economy, account),
    }
}

/// Fetch grants for a set of grantees, oldest first.
#[tracing::instrument(skip(pool))]
pub async fn find_grants(
    pool: &PgPool,
    grantee_ids: &[PlatformId],
    permissions: PermissionSet,
    filter: ScopeFilter,
) -> Result<Vec<Grant>, StoreError> {
    let grantees: Vec<&str> = grantee_ids.iter().map(PlatformId::as_str).collect();
    let (mode, economy_id, account_id) = scope_binds(filter);

    let rows = sqlx::query_as::<_, GrantRow>(&format!(
        r"
        SELECT {GRANT_COLUMNS}
        FROM grants
        WHERE grantee_id = ANY($1)
          AND permission_id = ANY($2)
          AND CASE $3
                WHEN 'any' THEN TRUE
                WHEN 'global' THEN economy_id IS NULL AND account_id IS NULL
                WHEN 'economy' THEN economy_id = $4
                WHEN 'account' THEN account_id = $5
                WHEN 'chain' THEN (economy_id IS NULL AND account_id IS NULL)
                               OR economy_id = $4
                               OR account_id = $5
              END
        ORDER BY created_at ASC, id ASC
        "
    ))
    .bind(&grantees)
    .bind(permissions.ids())
    .bind(mode)
    .bind(economy_id)
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Grant::try_from).collect()
}

impl GrantStore for PgGrantStore {
    fn find_grants<'a>(
        &'a self,
        grantee_ids: &'a [PlatformId],
        permissions: PermissionSet,
        filter: ScopeFilter,
    ) -> BoxFuture<'a, Result<Vec<Grant>, StoreError>> {
        Box::pin(find_grants(&self.pool, grantee_ids, permissions, filter))
    }
}

/// Create or overwrite the grant for `(grantee, permission, scope)`.
#[tracing::instrument(skip(pool))]
pub async fn set_grant(
    pool: &PgPool,
    grantee_id: &PlatformId,
    permission: Permission,
    scope: GrantScope,
    value: bool,
) -> Result<Grant, StoreError> {
    let row = sqlx::query_as::<_, GrantRow>(&format!(
        r"
        INSERT INTO grants (grantee_id, permission_id, economy_id, account_id, value)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (grantee_id, permission_id, economy_id, account_id)
        DO UPDATE SET value = EXCLUDED.value
        RETURNING {GRANT_COLUMNS}
        "
    ))
    .bind(grantee_id.as_str())
    .bind(i16::from(permission.id()))
    .bind(scope.economy_id())
    .bind(scope.account_id())
    .bind(value)
    .fetch_one(pool)
    .await?;

    Grant::try_from(row)
}

/// Remove the grant for `(grantee, permission, scope)`.
///
/// Returns `true` if a grant was removed.
#[tracing::instrument(skip(pool))]
pub async fn clear_grant(
    pool: &PgPool,
    grantee_id: &PlatformId,
    permission: Permission,
    scope: GrantScope,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r"
        DELETE FROM grants
        WHERE grantee_id = $1
          AND permission_id = $2
          AND economy_id IS NOT DISTINCT FROM $3
          AND account_id IS NOT DISTINCT FROM $4
        ",
    )
    .bind(grantee_id.as_str())
    .bind(i16::from(permission.id()))
    .bind(scope.economy_id())
    .bind(scope.account_id())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Every grant attributed to `grantee_id`, ordered by permission then age.
#[tracing::instrument(skip(pool))]
pub async fn list_grants(pool: &PgPool, grantee_id: &PlatformId) -> Result<Vec<Grant>, StoreError> {
    let rows = sqlx::query_as::<_, GrantRow>(&format!(
        r"
        SELECT {GRANT_COLUMNS}
        FROM grants
        WHERE grantee_id = $1
        ORDER BY permission_id ASC, created_at ASC
        "
    ))
    .bind(grantee_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Grant::try_from).collect()
}

/// Give each user a global grant of `permissions`. Idempotent.
#[tracing::instrument(skip(pool))]
pub async fn bootstrap_admins(
    pool: &PgPool,
    user_ids: &[PlatformId],
    permissions: PermissionSet,
) -> Result<(), StoreError> {
    for user_id in user_ids {
        for permission in permissions.permissions() {
            set_grant(pool, user_id, permission, GrantScope::Global, true).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PlatformId {
        PlatformId::parse(raw).unwrap()
    }

    #[test]
    fn test_scope_binds() {
        let economy = Uuid::new_v4();
        let account = Uuid::new_v4();

        assert_eq!(scope_binds(ScopeFilter::Any), ("any", None, None));
        assert_eq!(scope_binds(ScopeFilter::Global), ("global", None, None));
        assert_eq!(
            scope_binds(ScopeFilter::Economy(economy)),
            ("economy", Some(economy), None)
        );
        assert_eq!(
            scope_binds(ScopeFilter::Account(account)),
            ("account", None, Some(account))
        );
        assert_eq!(
            scope_binds(ScopeFilter::Chain {
                economy: Some(economy),
                account: None
            }),
            ("chain", Some(economy), None)
        );
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_set_grant_upserts(pool: PgPool) {
        let grantee = id("U1");
        let first = set_grant(&pool, &grantee, Permission::ViewBalance, GrantScope::Global, true)
            .await
            .expect("insert");
        let second = set_grant(&pool, &grantee, Permission::ViewBalance, GrantScope::Global, false)
            .await
            .expect("update");

        assert_eq!(first.id, second.id);
        assert!(!second.value);
        assert_eq!(list_grants(&pool, &grantee).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_find_grants_filters_scope_exactly(pool: PgPool) {
        let economy = Uuid::new_v4();
        let grantee = id("U1");
        let store = PgGrantStore::new(pool.clone());

        set_grant(&pool, &grantee, Permission::OpenAccount, GrantScope::Global, true)
            .await
            .unwrap();

        // Economy rows need a real economy for the foreign key.
        sqlx::query(
            "INSERT INTO economies (id, name, currency_name, currency_unit, parent_guild_id)
             VALUES ($1, 'test', 'credits', 'c', 'G1')",
        )
        .bind(economy)
        .execute(&pool)
        .await
        .unwrap();
        set_grant(&pool, &grantee, Permission::OpenAccount, GrantScope::Economy(economy), false)
            .await
            .unwrap();

        let ids = [grantee.clone()];
        let global = store
            .find_grants(&ids, PermissionSet::OPEN_ACCOUNT, ScopeFilter::Global)
            .await
            .unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].scope, GrantScope::Global);

        let scoped = store
            .find_grants(&ids, PermissionSet::OPEN_ACCOUNT, ScopeFilter::Economy(economy))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert!(!scoped[0].value);

        let chain = store
            .find_grants(
                &ids,
                PermissionSet::OPEN_ACCOUNT,
                ScopeFilter::Chain {
                    economy: Some(economy),
                    account: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(chain.len(), 2);

        assert!(clear_grant(&pool, &grantee, Permission::OpenAccount, GrantScope::Global)
            .await
            .unwrap());
        assert!(!clear_grant(&pool, &grantee, Permission::OpenAccount, GrantScope::Global)
            .await
            .unwrap());
    }
}

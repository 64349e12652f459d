//! Database Integration Tests
//!
//! Run with `cargo test -- --ignored` against a PostgreSQL 15+ `DATABASE_URL`.

#[cfg(test)]
mod postgres_tests {
    use super::super::*;
    use sqlx::PgPool;
    use taubot_common::{AccountType, PlatformId};

    use crate::permissions::{queries as grants, GrantScope, PermissionSet};

    fn id(raw: &str) -> PlatformId {
        PlatformId::parse(raw).unwrap()
    }

    async fn economy(pool: &PgPool, name: &str, guild: &str) -> Economy {
        create_economy(pool, name, &format!("{name} dollars"), "$", &id(guild))
            .await
            .expect("Failed to create economy")
    }

    async fn open(
        pool: &PgPool,
        economy_id: uuid::Uuid,
        name: &str,
        kind: AccountType,
        owner: &str,
    ) -> sqlx::Result<Account> {
        create_account(pool, economy_id, name, kind, &id(owner), PermissionSet::empty()).await
    }

    // ========================================================================
    // Economy / Guild Binding Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_create_economy_binds_parent_guild(pool: PgPool) {
        let created = economy(&pool, "tauland", "G1").await;

        let bound = economy_for_guild(&pool, &id("G1"))
            .await
            .expect("Query failed")
            .expect("Guild not bound");
        assert_eq!(bound.id, created.id);

        let by_name = find_economy_by_name(&pool, "TAULAND").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_currency_name_is_unique(pool: PgPool) {
        create_economy(&pool, "one", "credits", "c", &id("G1")).await.unwrap();
        let err = create_economy(&pool, "two", "credits", "c", &id("G2"))
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(ref e) if e.is_unique_violation()));

        // The failed transaction must not leave G2 bound.
        assert!(find_guild_binding(&pool, &id("G2")).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_rebind_leaves_exactly_one_binding(pool: PgPool) {
        let a = economy(&pool, "alpha", "G1").await;
        let b = economy(&pool, "beta", "G2").await;

        rebind_guild(&pool, &id("G1"), b.id).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM guild_bindings WHERE guild_id = 'G1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        let bound = economy_for_guild(&pool, &id("G1")).await.unwrap().unwrap();
        assert_eq!(bound.id, b.id);
        assert_ne!(bound.id, a.id);
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_delete_economy_unbinds_guilds_and_cascades_accounts(pool: PgPool) {
        let e = economy(&pool, "doomed", "G1").await;
        let account = open(&pool, e.id, "alice", AccountType::User, "U1")
            .await
            .unwrap();

        assert!(delete_economy(&pool, e.id).await.unwrap());

        let binding = find_guild_binding(&pool, &id("G1")).await.unwrap().unwrap();
        assert_eq!(binding.economy_id, None);
        assert!(economy_for_guild(&pool, &id("G1")).await.unwrap().is_none());
        assert!(find_account(&pool, account.id).await.unwrap().is_none());
        assert!(!delete_economy(&pool, e.id).await.unwrap());
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_unbind_guild(pool: PgPool) {
        economy(&pool, "alpha", "G1").await;
        assert!(unbind_guild(&pool, &id("G1")).await.unwrap());
        assert!(!unbind_guild(&pool, &id("G1")).await.unwrap());
    }

    // ========================================================================
    // Account Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_one_live_user_account_per_owner(pool: PgPool) {
        let e = economy(&pool, "alpha", "G1").await;
        let first = open(&pool, e.id, "alice", AccountType::User, "U1")
            .await
            .unwrap();
        assert!(open(&pool, e.id, "alice2", AccountType::User, "U1")
            .await
            .is_err());

        // Special accounts are not limited.
        open(&pool, e.id, "treasury", AccountType::Government, "U1")
            .await
            .unwrap();

        // Closing frees the slot.
        assert!(close_account(&pool, first.id).await.unwrap());
        assert!(!close_account(&pool, first.id).await.unwrap());
        open(&pool, e.id, "alice", AccountType::User, "U1")
            .await
            .unwrap();

        let found = find_user_account(&pool, e.id, &id("U1")).await.unwrap().unwrap();
        assert_ne!(found.id, first.id);
        assert_eq!(
            search_account_names(&pool, e.id, "tre").await.unwrap(),
            vec!["treasury".to_string()]
        );
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_open_account_grants_owner_on_that_account(pool: PgPool) {
        let e = economy(&pool, "alpha", "G1").await;
        let owned = PermissionSet::TRANSFER_FUNDS | PermissionSet::CLOSE_ACCOUNT;
        let account = create_account(&pool, e.id, "alice", AccountType::User, &id("U1"), owned)
            .await
            .unwrap();

        let held = grants::list_grants(&pool, &id("U1")).await.unwrap();
        assert_eq!(held.len(), 2);
        assert!(held
            .iter()
            .all(|g| g.value && g.scope == GrantScope::Account(account.id)));
        let permissions: PermissionSet = held.iter().map(|g| g.permission).collect();
        assert_eq!(permissions, owned);
        assert!(grants::list_grants(&pool, &id("U2")).await.unwrap().is_empty());

        // A failed insert leaves no grants behind.
        assert!(create_account(&pool, e.id, "alice2", AccountType::User, &id("U1"), owned)
            .await
            .is_err());
        assert_eq!(grants::list_grants(&pool, &id("U1")).await.unwrap().len(), 2);
    }

    // ========================================================================
    // Transfer Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_transfer_moves_funds_and_records_row(pool: PgPool) {
        let e = economy(&pool, "alpha", "G1").await;
        let from = open(&pool, e.id, "alice", AccountType::User, "U1")
            .await
            .unwrap();
        let to = open(&pool, e.id, "bob", AccountType::User, "U2")
            .await
            .unwrap();
        sqlx::query("UPDATE accounts SET balance = 150, total_balance = 150 WHERE id = $1")
            .bind(from.id)
            .execute(&pool)
            .await
            .unwrap();

        let outcome = transfer_funds(&pool, from.id, to.id, 100, &id("U1")).await.unwrap();
        let TransferOutcome::Completed(transfer) = outcome else {
            panic!("expected completed transfer, got {outcome:?}");
        };
        assert_eq!(transfer.amount, 100);

        let from = find_account(&pool, from.id).await.unwrap().unwrap();
        let to = find_account(&pool, to.id).await.unwrap().unwrap();
        assert_eq!(from.balance, 50);
        assert_eq!(from.total_balance, 150);
        assert_eq!(to.balance, 100);
        assert_eq!(to.total_balance, 100);

        let outcome = transfer_funds(&pool, from.id, to.id, 100, &id("U1")).await.unwrap();
        assert_eq!(outcome, TransferOutcome::InsufficientFunds { available: 50 });
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_transfer_rejects_closed_and_foreign_accounts(pool: PgPool) {
        let a = economy(&pool, "alpha", "G1").await;
        let b = economy(&pool, "beta", "G2").await;
        let here = open(&pool, a.id, "alice", AccountType::User, "U1")
            .await
            .unwrap();
        let there = open(&pool, b.id, "bob", AccountType::User, "U2")
            .await
            .unwrap();

        let outcome = transfer_funds(&pool, here.id, there.id, 1, &id("U1")).await.unwrap();
        assert_eq!(outcome, TransferOutcome::CrossEconomy);

        close_account(&pool, there.id).await.unwrap();
        let outcome = transfer_funds(&pool, here.id, there.id, 1, &id("U1")).await.unwrap();
        assert_eq!(outcome, TransferOutcome::AccountMissing(there.id));
    }
}

//! Permission system types and utilities.
//!
//! Grants assert a boolean outcome for one permission at one scope (global,
//! economy, or account) and are attributed to a user or a role. The resolver
//! adjudicates between the grants that apply to a principal.

pub mod catalogue;
pub mod memory;
pub mod models;
pub mod queries;
pub mod resolver;
pub mod roles;
pub mod store;

pub use catalogue::{Permission, PermissionSet};
pub use memory::MemoryGrantStore;
pub use models::{Grant, GrantScope};
pub use queries::PgGrantStore;
pub use resolver::{select_best_grant, Decision, PermissionError, PermissionResolver};
pub use roles::RoleRankCache;
pub use store::{GrantStore, RoleRankLookup, ScopeFilter, StoreError};

//! Shared types.

pub mod account;
pub mod identity;

pub use account::AccountType;
pub use identity::{PlatformId, Principal};

//! Economy Module
//!
//! The economy, account and permission-management operations, and the
//! command set that exposes them.

pub mod commands;
pub mod error;
pub mod operations;

pub use commands::build_tree;
pub use error::{EconomyError, EconomyResult};

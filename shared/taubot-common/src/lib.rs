//! Taubot Common Library
//!
//! Identity and value types shared between the economy server and its tooling.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

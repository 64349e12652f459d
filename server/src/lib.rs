//! Taubot Economy Server
//!
//! Chat-platform economy service: economies, accounts and transfers behind a
//! scoped permission resolver, driven by a nested slash-command tree.

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod economy;
pub mod interactions;
pub mod permissions;

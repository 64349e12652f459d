//! Identity Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest identifier the platform hands out, with headroom.
const MAX_PLATFORM_ID_LEN: usize = 64;

/// Opaque identifier issued by the chat platform (user, role, guild or channel).
///
/// Users and roles share one namespace, which is what lets a grant name either
/// as its grantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    /// Parse an identifier, rejecting empty, oversized or whitespace-bearing input.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty()
            || raw.len() > MAX_PLATFORM_ID_LEN
            || raw.chars().any(char::is_whitespace)
        {
            return Err(Error::InvalidPlatformId(raw));
        }
        Ok(Self(raw))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PlatformId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PlatformId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<PlatformId> for String {
    fn from(id: PlatformId) -> Self {
        id.0
    }
}

/// The acting identity for one invocation: a user plus its role memberships.
///
/// Built per invocation from the triggering event and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The invoking user.
    pub user_id: PlatformId,
    /// Roles the user holds in the invoking guild.
    #[serde(default)]
    pub role_ids: Vec<PlatformId>,
    /// Guild the invocation came from, if any. Role ranks are looked up here.
    #[serde(default)]
    pub guild_id: Option<PlatformId>,
}

impl Principal {
    /// Principal with no roles and no guild context.
    #[must_use]
    pub const fn new(user_id: PlatformId) -> Self {
        Self {
            user_id,
            role_ids: Vec::new(),
            guild_id: None,
        }
    }

    /// Attach role memberships.
    #[must_use]
    pub fn with_roles(mut self, role_ids: impl IntoIterator<Item = PlatformId>) -> Self {
        self.role_ids = role_ids.into_iter().collect();
        self
    }

    /// Attach the guild the invocation came from.
    #[must_use]
    pub fn in_guild(mut self, guild_id: PlatformId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// The user id followed by every role id, deduplicated, in that order.
    #[must_use]
    pub fn identities(&self) -> Vec<PlatformId> {
        let mut ids = Vec::with_capacity(self.role_ids.len() + 1);
        ids.push(self.user_id.clone());
        for role in &self.role_ids {
            if !ids.contains(role) {
                ids.push(role.clone());
            }
        }
        ids
    }

    /// Whether `id` is this principal's own user id.
    #[must_use]
    pub fn is_self(&self, id: &PlatformId) -> bool {
        &self.user_id == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PlatformId {
        PlatformId::parse(raw).unwrap()
    }

    #[test]
    fn test_platform_id_rejects_bad_input() {
        assert!(PlatformId::parse("").is_err());
        assert!(PlatformId::parse("12 34").is_err());
        assert!(PlatformId::parse("x".repeat(65)).is_err());
        assert_eq!(id("1042").as_str(), "1042");
    }

    #[test]
    fn test_platform_id_serde_is_a_plain_string() {
        let json = serde_json::to_string(&id("U1")).unwrap();
        assert_eq!(json, "\"U1\"");

        let parsed: PlatformId = serde_json::from_str("\"R7\"").unwrap();
        assert_eq!(parsed, id("R7"));
        assert!(serde_json::from_str::<PlatformId>("\"\"").is_err());
    }

    #[test]
    fn test_identities_lists_user_first_without_duplicates() {
        let principal = Principal::new(id("U1")).with_roles([id("R1"), id("R2"), id("R1")]);
        assert_eq!(principal.identities(), vec![id("U1"), id("R1"), id("R2")]);
        assert!(principal.is_self(&id("U1")));
        assert!(!principal.is_self(&id("R1")));
    }
}

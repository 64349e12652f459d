//! Role hierarchy cache.
//!
//! Role positions come from the chat platform's gateway, which pushes a full
//! snapshot per guild whenever roles change. Lookups are lock-free reads.

use std::collections::HashMap;

use dashmap::DashMap;
use taubot_common::PlatformId;

use super::store::RoleRankLookup;

/// Thread-safe map of guild -> role -> position.
#[derive(Default)]
pub struct RoleRankCache {
    guilds: DashMap<PlatformId, HashMap<PlatformId, i64>>,
}

impl RoleRankCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every known position for `guild_id` with `positions`.
    pub fn replace_guild(
        &self,
        guild_id: PlatformId,
        positions: impl IntoIterator<Item = (PlatformId, i64)>,
    ) {
        let positions: HashMap<_, _> = positions.into_iter().collect();
        tracing::debug!(guild = %guild_id, roles = positions.len(), "Role positions replaced");
        self.guilds.insert(guild_id, positions);
    }

    /// Drop everything known about a guild.
    pub fn forget_guild(&self, guild_id: &PlatformId) {
        self.guilds.remove(guild_id);
    }

    /// Number of guilds with cached positions.
    #[must_use]
    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }
}

impl RoleRankLookup for RoleRankCache {
    fn role_rank(&self, guild_id: &PlatformId, role_id: &PlatformId) -> Option<i64> {
        self.guilds
            .get(guild_id)
            .and_then(|roles| roles.get(role_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PlatformId {
        PlatformId::parse(raw).unwrap()
    }

    #[test]
    fn test_lookup_is_per_guild() {
        let cache = RoleRankCache::new();
        cache.replace_guild(id("G1"), [(id("R1"), 3)]);
        cache.replace_guild(id("G2"), [(id("R1"), 7)]);

        assert_eq!(cache.role_rank(&id("G1"), &id("R1")), Some(3));
        assert_eq!(cache.role_rank(&id("G2"), &id("R1")), Some(7));
        assert_eq!(cache.role_rank(&id("G3"), &id("R1")), None);
        assert_eq!(cache.role_rank(&id("G1"), &id("R2")), None);
    }

    #[test]
    fn test_replace_drops_stale_roles() {
        let cache = RoleRankCache::new();
        cache.replace_guild(id("G1"), [(id("R1"), 3), (id("R2"), 4)]);
        cache.replace_guild(id("G1"), [(id("R2"), 1)]);

        assert_eq!(cache.role_rank(&id("G1"), &id("R1")), None);
        assert_eq!(cache.role_rank(&id("G1"), &id("R2")), Some(1));

        cache.forget_guild(&id("G1"));
        assert_eq!(cache.guild_count(), 0);
    }
}

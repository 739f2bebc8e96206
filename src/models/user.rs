//! Site user model: identity, permission tiers, and derived stat counters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::entry::EntryState;
use crate::store::Record;

/// Totally ordered permission tiers.
///
/// Declaration order is the privilege order, so `PartialOrd`/`Ord` derive the
/// tier comparison directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PermissionLevel {
    None,
    Like,
    Default,
    Elevated,
    Moderator,
    Administrator,
    Owner,
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PermissionLevel::None => "None",
            PermissionLevel::Like => "Like",
            PermissionLevel::Default => "Default",
            PermissionLevel::Elevated => "Elevated",
            PermissionLevel::Moderator => "Moderator",
            PermissionLevel::Administrator => "Administrator",
            PermissionLevel::Owner => "Owner",
        };
        f.write_str(name)
    }
}

/// Snapshot of basic user identity, embedded in records at action time.
///
/// Intentionally not a live reference: embedded snapshots only change via an
/// explicit refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicUserInfo {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub permission_level: PermissionLevel,
}

/// Per-state counters, keyed by entry state.
///
/// Missing keys count as zero, so freshly created users need no explicit
/// zero-filled map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateCounts(BTreeMap<EntryState, i64>);

impl StateCounts {
    pub fn get(&self, state: EntryState) -> i64 {
        self.0.get(&state).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, state: EntryState) {
        *self.0.entry(state).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, state: EntryState) {
        *self.0.entry(state).or_insert(0) -= 1;
    }

    /// Whether every counter is zero (including an empty map).
    pub fn is_zero(&self) -> bool {
        self.0.values().all(|&count| count == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryState, i64)> + '_ {
        self.0.iter().map(|(&state, &count)| (state, count))
    }
}

impl std::fmt::Display for StateCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (state, count) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{state}: {count}")?;
            first = false;
        }
        if first {
            write!(f, "(empty)")?;
        }
        Ok(())
    }
}

/// One registered actor.
///
/// Created on first successful login, identity fields updated on every
/// login/refresh, stat counters updated by every stats-affecting action.
/// Never deleted by normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteUser {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub permission_level: PermissionLevel,
    /// Count of entries created by this user, per entry state.
    #[serde(default)]
    pub my_application_stats: StateCounts,
    /// Count of entries this user personally drove into each non-Pending
    /// state. Automated transitions are never attributed here.
    #[serde(default)]
    pub my_admin_stats: StateCounts,
    /// Entry ids this user has liked.
    #[serde(default)]
    pub likes: BTreeSet<String>,
}

impl SiteUser {
    /// The identity snapshot to embed in records this user acts on.
    pub fn info(&self) -> BasicUserInfo {
        BasicUserInfo {
            id: self.id.clone(),
            username: self.username.clone(),
            discriminator: self.discriminator.clone(),
            avatar: self.avatar.clone(),
            permission_level: self.permission_level,
        }
    }
}

impl Record for SiteUser {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_levels_are_ordered() {
        assert!(PermissionLevel::None < PermissionLevel::Like);
        assert!(PermissionLevel::Like < PermissionLevel::Default);
        assert!(PermissionLevel::Default < PermissionLevel::Elevated);
        assert!(PermissionLevel::Elevated < PermissionLevel::Moderator);
        assert!(PermissionLevel::Moderator < PermissionLevel::Administrator);
        assert!(PermissionLevel::Administrator < PermissionLevel::Owner);
    }

    #[test]
    fn test_state_counts_default_to_zero() {
        let mut counts = StateCounts::default();
        assert_eq!(counts.get(EntryState::Pending), 0);
        assert!(counts.is_zero());

        counts.increment(EntryState::Approved);
        assert_eq!(counts.get(EntryState::Approved), 1);
        assert!(!counts.is_zero());

        counts.decrement(EntryState::Approved);
        assert!(counts.is_zero());
    }

    #[test]
    fn test_state_counts_roundtrip() {
        let mut counts = StateCounts::default();
        counts.increment(EntryState::Pending);
        counts.increment(EntryState::Denied);

        let json = serde_json::to_string(&counts).unwrap();
        let back: StateCounts = serde_json::from_str(&json).unwrap();
        assert_eq!(counts, back);
    }
}

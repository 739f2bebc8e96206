//! Entry model: the lifecycle state machine's record type.
//!
//! An entry is modelled as a tagged union over its lifecycle state with a
//! shared base embedded in every variant, so "Pending iff the state-action
//! fields are absent" holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DirectoryError;
use crate::models::tags::FacultyTag;
use crate::models::user::BasicUserInfo;
use crate::store::Record;

/// Number of member-count samples retained per entry.
pub const MEMBER_COUNT_HISTORY_CAP: usize = 30;

/// Lifecycle states. Pending is the sole initial state; integer wire values
/// are 0 to 4 in declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntryState {
    Pending,
    Approved,
    Featured,
    Denied,
    Withdrawn,
}

impl EntryState {
    /// All states in wire order.
    pub const ALL: [EntryState; 5] = [
        EntryState::Pending,
        EntryState::Approved,
        EntryState::Featured,
        EntryState::Denied,
        EntryState::Withdrawn,
    ];

    /// Convert an integer wire value, failing with `InvalidState` outside the
    /// enumerated range.
    pub fn from_index(value: i64) -> Result<Self, DirectoryError> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(DirectoryError::InvalidState { value })
    }

    /// Whether entering this state requires a justification.
    pub fn requires_reason(self) -> bool {
        matches!(self, EntryState::Denied | EntryState::Withdrawn)
    }

    /// Directory name of the backing collection.
    pub fn collection(self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Approved => "approved",
            EntryState::Featured => "featured",
            EntryState::Denied => "denied",
            EntryState::Withdrawn => "withdrawn",
        }
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntryState::Pending => "Pending",
            EntryState::Approved => "Approved",
            EntryState::Featured => "Featured",
            EntryState::Denied => "Denied",
            EntryState::Withdrawn => "Withdrawn",
        };
        f.write_str(name)
    }
}

/// Discord guild member-verification levels, in increasing strictness.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum VerificationLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Snapshot of the underlying guild, refreshed by the routine pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildData {
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub verification_level: VerificationLevel,
}

/// One `(online, total)` member-count sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCountSample {
    pub online: u32,
    pub total: u32,
}

/// Fields shared by every entry state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryBase {
    /// The underlying guild's snowflake id. Never changes across transitions.
    pub id: String,
    pub invite_code: String,
    pub guild_data: GuildData,
    /// Ordered samples, capped at the most recent
    /// [`MEMBER_COUNT_HISTORY_CAP`].
    #[serde(default)]
    pub member_count_history: Vec<MemberCountSample>,
    pub created_by: BasicUserInfo,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_created_by: Option<BasicUserInfo>,
    /// Must equal the number of users whose like-set contains this entry.
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub faculty_tags: Vec<FacultyTag>,
}

impl EntryBase {
    /// Append a member-count sample, discarding the oldest beyond the cap.
    pub fn push_member_sample(&mut self, sample: MemberCountSample) {
        self.member_count_history.push(sample);
        if self.member_count_history.len() > MEMBER_COUNT_HISTORY_CAP {
            let excess = self.member_count_history.len() - MEMBER_COUNT_HISTORY_CAP;
            self.member_count_history.drain(..excess);
        }
    }
}

/// The action that drove an entry out of Pending (or between non-Pending
/// states).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAction {
    /// Acting staff snapshot; `None` for automated transitions.
    #[serde(rename = "stateActionDoneBy")]
    pub done_by: Option<BasicUserInfo>,
    #[serde(rename = "stateActionDoneAt")]
    pub done_at: DateTime<Utc>,
    /// Required for Denied/Withdrawn, absent otherwise.
    #[serde(rename = "stateActionReason", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One directory listing, tagged by lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum Entry {
    Pending {
        #[serde(flatten)]
        base: EntryBase,
    },
    Approved {
        #[serde(flatten)]
        base: EntryBase,
        #[serde(flatten)]
        action: StateAction,
    },
    Featured {
        #[serde(flatten)]
        base: EntryBase,
        #[serde(flatten)]
        action: StateAction,
    },
    Denied {
        #[serde(flatten)]
        base: EntryBase,
        #[serde(flatten)]
        action: StateAction,
    },
    Withdrawn {
        #[serde(flatten)]
        base: EntryBase,
        #[serde(flatten)]
        action: StateAction,
    },
}

impl Entry {
    /// Create a fresh Pending entry. The sole way to enter the lifecycle.
    pub fn new_pending(base: EntryBase) -> Self {
        Entry::Pending { base }
    }

    pub fn state(&self) -> EntryState {
        match self {
            Entry::Pending { .. } => EntryState::Pending,
            Entry::Approved { .. } => EntryState::Approved,
            Entry::Featured { .. } => EntryState::Featured,
            Entry::Denied { .. } => EntryState::Denied,
            Entry::Withdrawn { .. } => EntryState::Withdrawn,
        }
    }

    pub fn base(&self) -> &EntryBase {
        match self {
            Entry::Pending { base }
            | Entry::Approved { base, .. }
            | Entry::Featured { base, .. }
            | Entry::Denied { base, .. }
            | Entry::Withdrawn { base, .. } => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EntryBase {
        match self {
            Entry::Pending { base }
            | Entry::Approved { base, .. }
            | Entry::Featured { base, .. }
            | Entry::Denied { base, .. }
            | Entry::Withdrawn { base, .. } => base,
        }
    }

    /// The state action, absent exactly when the entry is Pending.
    pub fn action(&self) -> Option<&StateAction> {
        match self {
            Entry::Pending { .. } => None,
            Entry::Approved { action, .. }
            | Entry::Featured { action, .. }
            | Entry::Denied { action, .. }
            | Entry::Withdrawn { action, .. } => Some(action),
        }
    }

    /// Pure transition: consume this entry and build the record for the
    /// target state, carrying over all base fields.
    ///
    /// Fails with `IllegalTarget` when `to` is Pending and with
    /// `MissingReason` when `to` requires a justification and none (or an
    /// empty string) was supplied. Does not check `to != from`; idempotent
    /// same-state calls are the caller's concern.
    pub fn transition(
        self,
        to: EntryState,
        done_by: Option<BasicUserInfo>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Entry, DirectoryError> {
        let reason = reason.filter(|r| !r.is_empty());
        if to.requires_reason() && reason.is_none() {
            return Err(DirectoryError::MissingReason);
        }

        let base = match self {
            Entry::Pending { base }
            | Entry::Approved { base, .. }
            | Entry::Featured { base, .. }
            | Entry::Denied { base, .. }
            | Entry::Withdrawn { base, .. } => base,
        };
        let action = StateAction {
            done_by,
            done_at: now,
            reason,
        };

        match to {
            EntryState::Pending => Err(DirectoryError::IllegalTarget),
            EntryState::Approved => Ok(Entry::Approved { base, action }),
            EntryState::Featured => Ok(Entry::Featured { base, action }),
            EntryState::Denied => Ok(Entry::Denied { base, action }),
            EntryState::Withdrawn => Ok(Entry::Withdrawn { base, action }),
        }
    }
}

impl Record for Entry {
    fn id(&self) -> &str {
        &self.base().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::PermissionLevel;

    fn sample_base() -> EntryBase {
        EntryBase {
            id: "123456789012345678".to_string(),
            invite_code: "abcDEF".to_string(),
            guild_data: GuildData {
                name: "Test Guild".to_string(),
                icon: None,
                description: Some("A guild".to_string()),
                verification_level: VerificationLevel::Medium,
            },
            member_count_history: Vec::new(),
            created_by: sample_user_info("100"),
            created_at: Utc::now(),
            invite_created_by: None,
            likes: 0,
            faculty_tags: vec![FacultyTag::Science],
        }
    }

    fn sample_user_info(id: &str) -> BasicUserInfo {
        BasicUserInfo {
            id: id.to_string(),
            username: "someone".to_string(),
            discriminator: "0001".to_string(),
            avatar: None,
            permission_level: PermissionLevel::Default,
        }
    }

    #[test]
    fn test_state_from_index_range() {
        assert_eq!(EntryState::from_index(0).unwrap(), EntryState::Pending);
        assert_eq!(EntryState::from_index(4).unwrap(), EntryState::Withdrawn);
        assert!(matches!(
            EntryState::from_index(5),
            Err(DirectoryError::InvalidState { value: 5 })
        ));
        assert!(matches!(
            EntryState::from_index(-1),
            Err(DirectoryError::InvalidState { value: -1 })
        ));
    }

    #[test]
    fn test_transition_to_pending_is_illegal() {
        let entry = Entry::new_pending(sample_base());
        let result = entry.transition(
            EntryState::Pending,
            Some(sample_user_info("200")),
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(DirectoryError::IllegalTarget)));
    }

    #[test]
    fn test_transition_requires_reason_for_denied_and_withdrawn() {
        for to in [EntryState::Denied, EntryState::Withdrawn] {
            let entry = Entry::new_pending(sample_base());
            let result = entry.transition(to, Some(sample_user_info("200")), None, Utc::now());
            assert!(matches!(result, Err(DirectoryError::MissingReason)));
        }

        // Empty string is treated as missing.
        let entry = Entry::new_pending(sample_base());
        let result = entry.transition(
            EntryState::Denied,
            Some(sample_user_info("200")),
            Some(String::new()),
            Utc::now(),
        );
        assert!(matches!(result, Err(DirectoryError::MissingReason)));
    }

    #[test]
    fn test_transition_carries_base_and_stamps_action() {
        let entry = Entry::new_pending(sample_base());
        let actor = sample_user_info("200");
        let approved = entry
            .transition(EntryState::Approved, Some(actor.clone()), None, Utc::now())
            .unwrap();

        assert_eq!(approved.state(), EntryState::Approved);
        assert_eq!(approved.base().id, "123456789012345678");
        let action = approved.action().unwrap();
        assert_eq!(action.done_by.as_ref(), Some(&actor));
        assert!(action.reason.is_none());
    }

    #[test]
    fn test_pending_has_no_action_fields() {
        let entry = Entry::new_pending(sample_base());
        assert!(entry.action().is_none());

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("stateActionDoneBy").is_none());
        assert_eq!(json["state"], "Pending");
    }

    #[test]
    fn test_entry_serde_roundtrip() {
        let entry = Entry::new_pending(sample_base())
            .transition(
                EntryState::Denied,
                None,
                Some("invite expired".to_string()),
                Utc::now(),
            )
            .unwrap();

        let json = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
        assert_eq!(back.action().unwrap().reason.as_deref(), Some("invite expired"));
        assert!(back.action().unwrap().done_by.is_none());
    }

    #[test]
    fn test_member_history_is_capped() {
        let mut base = sample_base();
        for i in 0..40 {
            base.push_member_sample(MemberCountSample {
                online: i,
                total: i * 2,
            });
        }
        assert_eq!(base.member_count_history.len(), MEMBER_COUNT_HISTORY_CAP);
        // Oldest samples are dropped first.
        assert_eq!(base.member_count_history[0].online, 10);
        assert_eq!(base.member_count_history.last().unwrap().online, 39);
    }
}

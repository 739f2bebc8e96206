//! Entry lifecycle operations: state transitions, tag changes, featuring.

use chrono::Utc;

use crate::errors::DirectoryError;
use crate::models::{validate_tags, Entry, EntryState, PermissionLevel};

use super::{Actor, Directory};

impl Directory {
    /// Move an entry from one lifecycle state to another.
    ///
    /// Failure ladder, in order: `NotFound` (no entry with this id in the
    /// `from` collection), idempotent success when `to == from`,
    /// `IllegalTarget` (to = Pending), `MissingReason` (Denied/Withdrawn
    /// without a reason), `InsufficientPermission` (Moderator floor, Owner
    /// when either side is Featured), `OrphanedCreator` (the recorded creator
    /// is gone from the user store; automated transitions log a warning and
    /// proceed instead).
    ///
    /// On success the new record is written to the destination collection
    /// before the source document is deleted, so a crash mid-transition
    /// leaves the entry present in both collections (reconciled offline) and
    /// never in neither. The creator's application stats move from `from` to
    /// `to`; a human actor's admin stats gain one count for `to`.
    pub fn transition(
        &self,
        entry_id: &str,
        from: EntryState,
        to: EntryState,
        actor: Actor<'_>,
        reason: Option<&str>,
    ) -> Result<Entry, DirectoryError> {
        // The full key set includes the creator's id, which is only known
        // from the record itself. Peek to learn it, lock, re-read, and if the
        // record read under the locks names a creator the held shards don't
        // cover (the entry arrived or was replaced between peek and lock),
        // drop everything and re-acquire with the corrected key set.
        let mut creator_hint = self
            .entries(from)
            .get(entry_id)?
            .map(|entry| entry.base().created_by.id.clone());
        let (entry, _guards) = loop {
            let mut keys = vec![entry_id];
            if let Some(creator) = &creator_hint {
                keys.push(creator.as_str());
            }
            if let Actor::User(id) = actor {
                keys.push(id);
            }
            let guards = self.lock_table().lock(&keys);

            let entry =
                self.entries(from)
                    .get(entry_id)?
                    .ok_or_else(|| DirectoryError::NotFound {
                        id: entry_id.to_string(),
                    })?;
            if creator_hint.as_deref() == Some(entry.base().created_by.id.as_str()) {
                break (entry, guards);
            }
            creator_hint = Some(entry.base().created_by.id.clone());
            drop(guards);
        };

        if to == from {
            return Ok(entry);
        }
        if to == EntryState::Pending {
            return Err(DirectoryError::IllegalTarget);
        }
        let reason = reason.filter(|r| !r.is_empty());
        if to.requires_reason() && reason.is_none() {
            return Err(DirectoryError::MissingReason);
        }

        // Featured is privilege-gated separately from the rest of the
        // lattice.
        let required = if from == EntryState::Featured || to == EntryState::Featured {
            PermissionLevel::Owner
        } else {
            PermissionLevel::Moderator
        };
        let acting_user = self.require_permission(actor, required)?;

        let creator_id = entry.base().created_by.id.clone();
        let creator = self.users().get(&creator_id)?;
        if creator.is_none() {
            if acting_user.is_some() {
                return Err(DirectoryError::OrphanedCreator {
                    entry_id: entry_id.to_string(),
                    user_id: creator_id,
                });
            }
            tracing::warn!(
                entry_id,
                creator_id,
                "Automated transition for an entry whose creator no longer exists; \
                 application stats not updated"
            );
        }

        let done_by = acting_user.as_ref().map(|user| user.info());
        let new_entry = entry.transition(to, done_by, reason.map(str::to_string), Utc::now())?;

        // Destination first, then source: a crash here is detectable drift,
        // not a lost entry.
        self.entries(to).set(&new_entry)?;
        self.entries(from).remove(entry_id)?;

        match (creator, acting_user) {
            (Some(mut creator), Some(mut actor_user)) => {
                creator.my_application_stats.decrement(from);
                creator.my_application_stats.increment(to);
                if creator.id == actor_user.id {
                    creator.my_admin_stats.increment(to);
                    self.users().set(&creator)?;
                } else {
                    actor_user.my_admin_stats.increment(to);
                    self.users().set_many([&creator, &actor_user])?;
                }
            }
            (Some(mut creator), None) => {
                creator.my_application_stats.decrement(from);
                creator.my_application_stats.increment(to);
                self.users().set(&creator)?;
            }
            (None, _) => {}
        }

        let base = new_entry.base();
        tracing::info!(
            transition = %format!("{from} -> {to}"),
            actor = %describe_actor(&new_entry),
            guild = %base.guild_data.name,
            code = %base.invite_code,
            id = %base.id,
            "Entry state changed"
        );

        Ok(new_entry)
    }

    /// Replace an entry's faculty tags. Moderator and above; no collection
    /// move, no stat changes. Unchanged tag sets write nothing.
    pub fn set_tags(
        &self,
        entry_id: &str,
        state: EntryState,
        actor: Actor<'_>,
        tags: &[i64],
    ) -> Result<Entry, DirectoryError> {
        let acting_user = self.require_permission(actor, PermissionLevel::Moderator)?;
        let tags = validate_tags(tags).map_err(DirectoryError::InvalidTags)?;

        let _guards = self.lock_table().lock(&[entry_id]);

        let mut entry =
            self.entries(state)
                .get(entry_id)?
                .ok_or_else(|| DirectoryError::NotFound {
                    id: entry_id.to_string(),
                })?;

        if entry.base().faculty_tags == tags {
            return Ok(entry);
        }

        let previous = std::mem::replace(&mut entry.base_mut().faculty_tags, tags);
        self.entries(state).set(&entry)?;

        let base = entry.base();
        let added: Vec<_> = base
            .faculty_tags
            .iter()
            .filter(|t| !previous.contains(t))
            .collect();
        let removed: Vec<_> = previous
            .iter()
            .filter(|t| !base.faculty_tags.contains(t))
            .collect();
        tracing::info!(
            actor = %acting_user
                .map(|u| format!("{}#{}", u.username, u.discriminator))
                .unwrap_or_else(|| "automated".to_string()),
            guild = %base.guild_data.name,
            id = %base.id,
            ?added,
            ?removed,
            "Entry tags changed"
        );

        Ok(entry)
    }

    /// Toggle an entry between Approved and Featured. Owner only.
    ///
    /// Idempotent: requesting the side the entry is already on returns it
    /// unchanged.
    pub fn set_featured(
        &self,
        entry_id: &str,
        actor: Actor<'_>,
        featured: bool,
    ) -> Result<Entry, DirectoryError> {
        self.require_permission(actor, PermissionLevel::Owner)?;

        let (target, source) = if featured {
            (EntryState::Featured, EntryState::Approved)
        } else {
            (EntryState::Approved, EntryState::Featured)
        };

        if let Some(entry) = self.entries(target).get(entry_id)? {
            return Ok(entry);
        }
        self.transition(entry_id, source, target, actor, None)
    }
}

fn describe_actor(entry: &Entry) -> String {
    match entry.action().and_then(|action| action.done_by.as_ref()) {
        Some(info) => format!("{}#{}", info.username, info.discriminator),
        None => "automated".to_string(),
    }
}

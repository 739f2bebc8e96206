//! The directory service: explicit store instances plus the operations that
//! mutate them.
//!
//! A [`Directory`] is constructed once at process start and passed by
//! reference into whatever consumes the core (the HTTP layer, the refresh
//! pass, the integrity tooling). There is no global mutable state.

mod lifecycle;
mod likes;
pub mod locks;

use chrono::Utc;

use crate::config::{ApplyRequirements, Config};
use crate::errors::{DirectoryError, ExistingListing};
use crate::models::{
    validate_tags, Entry, EntryBase, EntryState, OptOutGuild, PermissionLevel, SiteUser,
};
use crate::refresh::InviteResolver;
use crate::store::{RecordStore, StoreError};

use locks::LockTable;

/// Who is performing a mutating operation.
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    /// An authenticated user, by id. Must exist in the user store.
    User(&'a str),
    /// A background process. Exempt from permission checks, from admin-stat
    /// attribution, and from the user-existence requirement.
    Automated,
}

/// Pending-application caps per permission tier.
const DEFAULT_PENDING_LIMIT: i64 = 1;
const ELEVATED_PENDING_LIMIT: i64 = 10;

/// One record store per entry lifecycle state.
pub struct EntryStores {
    pending: RecordStore<Entry>,
    approved: RecordStore<Entry>,
    featured: RecordStore<Entry>,
    denied: RecordStore<Entry>,
    withdrawn: RecordStore<Entry>,
}

impl EntryStores {
    fn open(config: &Config) -> Result<Self, StoreError> {
        let dir = &config.data_dir;
        Ok(Self {
            pending: RecordStore::open(dir, EntryState::Pending.collection())?,
            approved: RecordStore::open(dir, EntryState::Approved.collection())?,
            featured: RecordStore::open(dir, EntryState::Featured.collection())?,
            denied: RecordStore::open(dir, EntryState::Denied.collection())?,
            withdrawn: RecordStore::open(dir, EntryState::Withdrawn.collection())?,
        })
    }

    /// The collection backing one lifecycle state.
    pub fn store(&self, state: EntryState) -> &RecordStore<Entry> {
        match state {
            EntryState::Pending => &self.pending,
            EntryState::Approved => &self.approved,
            EntryState::Featured => &self.featured,
            EntryState::Denied => &self.denied,
            EntryState::Withdrawn => &self.withdrawn,
        }
    }

    /// Which state's collection holds this id, if any.
    pub fn find_state(&self, id: &str) -> Result<Option<EntryState>, StoreError> {
        for state in EntryState::ALL {
            if self.store(state).has(id) {
                return Ok(Some(state));
            }
        }
        Ok(None)
    }
}

/// The moderation/directory backend core.
pub struct Directory {
    entries: EntryStores,
    users: RecordStore<SiteUser>,
    optout: RecordStore<OptOutGuild>,
    locks: LockTable,
    requirements: ApplyRequirements,
}

impl Directory {
    /// Open every collection under the configured data directory.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        Ok(Self {
            entries: EntryStores::open(config)?,
            users: RecordStore::open(&config.data_dir, "users")?,
            optout: RecordStore::open(&config.data_dir, "optout")?,
            locks: LockTable::new(),
            requirements: config.apply_requirements,
        })
    }

    pub fn entries(&self, state: EntryState) -> &RecordStore<Entry> {
        self.entries.store(state)
    }

    pub fn entry_stores(&self) -> &EntryStores {
        &self.entries
    }

    pub fn users(&self) -> &RecordStore<SiteUser> {
        &self.users
    }

    pub fn opt_outs(&self) -> &RecordStore<OptOutGuild> {
        &self.optout
    }

    pub fn requirements(&self) -> &ApplyRequirements {
        &self.requirements
    }

    pub(crate) fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    /// Load a user record and check it against a required tier.
    fn require_user(
        &self,
        user_id: &str,
        required: PermissionLevel,
    ) -> Result<SiteUser, DirectoryError> {
        let user = self
            .users
            .get(user_id)?
            .ok_or_else(|| DirectoryError::NotFound {
                id: user_id.to_string(),
            })?;
        if user.permission_level < required {
            return Err(DirectoryError::InsufficientPermission {
                required,
                current: user.permission_level,
            });
        }
        Ok(user)
    }

    /// Like [`Self::require_user`], but `Automated` actors pass every check
    /// and resolve to `None`.
    fn require_permission(
        &self,
        actor: Actor<'_>,
        required: PermissionLevel,
    ) -> Result<Option<SiteUser>, DirectoryError> {
        match actor {
            Actor::Automated => Ok(None),
            Actor::User(id) => self.require_user(id, required).map(Some),
        }
    }

    /// Submit a new application, creating a Pending entry for the invite's
    /// guild.
    ///
    /// Requires Default or above. Default users may have 1 pending
    /// application, Elevated users 10; Moderator and above are uncapped.
    pub fn apply(
        &self,
        actor_id: &str,
        invite_code: &str,
        tags: &[i64],
        resolver: &dyn InviteResolver,
    ) -> Result<Entry, DirectoryError> {
        self.require_user(actor_id, PermissionLevel::Default)?;
        let faculty_tags = validate_tags(tags).map_err(DirectoryError::InvalidTags)?;

        // Resolve before taking any locks; the collaborator can block on a
        // rate-limit backoff.
        let invite = crate::refresh::resolve_checked(resolver, invite_code, &self.requirements)?;
        let guild_id = invite.guild_id.clone();

        let _guards = self.locks.lock(&[guild_id.as_str(), actor_id]);

        // Everything read below is re-checked under the locks: two racing
        // applications for the same guild must not both pass the conflict
        // checks, and the stat increment must not be lost to a concurrent
        // mutation of the same user record.
        for state in EntryState::ALL {
            if self.entries.store(state).has(&guild_id) {
                return Err(DirectoryError::AlreadyListed {
                    id: guild_id,
                    existing: ExistingListing::Entry(state),
                });
            }
        }
        if self.optout.has(&guild_id) {
            return Err(DirectoryError::AlreadyListed {
                id: guild_id,
                existing: ExistingListing::OptedOut,
            });
        }

        let mut applicant = self
            .users
            .get(actor_id)?
            .ok_or_else(|| DirectoryError::NotFound {
                id: actor_id.to_string(),
            })?;

        let pending = applicant.my_application_stats.get(EntryState::Pending);
        let limit = match applicant.permission_level {
            PermissionLevel::Default => Some(DEFAULT_PENDING_LIMIT),
            PermissionLevel::Elevated => Some(ELEVATED_PENDING_LIMIT),
            _ => None,
        };
        if let Some(limit) = limit {
            if pending >= limit {
                return Err(DirectoryError::ApplicationLimit { limit });
            }
        }

        let entry = Entry::new_pending(EntryBase {
            id: guild_id,
            invite_code: invite_code.to_string(),
            guild_data: invite.guild_data,
            member_count_history: Vec::new(),
            created_by: applicant.info(),
            created_at: Utc::now(),
            invite_created_by: invite.invite_created_by,
            likes: 0,
            faculty_tags,
        });

        applicant
            .my_application_stats
            .increment(EntryState::Pending);
        self.users.set(&applicant)?;
        self.entries.store(EntryState::Pending).set(&entry)?;

        tracing::info!(
            actor = %format!("{}#{}", applicant.username, applicant.discriminator),
            guild = %entry.base().guild_data.name,
            code = invite_code,
            id = %entry.base().id,
            "New application created"
        );

        Ok(entry)
    }

    /// Opt a guild out of ever being listed. Moderator and above; idempotent
    /// when the guild is already opted out.
    pub fn opt_out(
        &self,
        actor_id: &str,
        guild_id: &str,
        on_behalf_of: &str,
    ) -> Result<OptOutGuild, DirectoryError> {
        let staff = self.require_user(actor_id, PermissionLevel::Moderator)?;

        let _guards = self.locks.lock(&[guild_id]);

        if let Some(existing) = self.optout.get(guild_id)? {
            return Ok(existing);
        }

        let record = OptOutGuild {
            id: guild_id.to_string(),
            opted_out_by: on_behalf_of.to_string(),
            done_by: staff.info(),
            done_at: Utc::now(),
        };
        self.optout.set(&record)?;

        tracing::info!(
            actor = %format!("{}#{}", staff.username, staff.discriminator),
            guild_id,
            on_behalf_of,
            "Guild opted out"
        );

        Ok(record)
    }

    /// Remove a guild's opt-out. Administrator and above.
    pub fn remove_opt_out(&self, actor_id: &str, guild_id: &str) -> Result<(), DirectoryError> {
        let staff = self.require_user(actor_id, PermissionLevel::Administrator)?;

        let _guards = self.locks.lock(&[guild_id]);

        let record = self
            .optout
            .get(guild_id)?
            .ok_or_else(|| DirectoryError::NotFound {
                id: guild_id.to_string(),
            })?;
        self.optout.remove(&record.id)?;

        tracing::info!(
            actor = %format!("{}#{}", staff.username, staff.discriminator),
            guild_id,
            originally_done_by = %record.done_by.username,
            "Guild opt-out removed"
        );

        Ok(())
    }
}

//! Routine refresh pass.
//!
//! Revalidates listed entries against the external invite-resolution
//! collaborator: updates guild snapshots and member-count history, and drives
//! entries whose invite no longer resolves out of the listing via automated
//! transitions. Denied and withdrawn entries are never re-resolved (API
//! requests don't grow on trees) but still receive a zero sample.

use std::thread;
use std::time::Duration;

use crate::config::ApplyRequirements;
use crate::directory::{Actor, Directory};
use crate::errors::{DirectoryError, InviteInvalidReason};
use crate::models::{BasicUserInfo, Entry, EntryState, GuildData, MemberCountSample};

/// A successfully resolved invite.
#[derive(Debug, Clone)]
pub struct ResolvedInvite {
    /// Snowflake id of the guild the invite points at.
    pub guild_id: String,
    pub guild_data: GuildData,
    pub online_members: u32,
    pub total_members: u32,
    /// Registered snapshot of the invite's creator, when known.
    pub invite_created_by: Option<BasicUserInfo>,
}

/// Why the collaborator could not produce a [`ResolvedInvite`].
#[derive(Debug)]
pub enum ResolveError {
    /// The invite is definitively gone or bad.
    Invalid(InviteInvalidReason),
    /// Rate limited; retry after the provider-specified backoff.
    RateLimited { retry_after: Duration },
    /// Transient upstream failure.
    Unavailable(String),
}

/// Seam for the external Discord invite collaborator.
pub trait InviteResolver {
    fn resolve(&self, invite_code: &str) -> Result<ResolvedInvite, ResolveError>;
}

/// Outcome of refreshing one entry.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Entry data refreshed (or zero-sampled) in place.
    Updated(Entry),
    /// The invite no longer qualifies; the entry was moved by an automated
    /// transition.
    Invalidated(Entry),
    /// The entry left the collection it was expected in before its locked
    /// re-read, so this pass left it alone.
    Skipped,
}

/// Totals for a full refresh pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: usize,
    pub invalidated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Resolve an invite, retrying exactly once after a rate-limit response.
///
/// A second rate limit, or any transient failure, surfaces as
/// `UpstreamUnavailable`.
fn resolve_with_retry(
    resolver: &dyn InviteResolver,
    invite_code: &str,
) -> Result<Result<ResolvedInvite, InviteInvalidReason>, DirectoryError> {
    let mut attempts = 0;
    loop {
        match resolver.resolve(invite_code) {
            Ok(invite) => return Ok(Ok(invite)),
            Err(ResolveError::Invalid(reason)) => return Ok(Err(reason)),
            Err(ResolveError::RateLimited { retry_after }) if attempts == 0 => {
                attempts += 1;
                tracing::warn!(
                    invite_code,
                    retry_after_secs = retry_after.as_secs_f64(),
                    "Rate limited while resolving invite, retrying once"
                );
                thread::sleep(retry_after);
            }
            Err(ResolveError::RateLimited { .. }) => {
                return Err(DirectoryError::UpstreamUnavailable {
                    reason: "rate limited twice while resolving invite".to_string(),
                });
            }
            Err(ResolveError::Unavailable(reason)) => {
                return Err(DirectoryError::UpstreamUnavailable { reason });
            }
        }
    }
}

/// Resolve an invite and check it against the listing requirements.
///
/// Used by `Directory::apply`; refresh uses the same check so an entry that
/// would no longer be accepted is also no longer kept.
pub(crate) fn resolve_checked(
    resolver: &dyn InviteResolver,
    invite_code: &str,
    requirements: &ApplyRequirements,
) -> Result<ResolvedInvite, DirectoryError> {
    let invite = match resolve_with_retry(resolver, invite_code)? {
        Ok(invite) => invite,
        Err(reason) => return Err(DirectoryError::InvalidInvite { reason }),
    };
    if let Err(reason) = check_requirements(&invite, requirements) {
        return Err(DirectoryError::InvalidInvite { reason });
    }
    Ok(invite)
}

fn check_requirements(
    invite: &ResolvedInvite,
    requirements: &ApplyRequirements,
) -> Result<(), InviteInvalidReason> {
    if invite.total_members < requirements.min_member_count {
        return Err(InviteInvalidReason::BelowMemberCount);
    }
    if invite.guild_data.verification_level < requirements.min_verification_level {
        return Err(InviteInvalidReason::BelowVerificationLevel);
    }
    Ok(())
}

/// Refresh one entry, identified by id and the collection it was last seen
/// in. Every write happens against a record re-read under the entry's lock;
/// an entry that moved collections in the meantime is skipped, never written
/// back to its old home.
///
/// Denied/Withdrawn: push a `(0, 0)` member sample and persist. Otherwise
/// resolve the invite (no locks held across the network call); on success
/// refresh the guild snapshot, invite creator, and member history; on
/// definitive invalidity perform the automated transition (Pending entries
/// are denied, listed ones withdrawn) with the invalidity reason attached.
pub fn refresh_entry(
    directory: &Directory,
    entry_id: &str,
    state: EntryState,
    resolver: &dyn InviteResolver,
) -> Result<RefreshOutcome, DirectoryError> {
    if matches!(state, EntryState::Denied | EntryState::Withdrawn) {
        let _guards = directory.lock_table().lock(&[entry_id]);
        let Some(mut entry) = directory.entries(state).get(entry_id)? else {
            return Ok(RefreshOutcome::Skipped);
        };
        entry
            .base_mut()
            .push_member_sample(MemberCountSample { online: 0, total: 0 });
        directory.entries(state).set(&entry)?;
        return Ok(RefreshOutcome::Updated(entry));
    }

    let invite_code = {
        let _guards = directory.lock_table().lock(&[entry_id]);
        match directory.entries(state).get(entry_id)? {
            Some(entry) => entry.base().invite_code.clone(),
            None => return Ok(RefreshOutcome::Skipped),
        }
    };

    match resolve_with_retry(resolver, &invite_code)? {
        Ok(invite) => {
            if let Err(reason) = check_requirements(&invite, directory.requirements()) {
                return invalidate(directory, entry_id, state, reason);
            }
            let _guards = directory.lock_table().lock(&[entry_id]);
            let Some(mut entry) = directory.entries(state).get(entry_id)? else {
                return Ok(RefreshOutcome::Skipped);
            };
            let base = entry.base_mut();
            base.guild_data = invite.guild_data;
            base.invite_created_by = invite.invite_created_by;
            base.push_member_sample(MemberCountSample {
                online: invite.online_members,
                total: invite.total_members,
            });
            directory.entries(state).set(&entry)?;
            tracing::debug!(id = %entry_id, "Entry refreshed");
            Ok(RefreshOutcome::Updated(entry))
        }
        Err(reason) => invalidate(directory, entry_id, state, reason),
    }
}

/// Automated transition for an entry whose invite no longer qualifies:
/// pending applications are denied, listed entries withdrawn.
///
/// The zero sample is written under the entry's lock; the transition takes
/// its own locks, so none are held across it. An entry that moved before
/// either step is skipped.
fn invalidate(
    directory: &Directory,
    entry_id: &str,
    state: EntryState,
    reason: InviteInvalidReason,
) -> Result<RefreshOutcome, DirectoryError> {
    {
        let _guards = directory.lock_table().lock(&[entry_id]);
        let Some(mut entry) = directory.entries(state).get(entry_id)? else {
            return Ok(RefreshOutcome::Skipped);
        };
        entry
            .base_mut()
            .push_member_sample(MemberCountSample { online: 0, total: 0 });
        directory.entries(state).set(&entry)?;
    }

    let target = if state == EntryState::Pending {
        EntryState::Denied
    } else {
        EntryState::Withdrawn
    };
    let moved = match directory.transition(
        entry_id,
        state,
        target,
        Actor::Automated,
        Some(&reason.to_string()),
    ) {
        Ok(moved) => moved,
        Err(DirectoryError::NotFound { .. }) => return Ok(RefreshOutcome::Skipped),
        Err(error) => return Err(error),
    };

    tracing::info!(
        id = %entry_id,
        from = %state,
        to = %target,
        %reason,
        "Entry invalidated by refresh"
    );

    Ok(RefreshOutcome::Invalidated(moved))
}

/// Refresh every entry in every collection.
///
/// Per-entry failures are logged and counted, never fatal for the batch.
pub fn refresh_all(
    directory: &Directory,
    resolver: &dyn InviteResolver,
) -> Result<RefreshReport, DirectoryError> {
    let mut report = RefreshReport::default();

    for state in EntryState::ALL {
        let ids: Vec<String> = directory
            .entries(state)
            .get_all()?
            .into_iter()
            .map(|entry| entry.base().id.clone())
            .collect();
        for id in ids {
            match refresh_entry(directory, &id, state, resolver) {
                Ok(RefreshOutcome::Updated(_)) => report.updated += 1,
                Ok(RefreshOutcome::Invalidated(_)) => report.invalidated += 1,
                Ok(RefreshOutcome::Skipped) => report.skipped += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::error!(id = %id, %error, "Failed to refresh entry");
                }
            }
        }
    }

    tracing::info!(
        updated = report.updated,
        invalidated = report.invalidated,
        skipped = report.skipped,
        failed = report.failed,
        "Refresh pass complete"
    );

    Ok(report)
}

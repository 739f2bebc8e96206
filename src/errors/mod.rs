//! Error handling module for the directory core.
//!
//! Every variant is an expected, local, recoverable condition returned to the
//! caller as a structured result; none should crash the process. Store
//! failures surface fatal-for-this-request with no retry or compensation.

use thiserror::Error;

use crate::models::{EntryState, PermissionLevel, TagError};
use crate::store::StoreError;

/// Where a guild already lives when an application for it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingListing {
    Entry(EntryState),
    OptedOut,
}

impl std::fmt::Display for ExistingListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExistingListing::Entry(state) => write!(f, "already listed as {state}"),
            ExistingListing::OptedOut => write!(f, "opted out of the registry"),
        }
    }
}

/// Why an invite code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteInvalidReason {
    /// The invite does not resolve to a guild.
    NotFound,
    /// The invite has expired.
    Expired,
    /// The guild is below the minimum member count.
    BelowMemberCount,
    /// The guild is below the minimum verification level.
    BelowVerificationLevel,
}

impl std::fmt::Display for InviteInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            InviteInvalidReason::NotFound => "invite not found",
            InviteInvalidReason::Expired => "invite expired",
            InviteInvalidReason::BelowMemberCount => "below minimum member count",
            InviteInvalidReason::BelowVerificationLevel => "below minimum verification level",
        };
        f.write_str(reason)
    }
}

/// Domain error type for every core operation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No record with this id in the collection(s) the operation searched.
    #[error("no record with id \"{id}\"")]
    NotFound { id: String },

    /// A state integer outside the enumerated range.
    #[error("state {value} is not in the valid range (0 to 4 inclusive)")]
    InvalidState { value: i64 },

    /// No transition may re-enter Pending.
    #[error("cannot set the state of an entry back to pending")]
    IllegalTarget,

    /// Denied/Withdrawn transitions need a justification.
    #[error("a reason must be supplied to deny or withdraw an entry")]
    MissingReason,

    /// Actor below the required tier. Both tiers are reported so the caller
    /// can surface "required vs. current".
    #[error("requires permission level {required}, current level is {current}")]
    InsufficientPermission {
        required: PermissionLevel,
        current: PermissionLevel,
    },

    /// One error per offending index in a submitted tag array.
    #[error("invalid tags: {}", format_tag_errors(.0))]
    InvalidTags(Vec<TagError>),

    /// Referential-integrity failure: the entry's recorded creator no longer
    /// exists in the user store.
    #[error("the creator of entry \"{entry_id}\" no longer exists (user id {user_id})")]
    OrphanedCreator { entry_id: String, user_id: String },

    /// The invite-resolution collaborator failed, possibly after one retry.
    #[error("invite resolution unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// The submitted invite code was rejected.
    #[error("invalid invite code: {reason}")]
    InvalidInvite { reason: InviteInvalidReason },

    /// An application for this guild conflicts with an existing listing.
    #[error("guild \"{id}\" is {existing}")]
    AlreadyListed {
        id: String,
        existing: ExistingListing,
    },

    /// The actor has reached their pending-application cap.
    #[error("pending application limit reached ({limit})")]
    ApplicationLimit { limit: i64 },

    /// Storage-layer failure, surfaced as fatal for this request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_tag_errors(errors: &[TagError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

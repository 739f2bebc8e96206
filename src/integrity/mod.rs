//! Batch integrity verification.
//!
//! The ledgers (user stats, entry like counters) are maintained incrementally
//! and are not transactionally tied to the record mutations that drive them,
//! so drift is possible after a crash. These checks recompute every derived
//! value from full collection scans and diff against stored values; each
//! discrepancy carries enough identifying detail for manual reconciliation.
//!
//! Consumes only `get_all` on each collection.

use std::collections::{BTreeMap, BTreeSet};

use crate::directory::Directory;
use crate::errors::DirectoryError;
use crate::models::{EntryState, FacultyTag, StateCounts};

/// One detected inconsistency between a stored value and its recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// A user's stored application stats do not match the entries they
    /// created.
    ApplicationStats {
        user_id: String,
        username: String,
        expected: StateCounts,
        actual: StateCounts,
    },
    /// A user's stored admin stats do not match the state actions attributed
    /// to them.
    AdminStats {
        user_id: String,
        username: String,
        expected: StateCounts,
        actual: StateCounts,
    },
    /// An entry's like counter does not match the users whose like sets
    /// contain it.
    EntryLikes {
        entry_id: String,
        name: String,
        expected: i64,
        actual: i64,
    },
    /// Users like an entry that exists in no collection.
    DanglingLikes { entry_id: String, liked_by: i64 },
    /// An entry carries the same tag more than once.
    DuplicateTag {
        entry_id: String,
        name: String,
        tag: FacultyTag,
    },
    /// An entry's recorded creator is not in the user store.
    UnknownCreator {
        entry_id: String,
        name: String,
        user_id: String,
    },
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discrepancy::ApplicationStats {
                user_id,
                username,
                expected,
                actual,
            } => write!(
                f,
                "{username} ({user_id}) has application stats [{actual}], expected [{expected}]"
            ),
            Discrepancy::AdminStats {
                user_id,
                username,
                expected,
                actual,
            } => write!(
                f,
                "{username} ({user_id}) has admin stats [{actual}], expected [{expected}]"
            ),
            Discrepancy::EntryLikes {
                entry_id,
                name,
                expected,
                actual,
            } => write!(
                f,
                "{name} ({entry_id}) has {actual} likes, but has been liked by {expected} users"
            ),
            Discrepancy::DanglingLikes { entry_id, liked_by } => write!(
                f,
                "entry {entry_id} is liked by {liked_by} users, but does not exist in any collection"
            ),
            Discrepancy::DuplicateTag {
                entry_id,
                name,
                tag,
            } => write!(f, "{name} ({entry_id}) carries tag {tag} more than once"),
            Discrepancy::UnknownCreator {
                entry_id,
                name,
                user_id,
            } => write!(
                f,
                "{name} ({entry_id}) was created by an unknown user with id {user_id}"
            ),
        }
    }
}

/// Recompute per-creator application stats and diff against every stored
/// user. Users with no entries must have all-zero stats.
pub fn verify_application_stats(
    directory: &Directory,
) -> Result<Vec<Discrepancy>, DirectoryError> {
    let mut expected: BTreeMap<String, StateCounts> = BTreeMap::new();

    for state in EntryState::ALL {
        for entry in directory.entries(state).get_all()? {
            expected
                .entry(entry.base().created_by.id.clone())
                .or_default()
                .increment(state);
        }
    }

    let mut discrepancies = Vec::new();
    for user in directory.users().get_all()? {
        let expected_counts = expected.get(&user.id).cloned().unwrap_or_default();
        if !counts_match(&user.my_application_stats, &expected_counts) {
            discrepancies.push(Discrepancy::ApplicationStats {
                user_id: user.id.clone(),
                username: user.username.clone(),
                expected: expected_counts,
                actual: user.my_application_stats.clone(),
            });
        }
    }
    Ok(discrepancies)
}

/// Recompute per-actor admin stats from `stateActionDoneBy` and diff.
/// Automated actions (no acting user) are attributed to no one.
pub fn verify_admin_stats(directory: &Directory) -> Result<Vec<Discrepancy>, DirectoryError> {
    let mut expected: BTreeMap<String, StateCounts> = BTreeMap::new();

    for state in EntryState::ALL {
        if state == EntryState::Pending {
            continue;
        }
        for entry in directory.entries(state).get_all()? {
            if let Some(done_by) = entry.action().and_then(|a| a.done_by.as_ref()) {
                expected
                    .entry(done_by.id.clone())
                    .or_default()
                    .increment(state);
            }
        }
    }

    let mut discrepancies = Vec::new();
    for user in directory.users().get_all()? {
        let expected_counts = expected.get(&user.id).cloned().unwrap_or_default();
        if !counts_match(&user.my_admin_stats, &expected_counts) {
            discrepancies.push(Discrepancy::AdminStats {
                user_id: user.id.clone(),
                username: user.username.clone(),
                expected: expected_counts,
                actual: user.my_admin_stats.clone(),
            });
        }
    }
    Ok(discrepancies)
}

/// Recompute per-entry like counts from every user's like set and diff.
/// Likes pointing at entries that exist nowhere are reported separately.
pub fn verify_likes(directory: &Directory) -> Result<Vec<Discrepancy>, DirectoryError> {
    let mut expected: BTreeMap<String, i64> = BTreeMap::new();
    for user in directory.users().get_all()? {
        for entry_id in &user.likes {
            *expected.entry(entry_id.clone()).or_insert(0) += 1;
        }
    }

    let mut discrepancies = Vec::new();
    for state in EntryState::ALL {
        for entry in directory.entries(state).get_all()? {
            let base = entry.base();
            let liked_by = expected.remove(&base.id).unwrap_or(0);
            if liked_by != base.likes {
                discrepancies.push(Discrepancy::EntryLikes {
                    entry_id: base.id.clone(),
                    name: base.guild_data.name.clone(),
                    expected: liked_by,
                    actual: base.likes,
                });
            }
        }
    }

    for (entry_id, liked_by) in expected {
        discrepancies.push(Discrepancy::DanglingLikes { entry_id, liked_by });
    }
    Ok(discrepancies)
}

/// Report entries carrying the same tag more than once.
///
/// Out-of-range tags cannot appear in a parsed record (deserialization
/// rejects unknown tag names; a hand-edited document surfaces as a corrupt
/// store error), so duplication is the only representable tag fault.
pub fn verify_tags(directory: &Directory) -> Result<Vec<Discrepancy>, DirectoryError> {
    let mut discrepancies = Vec::new();
    for state in EntryState::ALL {
        for entry in directory.entries(state).get_all()? {
            let base = entry.base();
            let mut seen = BTreeSet::new();
            for &tag in &base.faculty_tags {
                if !seen.insert(tag) {
                    discrepancies.push(Discrepancy::DuplicateTag {
                        entry_id: base.id.clone(),
                        name: base.guild_data.name.clone(),
                        tag,
                    });
                }
            }
        }
    }
    Ok(discrepancies)
}

/// Report entries whose recorded creator no longer exists in the user store.
pub fn verify_creators_exist(directory: &Directory) -> Result<Vec<Discrepancy>, DirectoryError> {
    let user_ids: BTreeSet<String> = directory
        .users()
        .get_all()?
        .into_iter()
        .map(|user| user.id)
        .collect();

    let mut discrepancies = Vec::new();
    for state in EntryState::ALL {
        for entry in directory.entries(state).get_all()? {
            let base = entry.base();
            if !user_ids.contains(&base.created_by.id) {
                discrepancies.push(Discrepancy::UnknownCreator {
                    entry_id: base.id.clone(),
                    name: base.guild_data.name.clone(),
                    user_id: base.created_by.id.clone(),
                });
            }
        }
    }
    Ok(discrepancies)
}

/// Run every check.
pub fn verify_all(directory: &Directory) -> Result<Vec<Discrepancy>, DirectoryError> {
    let mut discrepancies = verify_application_stats(directory)?;
    discrepancies.extend(verify_admin_stats(directory)?);
    discrepancies.extend(verify_likes(directory)?);
    discrepancies.extend(verify_tags(directory)?);
    discrepancies.extend(verify_creators_exist(directory)?);
    Ok(discrepancies)
}

fn counts_match(actual: &StateCounts, expected: &StateCounts) -> bool {
    EntryState::ALL
        .iter()
        .all(|&state| actual.get(state) == expected.get(state))
}

//! Like ledger: symmetric references between a user's liked set and an
//! entry's like counter.

use crate::errors::DirectoryError;
use crate::models::{EntryState, PermissionLevel};

use super::Directory;

impl Directory {
    /// Set whether a user likes an entry.
    ///
    /// Likes are only valid on publicly listed (Approved or Featured)
    /// entries. Idempotent: when the requested state already matches the
    /// user's like set, nothing is written. Both records are persisted inside
    /// the same locked section, never independently.
    pub fn set_like(
        &self,
        user_id: &str,
        entry_id: &str,
        liked: bool,
    ) -> Result<(), DirectoryError> {
        let _guards = self.lock_table().lock(&[user_id, entry_id]);

        let mut user = self.require_user(user_id, PermissionLevel::Like)?;

        let state = if self.entries(EntryState::Approved).has(entry_id) {
            EntryState::Approved
        } else if self.entries(EntryState::Featured).has(entry_id) {
            EntryState::Featured
        } else {
            return Err(DirectoryError::NotFound {
                id: entry_id.to_string(),
            });
        };
        let mut entry =
            self.entries(state)
                .get(entry_id)?
                .ok_or_else(|| DirectoryError::NotFound {
                    id: entry_id.to_string(),
                })?;

        let currently_liked = user.likes.contains(entry_id);
        if currently_liked == liked {
            return Ok(());
        }

        if liked {
            user.likes.insert(entry_id.to_string());
            entry.base_mut().likes += 1;
        } else {
            user.likes.remove(entry_id);
            entry.base_mut().likes -= 1;
        }

        self.users().set(&user)?;
        self.entries(state).set(&entry)?;

        tracing::debug!(
            user = %format!("{}#{}", user.username, user.discriminator),
            entry = %entry.base().guild_data.name,
            liked,
            total = entry.base().likes,
            "Like updated"
        );

        Ok(())
    }
}

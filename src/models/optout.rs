//! Opt-out records for guilds that never want to be listed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::BasicUserInfo;
use crate::store::Record;

/// A guild that has opted out of ever being listed.
///
/// Keyed by guild id; immutable once created except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptOutGuild {
    /// Discord guild id.
    pub id: String,
    /// User id of the guild owner or admin the request was made on behalf of.
    pub opted_out_by: String,
    /// Staff member who facilitated the request.
    pub done_by: BasicUserInfo,
    pub done_at: DateTime<Utc>,
}

impl Record for OptOutGuild {
    fn id(&self) -> &str {
        &self.id
    }
}

//! Data models for the guild directory core.
//!
//! Records are serialized as plain JSON documents, one per file, with no
//! envelope or versioning metadata.

mod entry;
mod optout;
mod tags;
mod user;

pub use entry::*;
pub use optout::*;
pub use tags::*;
pub use user::*;

//! Guild Directory Backend
//!
//! The moderation and listing core for a Discord server directory: entries
//! move through a lifecycle state machine (pending, approved, featured,
//! denied, withdrawn), each state backed by its own collection of per-record
//! JSON documents, with derived stat and like ledgers and offline integrity
//! verification.

pub mod config;
pub mod directory;
pub mod errors;
pub mod integrity;
pub mod models;
pub mod refresh;
pub mod store;

pub use config::Config;
pub use directory::{Actor, Directory};
pub use errors::DirectoryError;

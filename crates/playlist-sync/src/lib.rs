//! Keeps the installed component files in step with the remote repository.

pub mod digest;
pub mod engine;
pub mod remote;
pub mod report;
pub mod staging;

pub use engine::{Confirm, SyncEngine, SyncLayout, VersionCheck};
pub use report::{FileOutcome, SyncReport};
pub use staging::SyncError;

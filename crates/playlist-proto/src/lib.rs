//! Types and paths shared by the `playlist` launcher and the `playlistupd`
//! updater.

pub mod config;
pub mod logging;
pub mod platform;
pub mod settings;
pub mod version;

//! Launches the tmux playback session and watches the player for track
//! changes.

#[cfg(not(unix))]
compile_error!("playlist-session needs a unix platform (tmux and Unix domain sockets)");

pub mod configure;
pub mod monitor;
pub mod mpv;
pub mod notify;
pub mod session;

use std::path::PathBuf;

/// Environment variable that relocates the install directory (the directory
/// holding `configs/config.json`, `version.json` and the synced components).
pub const INSTALL_DIR_ENV: &str = "PLAYLIST_HOME";

const APP_DIR: &str = "playlistplayer";

pub fn default_socket_path() -> PathBuf {
    temp_dir().join("mpv-socket")
}

/// Parent of the per-run staging directories.
pub fn default_staging_root() -> PathBuf {
    temp_dir()
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Where the player's files live.  `$PLAYLIST_HOME` wins, otherwise
/// `~/.local/share/playlistplayer` (XDG layout on every unix).
pub fn install_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(INSTALL_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    data_dir()
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(temp_dir)
        .join(".local")
        .join("share")
        .join(APP_DIR)
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(APP_DIR)
}

/// Search `PATH` for an executable.  Absolute or relative paths containing a
/// separator are returned as-is when they exist.
pub fn find_binary(name: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(name);
    if candidate.components().count() > 1 {
        return candidate.exists().then_some(candidate);
    }
    find_on_path(&[name])
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for name in names {
            let p = dir.join(name);
            if p.is_file() {
                return Some(p);
            }
        }
    }
    None
}

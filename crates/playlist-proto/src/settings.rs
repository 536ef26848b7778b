use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

/// Runtime settings that are not part of the playback record: where the
/// session lives, how the monitor polls and where updates come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_session_name")]
    pub name: String,
    #[serde(default = "platform::default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_tmux")]
    pub tmux: String,
    /// Player command; extra arguments may follow the program name.
    #[serde(default = "default_player")]
    pub player: String,
    #[serde(default = "default_visualizer")]
    pub visualizer: String,
    /// Height of the player pane, in percent of the window.
    #[serde(default = "default_player_pane_percent")]
    pub player_pane_percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_ipc_timeout_ms")]
    pub ipc_timeout_ms: u64,
    #[serde(default = "default_notify_icon")]
    pub notify_icon: String,
    #[serde(default = "default_notify_title")]
    pub notify_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Each run stages into a fresh private directory created under here.
    #[serde(default = "platform::default_staging_root")]
    pub staging_root: PathBuf,
    #[serde(default = "default_version_file")]
    pub version_file: String,
    #[serde(default = "default_components")]
    pub components: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            socket_path: platform::default_socket_path(),
            tmux: default_tmux(),
            player: default_player(),
            visualizer: default_visualizer(),
            player_pane_percent: default_player_pane_percent(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            ipc_timeout_ms: default_ipc_timeout_ms(),
            notify_icon: default_notify_icon(),
            notify_title: default_notify_title(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            staging_root: platform::default_staging_root(),
            version_file: default_version_file(),
            components: default_components(),
        }
    }
}

impl MonitorSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Never zero: a zero interval would turn the monitor into a busy loop.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms.max(1))
    }
}

impl SyncSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

fn default_session_name() -> String {
    "playlist_session".to_string()
}

fn default_tmux() -> String {
    "tmux".to_string()
}

fn default_player() -> String {
    "mpv".to_string()
}

fn default_visualizer() -> String {
    "cava".to_string()
}

fn default_player_pane_percent() -> u8 {
    35
}

fn default_initial_delay_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_ipc_timeout_ms() -> u64 {
    2000
}

fn default_notify_icon() -> String {
    "audio-speakers".to_string()
}

fn default_notify_title() -> String {
    "Playlist Player".to_string()
}

fn default_base_url() -> String {
    "https://raw.githubusercontent.com/andrew1284prod/playlistplayer/main/".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    7
}

fn default_version_file() -> String {
    "version.json".to_string()
}

fn default_components() -> Vec<String> {
    ["gui_config.py", "run_mpv.py", "playlistupd.py", "version.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let settings_path = Self::settings_path();

        if !settings_path.exists() {
            let settings = Self::default();
            settings.save()?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&settings_path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let settings_path = Self::settings_path();
        if let Some(parent) = settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    pub fn settings_path() -> PathBuf {
        platform::config_dir().join("settings.toml")
    }
}

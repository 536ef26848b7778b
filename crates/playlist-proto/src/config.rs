//! The playback settings record shared with the settings form.
//!
//! The record is a flat JSON object at `<install_dir>/configs/config.json`.
//! Every key is optional; missing keys (or a missing file) fall back to the
//! defaults below, so a fresh install can be launched as soon as a playlist
//! URL has been written.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no playlist URL configured; run `playlist config --url <URL>` first")]
    MissingPlaylistUrl,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot encode config for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_true", rename = "loop")]
    pub loop_playlist: bool,
    #[serde(default)]
    pub prefetch: bool,
    #[serde(default)]
    pub gapless: bool,
    #[serde(default, rename = "loudnorm")]
    pub loudness_normalize: bool,
    #[serde(default = "default_format", rename = "ytdl_format")]
    pub audio_format: String,
    #[serde(default)]
    pub playlist_url: String,
    #[serde(default = "default_true")]
    pub allow_notifications: bool,
    /// UI language of the settings form.  Not interpreted here, only kept
    /// so a save from the CLI does not drop it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// Named presets offered by the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioQuality {
    Best,
    Balanced,
    Potato,
}

impl AudioQuality {
    pub fn selector(self) -> &'static str {
        match self {
            AudioQuality::Best => "bestaudio",
            AudioQuality::Balanced => "bestaudio[abr<=192]",
            AudioQuality::Potato => "worstaudio",
        }
    }
}

fn default_volume() -> u8 {
    70
}

fn default_true() -> bool {
    true
}

fn default_format() -> String {
    AudioQuality::Best.selector().to_string()
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            shuffle: true,
            loop_playlist: true,
            prefetch: false,
            gapless: false,
            loudness_normalize: false,
            audio_format: default_format(),
            playlist_url: String::new(),
            allow_notifications: true,
            lang: None,
        }
    }
}

impl PlaybackConfig {
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&platform::install_dir())
    }

    pub fn config_path_in(install_dir: &Path) -> PathBuf {
        install_dir.join("configs").join("config.json")
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// A missing file yields the defaults.  A present but unreadable or
    /// malformed file is an error: launching with silently reset settings
    /// would be surprising.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        std::fs::write(path, content).map_err(write_err)
    }

    /// The URL to hand to the player, or `MissingPlaylistUrl` when empty.
    pub fn require_playlist_url(&self) -> Result<&str, ConfigError> {
        let url = self.playlist_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingPlaylistUrl);
        }
        Ok(url)
    }

    /// Volume clamped to the 0-100 range the player accepts.
    pub fn effective_volume(&self) -> u8 {
        self.volume.min(100)
    }
}

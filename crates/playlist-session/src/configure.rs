//! Field edits for the playback record, applied by `playlist config`.

use anyhow::Result;
use playlist_proto::config::{AudioQuality, PlaybackConfig};
use regex::Regex;

/// Fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub playlist_url: Option<String>,
    pub volume: Option<u8>,
    pub quality: Option<AudioQuality>,
    pub audio_format: Option<String>,
    pub shuffle: Option<bool>,
    pub loop_playlist: Option<bool>,
    pub prefetch: Option<bool>,
    pub gapless: Option<bool>,
    pub loudness_normalize: Option<bool>,
    pub allow_notifications: Option<bool>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.playlist_url.is_none()
            && self.volume.is_none()
            && self.quality.is_none()
            && self.audio_format.is_none()
            && self.shuffle.is_none()
            && self.loop_playlist.is_none()
            && self.prefetch.is_none()
            && self.gapless.is_none()
            && self.loudness_normalize.is_none()
            && self.allow_notifications.is_none()
    }

    /// A raw `audio_format` wins over a `quality` preset.
    pub fn apply(self, config: &mut PlaybackConfig) -> Result<()> {
        if let Some(url) = self.playlist_url {
            config.playlist_url = normalize_playlist_url(&url)?;
        }
        if let Some(volume) = self.volume {
            config.volume = volume.min(100);
        }
        if let Some(quality) = self.quality {
            config.audio_format = quality.selector().to_string();
        }
        if let Some(format) = self.audio_format {
            config.audio_format = format;
        }
        let toggles = [
            (self.shuffle, &mut config.shuffle),
            (self.loop_playlist, &mut config.loop_playlist),
            (self.prefetch, &mut config.prefetch),
            (self.gapless, &mut config.gapless),
            (self.loudness_normalize, &mut config.loudness_normalize),
            (self.allow_notifications, &mut config.allow_notifications),
        ];
        for (value, field) in toggles {
            if let Some(value) = value {
                *field = value;
            }
        }
        Ok(())
    }
}

/// Links that carry a `list=<id>` parameter (watch pages opened from a
/// playlist, share links) are reduced to the canonical playlist page.
/// Anything else is kept verbatim apart from surrounding whitespace.
pub fn normalize_playlist_url(input: &str) -> Result<String> {
    let input = input.trim();
    let re = Regex::new(r"list=([A-Za-z0-9_-]+)")?;

    if let Some(id) = re.captures(input).and_then(|caps| caps.get(1)) {
        return Ok(format!(
            "https://www.youtube.com/playlist?list={}",
            id.as_str()
        ));
    }
    Ok(input.to_string())
}

//! tmux session with a visualizer pane and a player pane.
//!
//! Layout (pane indices as tmux reports them):
//!
//! ```text
//!   ┌──────────────────────────┐
//!   │ 0  visualizer (cava)     │
//!   ├──────────────────────────┤
//!   │ 1  player (mpv)  ◀ focus │
//!   └──────────────────────────┘
//! ```
//!
//! The player pane keeps focus so keystrokes reach mpv.  Launch is split in
//! two steps: [`SessionPlan::prepare`] validates the config and builds every
//! argument without touching the system, [`SessionPlan::launch`] kills any
//! stale session and attaches to a fresh one.

use playlist_proto::config::{ConfigError, PlaybackConfig};
use playlist_proto::platform;
use playlist_proto::settings::SessionSettings;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const VISUALIZER_PANE: u8 = 0;
pub const PLAYER_PANE: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exited { program: String, status: ExitStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneLayout {
    pub visualizer: u8,
    pub player: u8,
    pub focused: u8,
}

impl Default for PaneLayout {
    fn default() -> Self {
        Self {
            visualizer: VISUALIZER_PANE,
            player: PLAYER_PANE,
            focused: PLAYER_PANE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_name: String,
    pub socket_path: PathBuf,
    pub layout: PaneLayout,
}

/// Player flags in their fixed order.  The playlist URL is not included.
pub fn player_flags(config: &PlaybackConfig, socket_path: &Path) -> Vec<String> {
    let mut flags = vec![
        "--no-video".to_string(),
        format!("--input-ipc-server={}", socket_path.display()),
        format!("--volume={}", config.effective_volume()),
        format!("--ytdl-format={}", config.audio_format),
        "--term-osd-bar=yes".to_string(),
    ];

    let toggles = [
        (config.shuffle, "--shuffle"),
        (config.loop_playlist, "--loop-playlist=inf"),
        (config.prefetch, "--prefetch-playlist=yes"),
        (config.gapless, "--gapless-audio=yes"),
        (config.loudness_normalize, "--af=loudnorm"),
    ];
    flags.extend(
        toggles
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| flag.to_string()),
    );
    flags
}

/// Quote `arg` for `sh -c`.  Plain words are left alone.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-+=:,./@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// `player` is shell text like the visualizer command, so it may carry its
/// own arguments; only the generated arguments are quoted.
pub fn player_command_line(player: &str, args: &[String]) -> String {
    let player = match player.trim() {
        "" => "mpv",
        p => p,
    };
    let mut words = vec![player.to_string()];
    words.extend(args.iter().map(|a| shell_quote(a)));
    words.join(" ")
}

/// A validated, fully built launch.  Creating one has no side effects.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    handle: SessionHandle,
    tmux: String,
    player: String,
    visualizer: String,
    player_pane_percent: u8,
    player_line: String,
}

impl SessionPlan {
    pub fn prepare(
        config: &PlaybackConfig,
        settings: &SessionSettings,
    ) -> Result<Self, LaunchError> {
        let url = config.require_playlist_url()?;

        let mut args = player_flags(config, &settings.socket_path);
        args.push(url.to_string());
        let player_line = player_command_line(&settings.player, &args);

        Ok(Self {
            handle: SessionHandle {
                session_name: settings.name.clone(),
                socket_path: settings.socket_path.clone(),
                layout: PaneLayout::default(),
            },
            tmux: settings.tmux.clone(),
            player: settings.player.clone(),
            visualizer: settings.visualizer.clone(),
            player_pane_percent: settings.player_pane_percent.clamp(1, 99),
            player_line,
        })
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Shell command line run in the player pane.
    pub fn player_line(&self) -> &str {
        &self.player_line
    }

    /// One tmux invocation: create, split, focus the player, attach.
    pub fn tmux_args(&self) -> Vec<String> {
        let name = self.handle.session_name.as_str();
        let percent = self.player_pane_percent.to_string();
        let focused = self.handle.layout.focused.to_string();
        [
            "new-session",
            "-d",
            "-s",
            name,
            self.visualizer.as_str(),
            ";",
            "split-window",
            "-v",
            "-p",
            percent.as_str(),
            self.player_line.as_str(),
            ";",
            "select-pane",
            "-t",
            focused.as_str(),
            ";",
            "attach-session",
            "-t",
            name,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn kill_args(&self) -> Vec<String> {
        vec![
            "kill-session".to_string(),
            "-t".to_string(),
            self.handle.session_name.clone(),
        ]
    }

    /// Replace any session with the same name and attach to the new one.
    /// Resolves when the attached client exits.
    pub async fn launch(self) -> Result<SessionHandle, LaunchError> {
        for program in [&self.player, &self.visualizer] {
            let binary = program.split_whitespace().next().unwrap_or_default();
            if platform::find_binary(binary).is_none() {
                warn!("session: {} not found on PATH, its pane will exit", binary);
            }
        }

        self.kill_stale().await;

        info!(
            "session: starting '{}' (player socket {})",
            self.handle.session_name,
            self.handle.socket_path.display()
        );
        debug!("session: player line: {}", self.player_line);
        let status = Command::new(&self.tmux)
            .args(self.tmux_args())
            .status()
            .await
            .map_err(|source| LaunchError::Spawn {
                program: self.tmux.clone(),
                source,
            })?;
        if !status.success() {
            return Err(LaunchError::Exited {
                program: self.tmux.clone(),
                status,
            });
        }

        info!("session: '{}' detached", self.handle.session_name);
        Ok(self.handle)
    }

    /// Best effort: a missing session (or a missing tmux, reported by the
    /// main invocation) is not an error here.
    async fn kill_stale(&self) {
        let result = Command::new(&self.tmux)
            .args(self.kill_args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                info!("session: killed stale '{}'", self.handle.session_name)
            }
            Ok(_) => debug!("session: no stale '{}'", self.handle.session_name),
            Err(e) => debug!("session: kill-session not run: {}", e),
        }
    }
}

/// Validate, build and run a session in one call.
pub async fn launch(
    config: &PlaybackConfig,
    settings: &SessionSettings,
) -> Result<SessionHandle, LaunchError> {
    SessionPlan::prepare(config, settings)?.launch().await
}

//! Now-playing monitor.
//!
//! Polls the player's control socket for `media-title` and hands each new
//! title to a [`NotifySink`].  Runs beside the blocking tmux attach and shares
//! nothing with it except the socket path.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::mpv::ControlChannel;
use crate::notify::NotifySink;

/// Debounce state: remembers the last announced title.
#[derive(Debug, Default)]
pub struct TitleTracker {
    last_title: String,
}

impl TitleTracker {
    /// Returns the title to announce, if any.  Empty titles and repeats of
    /// the last announced title yield `None`.
    pub fn observe(&mut self, title: &str) -> Option<String> {
        if title.is_empty() || title == self.last_title {
            return None;
        }
        self.last_title = title.to_string();
        Some(self.last_title.clone())
    }

    pub fn last_title(&self) -> &str {
        &self.last_title
    }
}

/// Poll until `cancel` fires.
///
/// Waits `initial_delay` first because the player needs a moment to create
/// its socket.  Cancellation is observed during every sleep.
pub async fn run<S: NotifySink>(
    channel: ControlChannel,
    sink: S,
    poll_interval: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
) {
    info!(
        "monitor: watching {} every {:?}",
        channel.socket_path().display(),
        poll_interval
    );
    if !sleep_unless_cancelled(initial_delay, &cancel).await {
        debug!("monitor: cancelled before first poll");
        return;
    }

    let mut tracker = TitleTracker::default();
    loop {
        poll_once(&channel, &mut tracker, &sink).await;
        if !sleep_unless_cancelled(poll_interval, &cancel).await {
            break;
        }
    }
    info!("monitor: stopped");
}

/// One poll cycle.  Returns the title that was announced, if any.
pub async fn poll_once<S: NotifySink>(
    channel: &ControlChannel,
    tracker: &mut TitleTracker,
    sink: &S,
) -> Option<String> {
    if !channel.is_available() {
        debug!("monitor: socket not present, skipping");
        return None;
    }
    let title = match channel.media_title().await {
        Ok(Some(title)) => title,
        Ok(None) => return None,
        Err(e) => {
            debug!("monitor: poll failed: {}", e);
            return None;
        }
    };
    let announced = tracker.observe(&title)?;
    info!("monitor: now playing '{}'", announced);
    sink.notify(&announced).await;
    Some(announced)
}

/// `false` when cancelled before the sleep finished.
async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

use playlist_proto::settings::MonitorSettings;
use std::future::Future;
use std::process::Stdio;
use tracing::{debug, warn};

/// Where now-playing notifications go.  Implementations must not fail
/// loudly: a lost notification is preferable to a dead monitor.
pub trait NotifySink: Send + Sync {
    fn notify(&self, title: &str) -> impl Future<Output = ()> + Send;
}

/// Desktop notifications through `notify-send`.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: String,
    icon: String,
    summary: String,
}

impl DesktopNotifier {
    pub fn new(icon: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            program: "notify-send".to_string(),
            icon: icon.into(),
            summary: summary.into(),
        }
    }

    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self::new(&settings.notify_icon, &settings.notify_title)
    }

    pub fn args(&self, title: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.icon.clone(),
            self.summary.clone(),
            body(title),
        ]
    }
}

/// Notification body for a track.
pub fn body(title: &str) -> String {
    format!("Playing: {}", title)
}

impl NotifySink for DesktopNotifier {
    async fn notify(&self, title: &str) {
        let result = tokio::process::Command::new(&self.program)
            .args(self.args(title))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => debug!("notify: sent '{}'", title),
            Ok(status) => warn!("notify: {} exited with {}", self.program, status),
            Err(e) => warn!("notify: failed to run {}: {}", self.program, e),
        }
    }
}

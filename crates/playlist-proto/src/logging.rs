use std::path::PathBuf;

/// Install a file-backed `tracing` subscriber and return the log path.
///
/// The terminal belongs to tmux once the session is attached, so nothing is
/// logged to stdout/stderr.  `RUST_LOG` overrides `default_filter`.
pub fn init(file_name: &str, default_filter: &str) -> anyhow::Result<PathBuf> {
    let data_dir = super::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join(file_name);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("{default_filter},hyper_util=warn,reqwest=warn,hyper=warn"));
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    Ok(log_path)
}

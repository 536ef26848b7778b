use anyhow::Context;
use clap::Parser;
use playlist_proto::platform;
use playlist_proto::settings::Settings;
use playlist_sync::remote::HttpSource;
use playlist_sync::{Confirm, SyncEngine, SyncLayout, VersionCheck};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "playlistupd", about = "Check for updates and verify installed files")]
struct Args {
    /// Answer yes to the confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Install directory to sync (defaults to $PLAYLIST_HOME or the data dir).
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Repository base URL, overriding the settings file.
    #[arg(long)]
    base_url: Option<String>,
}

/// Asks on the terminal.  Anything but an explicit yes is a no.
struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&mut self, check: &VersionCheck) -> bool {
        print!("{} (y/n): ", check);
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "д" | "да"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_path = playlist_proto::logging::init("playlistupd.log", "info,playlist_sync=debug")?;
    eprintln!("playlistupd log: {}", log_path.display());

    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("settings unreadable, using defaults: {}", e);
        Settings::default()
    });
    let base_url = args.base_url.unwrap_or(settings.sync.base_url.clone());
    let install_dir = args.install_dir.unwrap_or_else(platform::install_dir);
    info!("syncing {:?} from {}", install_dir, base_url);

    let source = HttpSource::new(
        base_url,
        settings.sync.version_file.clone(),
        settings.sync.fetch_timeout(),
    )
    .context("failed to build HTTP client")?;
    let engine = SyncEngine::new(source, SyncLayout::from_settings(install_dir, &settings.sync));

    println!("[Info] Comparing local version with repository...");
    let report = if args.yes {
        engine
            .sync(&mut |check: &VersionCheck| {
                println!("{} (y/n): y", check);
                true
            })
            .await?
    } else {
        engine.sync(&mut TerminalPrompt).await?
    };

    println!("{}", report);
    if report.outcome == playlist_sync::report::SyncOutcome::Completed && !report.is_fully_synced()
    {
        std::process::exit(2);
    }
    Ok(())
}

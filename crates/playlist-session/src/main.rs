use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use playlist_proto::config::{AudioQuality, PlaybackConfig};
use playlist_proto::settings::Settings;
use playlist_session::configure::ConfigUpdate;
use playlist_session::monitor;
use playlist_session::mpv::ControlChannel;
use playlist_session::notify::DesktopNotifier;
use playlist_session::session::SessionPlan;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "playlist", about = "Play a playlist in a tmux session with a visualizer")]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start (or restart) the playback session. The default.
    Run,
    /// Show or edit the playback settings.
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
struct ConfigArgs {
    /// Playlist link; YouTube links with `list=` are reduced to the playlist page.
    #[arg(long)]
    url: Option<String>,
    /// Volume, 0-100.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,
    #[arg(long, value_enum)]
    quality: Option<Quality>,
    /// Raw format selector passed to the player (overrides --quality).
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    shuffle: Option<bool>,
    #[arg(long = "loop")]
    loop_playlist: Option<bool>,
    #[arg(long)]
    prefetch: Option<bool>,
    #[arg(long)]
    gapless: Option<bool>,
    #[arg(long)]
    loudnorm: Option<bool>,
    #[arg(long)]
    notifications: Option<bool>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Quality {
    Best,
    Balanced,
    Potato,
}

impl From<Quality> for AudioQuality {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Best => AudioQuality::Best,
            Quality::Balanced => AudioQuality::Balanced,
            Quality::Potato => AudioQuality::Potato,
        }
    }
}

impl From<ConfigArgs> for ConfigUpdate {
    fn from(args: ConfigArgs) -> Self {
        Self {
            playlist_url: args.url,
            volume: args.volume,
            quality: args.quality.map(AudioQuality::from),
            audio_format: args.format,
            shuffle: args.shuffle,
            loop_playlist: args.loop_playlist,
            prefetch: args.prefetch,
            gapless: args.gapless,
            loudness_normalize: args.loudnorm,
            allow_notifications: args.notifications,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_path = playlist_proto::logging::init("playlist.log", "info,playlist_session=debug")?;
    eprintln!("playlist log: {}", log_path.display());

    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("settings unreadable, using defaults: {}", e);
        Settings::default()
    });

    match args.command.unwrap_or(Cmd::Run) {
        Cmd::Run => run(settings).await,
        Cmd::Config(config_args) => configure(config_args.into()),
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let config_path = PlaybackConfig::config_path();
    let config = PlaybackConfig::load_from(&config_path)?;
    info!("playback config loaded from {:?}", config_path);

    let plan = SessionPlan::prepare(&config, &settings.session)?;
    println!("[System] Starting session (focus: player controls)...");

    let cancel = CancellationToken::new();
    let monitor_task = if config.allow_notifications {
        let channel = ControlChannel::new(
            plan.handle().socket_path.clone(),
            settings.monitor.ipc_timeout(),
        );
        Some(tokio::spawn(monitor::run(
            channel,
            DesktopNotifier::from_settings(&settings.monitor),
            settings.monitor.poll_interval(),
            settings.monitor.initial_delay(),
            cancel.clone(),
        )))
    } else {
        info!("notifications disabled, monitor not started");
        None
    };

    let result = plan.launch().await;

    cancel.cancel();
    if let Some(task) = monitor_task {
        if let Err(e) = task.await {
            warn!("monitor task ended abnormally: {}", e);
        }
    }

    let handle = result.context("playback session failed")?;
    info!("session '{}' finished", handle.session_name);
    Ok(())
}

fn configure(update: ConfigUpdate) -> anyhow::Result<()> {
    let path = PlaybackConfig::config_path();
    let mut config = PlaybackConfig::load_from(&path)?;

    if !update.is_empty() {
        update.apply(&mut config)?;
        config.save_to(&path)?;
        info!("playback config saved to {:?}", path);
        println!("Saved {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

mod config;
mod render;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    spawn_speaker_poll, Controller, ControllerEvent, HttpTransport, Section, Trigger, View,
};
use shared::domain::{GroupName, MacAddress, PlaybackTarget, TrackId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::load_settings;

#[derive(Parser, Debug)]
#[command(
    name = "multiroom",
    version,
    about = "Control multi-room speakers through the backend REST API"
)]
struct Cli {
    /// Backend API root, e.g. http://localhost:8080/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Settings file; defaults to ./multiroom.toml, then the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Per-request timeout in seconds; 0 disables it.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Speaker MAC address
    #[arg(long, conflicts_with = "group", required_unless_present = "group")]
    speaker: Option<String>,
    /// Group name
    #[arg(long)]
    group: Option<String>,
}

impl TargetArgs {
    fn target(&self) -> Result<PlaybackTarget> {
        match (&self.speaker, &self.group) {
            (Some(mac), None) => Ok(PlaybackTarget::Speaker(MacAddress::new(mac.as_str()))),
            (None, Some(name)) => Ok(PlaybackTarget::Group(GroupName::new(name.as_str()))),
            _ => bail!("pass exactly one of --speaker or --group"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered speakers
    Speakers,
    /// Show one speaker
    Speaker { mac: String },
    /// Rediscover speakers on the network
    Discover,
    /// List speaker groups
    Groups,
    /// Show one group
    Group { name: String },
    CreateGroup {
        name: String,
        /// Member speaker MAC addresses
        #[arg(required = true)]
        speakers: Vec<String>,
    },
    DeleteGroup { name: String },
    /// Re-synchronise playback across a group's members
    SyncGroup { name: String },
    /// List the music library
    Tracks,
    Track { id: i64 },
    Search { query: String },
    /// Rescan the library directory on the backend
    Scan,
    LibraryDir,
    Play {
        #[command(flatten)]
        target: TargetArgs,
        track_id: i64,
    },
    Pause {
        #[command(flatten)]
        target: TargetArgs,
    },
    Resume {
        #[command(flatten)]
        target: TargetArgs,
    },
    Stop { mac: String },
    /// Set volume (0-100)
    Volume {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Seek a speaker to a position in seconds
    Seek { mac: String, seconds: u32 },
    /// Show the playback state of a speaker or group
    State {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Keep the speaker list on screen, refreshing it periodically
    Watch {
        /// Overrides the configured poll interval
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }

    let transport = HttpTransport::new(&settings.api_base_url, settings.request_timeout())
        .with_context(|| format!("cannot use api url '{}'", settings.api_base_url))?;
    let controller = Controller::with_notification_capacity(
        Arc::new(transport),
        settings.notification_capacity,
    );

    let poll_interval = settings.poll_interval();
    let outcome = run(&controller, cli.command, poll_interval).await;
    for notification in controller.drain_notifications().await {
        eprintln!("{}", render::notification(&notification));
    }
    outcome
}

async fn run(
    controller: &Arc<Controller>,
    command: Command,
    poll_interval: Duration,
) -> Result<()> {
    match command {
        Command::Speakers => show_section(controller, Section::Speakers).await?,
        Command::Speaker { mac } => {
            let speaker = controller
                .inspect_speaker(&MacAddress::new(mac.as_str()))
                .await
                .with_context(|| format!("failed to load speaker {mac}"))?;
            println!("{}", render::speaker_detail(&speaker));
        }
        Command::Discover => {
            controller
                .refresh_devices()
                .await
                .context("device discovery failed")?;
            print_section(controller, Section::Speakers).await;
        }
        Command::Groups => show_section(controller, Section::Groups).await?,
        Command::Group { name } => {
            let group = controller
                .inspect_group(&GroupName::new(name.as_str()))
                .await
                .with_context(|| format!("failed to load group {name}"))?;
            println!("{}", render::group_line(&group));
        }
        Command::CreateGroup { name, speakers } => {
            let members = speakers.into_iter().map(MacAddress::new).collect();
            controller
                .create_group(&name, members)
                .await
                .context("failed to create group")?;
            print_section(controller, Section::Groups).await;
        }
        Command::DeleteGroup { name } => {
            controller
                .delete_group(&GroupName::new(name))
                .await
                .context("failed to delete group")?;
            print_section(controller, Section::Groups).await;
        }
        Command::SyncGroup { name } => controller
            .sync_group(&GroupName::new(name))
            .await
            .context("failed to sync group")?,
        Command::Tracks => show_section(controller, Section::Library).await?,
        Command::Track { id } => {
            let track = controller
                .inspect_track(TrackId(id))
                .await
                .with_context(|| format!("failed to load track {id}"))?;
            println!("{}", render::track_line(&track));
        }
        Command::Search { query } => {
            let result = controller.search_tracks(&query).await;
            print_section(controller, Section::Library).await;
            result.context("track search failed")?;
        }
        Command::Scan => {
            let summary = controller
                .scan_library()
                .await
                .context("library scan failed")?;
            info!(%summary, "library scan finished");
        }
        Command::LibraryDir => {
            let directory = controller
                .library_directory()
                .await
                .context("failed to read library directory")?;
            println!("{directory}");
        }
        Command::Play { target, track_id } => controller
            .play(&target.target()?, TrackId(track_id))
            .await
            .context("play failed")?,
        Command::Pause { target } => controller
            .pause(&target.target()?)
            .await
            .context("pause failed")?,
        Command::Resume { target } => controller
            .resume(&target.target()?)
            .await
            .context("resume failed")?,
        Command::Stop { mac } => controller
            .stop(&MacAddress::new(mac))
            .await
            .context("stop failed")?,
        Command::Volume { target, level } => controller
            .set_volume(&target.target()?, level)
            .await
            .context("volume change failed")?,
        Command::Seek { mac, seconds } => controller
            .seek(&MacAddress::new(mac), seconds)
            .await
            .context("seek failed")?,
        Command::State { target } => {
            controller
                .focus(Some(target.target()?))
                .await
                .context("failed to read playback state")?;
            if let Some(focused) = controller.snapshot().await.playback() {
                println!("{}", render::playback(focused));
            }
        }
        Command::Watch { interval_secs } => {
            let interval = interval_secs.map_or(poll_interval, Duration::from_secs);
            watch(controller, interval).await?;
        }
    }
    Ok(())
}

async fn show_section(controller: &Controller, section: Section) -> Result<()> {
    let result = controller
        .refresh_section(section, Trigger::Explicit)
        .await;
    print_section(controller, section).await;
    result.with_context(|| format!("failed to load {}", section.name()))?;
    Ok(())
}

async fn print_section(controller: &Controller, section: Section) {
    println!("{}", render::section(&controller.section_view(section).await));
}

async fn watch(controller: &Arc<Controller>, interval: Duration) -> Result<()> {
    if let Err(err) = controller.switch_view(View::Speakers).await {
        warn!(%err, "initial speaker load failed");
    }
    print_section(controller, Section::Speakers).await;

    let mut events = controller.subscribe_events();
    let poll = spawn_speaker_poll(controller.clone(), interval);
    info!(
        interval_secs = interval.as_secs(),
        "watching speakers, press ctrl-c to stop"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            event = events.recv() => match event {
                Ok(ControllerEvent::RenderSection(section))
                | Ok(ControllerEvent::RenderSectionError { section, .. }) => {
                    println!("--- {} ---", section.name());
                    print_section(controller, section).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "render events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    poll.stop().await;
    Ok(())
}

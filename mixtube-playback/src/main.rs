//! mixtube - plays a playlist through the playback engine
//!
//! Videos are played by simulated players, so the whole sequencing
//! (preloads, transitions, retries on load failure) can be watched from a
//! terminal. Every engine event is printed; the program exits once the
//! engine reports `stopped` or on Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use futures::future::join_all;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixtube_common::config::{load_settings, resolve_config_path, CONFIG_ENV_VAR};
use mixtube_playback::playlist::{Playlist, PlaylistEntry};
use mixtube_playback::{DrmChecker, Engine, PlaybackEvent, SequencerState};

/// Command-line arguments for mixtube
#[derive(Parser, Debug)]
#[command(name = "mixtube")]
#[command(about = "Continuous video playback with crossfaded transitions")]
#[command(version)]
struct Args {
    /// Playlist file (TOML `[[entries]]` tables with `provider` and `id`)
    playlist: PathBuf,

    /// Engine settings file; falls back to $MIXTUBE_CONFIG, then the user
    /// config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the transition duration, in milliseconds
    #[arg(short, long)]
    transition_ms: Option<u64>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Probe every entry for DRM restrictions before playing
    #[arg(long)]
    check_drm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixtube=info,mixtube_playback=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut settings =
        load_settings(config_path.as_deref()).context("Failed to load engine settings")?;
    if let Some(ms) = args.transition_ms {
        settings.transition_duration_ms = ms;
    }

    let playlist = Arc::new(
        Playlist::load(&args.playlist)
            .with_context(|| format!("Failed to load playlist {}", args.playlist.display()))?,
    );
    let Some(first) = playlist.first().cloned() else {
        bail!("Playlist {} has no entries", args.playlist.display());
    };

    if args.check_drm {
        check_drm(&playlist, &settings).await?;
    }

    let (video_producer, next_entry_producer) = playlist.producers();
    let engine = Engine::with_simulated_players(settings, video_producer, next_entry_producer)
        .context("Failed to initialize playback engine")?;
    info!("Playing {} entries", playlist.len());

    let mut events = engine.subscribe();
    engine.play();
    engine.skip(first).context("Failed to start playback")?;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    report(&event, args.json)?;
                    if event.is_transition_to(SequencerState::Stopped) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("Missed {} events", missed),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !stopping => {
                info!("Received Ctrl+C, stopping");
                stopping = true;
                engine.stop().context("Failed to stop playback")?;
            }
        }
    }

    info!("Playback finished");
    Ok(())
}

/// Probe all entries concurrently; the checker bounds the players in use
async fn check_drm(playlist: &Playlist, settings: &mixtube_common::EngineSettings) -> Result<()> {
    let checker = DrmChecker::with_simulated_players(settings);
    let probes = playlist.entries.iter().map(|entry| {
        let checker = &checker;
        async move { (entry, checker.check_drm(&entry.video()).await) }
    });

    for (entry, outcome) in join_all(probes).await {
        match outcome {
            Ok(report) if report.playable => println!("{}: playable", entry),
            Ok(report) => println!(
                "{}: blocked ({})",
                entry,
                report.code.as_deref().unwrap_or("unknown")
            ),
            Err(e) => println!("{}: check failed: {}", entry, e),
        }
    }
    Ok(())
}

fn report(event: &PlaybackEvent<PlaylistEntry>, json: bool) -> Result<()> {
    let now = Utc::now();
    if json {
        let line = serde_json::json!({
            "at": now.to_rfc3339(),
            "event": event,
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let text = match event {
        PlaybackEvent::StateChanged { previous, current } => {
            format!("state {} -> {}", previous, current)
        }
        PlaybackEvent::PlayingChanged { entry } => format!("playing {}", entry),
        PlaybackEvent::ComingNext { current, next } => match next {
            Some(next) => format!("after {} comes {}", current, next),
            None => format!("{} is the last one", current),
        },
        PlaybackEvent::LoadingChanged { entry, loading } => {
            if *loading {
                format!("loading {}", entry)
            } else {
                format!("done loading {}", entry)
            }
        }
        PlaybackEvent::LoadFailed { entry, error } => format!("failed {}: {}", entry, error),
    };
    println!("{} {}", now.format("%H:%M:%S%.3f"), text);
    Ok(())
}

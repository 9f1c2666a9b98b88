use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_vault::{
    codec::Payload,
    config::Config,
    storage::models::{CaptureMode, SortKey, SortOrder, VideoMetadata},
    AppState,
};

#[derive(Parser)]
#[command(name = "video-vault", version, about = "Local binary store for recorded video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a video file
    Import {
        path: PathBuf,
        /// Record id (defaults to the current time in milliseconds)
        #[arg(long)]
        id: Option<u64>,
        /// Title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Duration in seconds (probed with ffprobe when omitted)
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long, default_value = "screen")]
        mode: CaptureMode,
        /// Skip thumbnail generation
        #[arg(long)]
        no_thumbnail: bool,
    },
    /// List stored videos as JSON
    List {
        #[arg(long, default_value = "created")]
        sort: SortKey,
        /// Sort ascending instead of newest/largest first
        #[arg(long)]
        asc: bool,
    },
    /// Show one video, optionally writing its bytes to a file
    Get {
        id: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete one or more videos
    Delete {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Totals over all stored videos
    Stats,
    /// Check that a stored video is still playable
    Probe { id: u64 },
    /// Print a thumbnail data URI for a stored video
    Thumbnail {
        id: u64,
        /// Also store it on the record
        #[arg(long)]
        save: bool,
    },
    /// Delete every stored video
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.storage.data_dir,
        "video-vault starting"
    );

    let mut state = AppState::new(config);
    let result = run(&state, cli.command).await;
    state.store.close();
    result
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Import {
            path,
            id,
            title,
            duration,
            mode,
            no_thumbnail,
        } => {
            let payload = Payload::from_file(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let duration = match duration {
                Some(d) => d,
                None => probe_duration(state, &payload).await,
            };
            let id = id.unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as u64);
            let title = title.unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| format!("Video {id}"))
            });
            let metadata = VideoMetadata::new(id, title, duration, mode);

            let record = if no_thumbnail {
                state.store.save_video(&payload, metadata).await?
            } else {
                state
                    .store
                    .save_video_with_thumbnail(&payload, metadata, &state.thumbnails)
                    .await?
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::List { sort, asc } => {
            let order = if asc {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };
            let videos = state.store.list_videos(sort, order).await?;
            println!("{}", serde_json::to_string_pretty(&videos)?);
        }
        Command::Get { id, out } => {
            let Some(video) = state.store.get_video(id).await? else {
                bail!("No video with id {id}");
            };
            if let Some(out) = out {
                let download = state.handles.scoped(&video.payload);
                let payload = state
                    .handles
                    .resolve(download.reference())
                    .context("Access handle released early")?;
                tokio::fs::write(&out, payload.data())
                    .await
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                info!(id, path = %out.display(), bytes = payload.len(), "Wrote video");
            }
            println!("{}", serde_json::to_string_pretty(&video.record)?);
        }
        Command::Delete { ids } => match ids.as_slice() {
            [id] => state.store.delete_video(*id).await?,
            ids => {
                let removed = state.store.delete_multiple_videos(ids).await?;
                println!("{removed}");
            }
        },
        Command::Stats => {
            let stats = state.store.get_video_metadata().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Probe { id } => {
            let Some(video) = state.store.get_video(id).await? else {
                bail!("No video with id {id}");
            };
            let playable = state.thumbnails.probe_playback(&video.payload).await;
            println!("{}", if playable { "playable" } else { "not available" });
        }
        Command::Thumbnail { id, save: true } => {
            if !state.store.attach_thumbnail(id, &state.thumbnails).await? {
                bail!("Could not attach a thumbnail to video {id}");
            }
            if let Some(video) = state.store.get_video(id).await? {
                println!("{}", video.record.thumbnail.unwrap_or_default());
            }
        }
        Command::Thumbnail { id, save: false } => {
            let Some(video) = state.store.get_video(id).await? else {
                bail!("No video with id {id}");
            };
            let uri = state.thumbnails.generate_thumbnail(&video.payload).await?;
            println!("{uri}");
        }
        Command::Purge { yes } => {
            if !yes {
                bail!("Refusing to purge without --yes");
            }
            let stats = state.store.purge().await?;
            println!("{}", stats.videos);
        }
    }
    Ok(())
}

/// Best-effort duration lookup for imports that did not supply one.
async fn probe_duration(state: &AppState, payload: &Payload) -> f64 {
    match state.thumbnails.probe(payload).await {
        Ok(info) => info.duration_seconds,
        Err(e) => {
            warn!(error = %e, "Could not probe duration, storing 0");
            0.0
        }
    }
}

//! Volcast cluster coordinator.
//!
//! Connects to a set of rendering participants, distributes a synthetic
//! volume across them and composites a camera orbit around it.
//!
//! # Usage
//!
//! ```bash
//! volcast-master -p node1:31050 -p node2:31050 --frames 72 -o orbit_{}.png -c 0,18,36
//! ```
//!
//! # Options
//!
//! - `-p, --participant HOST:PORT`: Participant address (repeatable, order is participant index)
//! - `--size WxH`: Output size (default 640x480)
//! - `--frames N`: Frames in the orbit (default 36)
//! - `--dims XxYxZ`: Volume dimensions in voxels (default 128x128x128)
//! - `--time-steps N`: Time steps to cycle through (default 1)
//! - `--brick-size F`: Brick edge length in object space
//! - `--frame-timeout-ms MS`: Time to wait for participant images (default 10000)
//! - `--policy reuse|skip|abort`: Handling of participants that miss a frame
//! - `--front-to-back`: Composite front to back
//! - `--weights W0,W1,...`: Relative participant workloads
//! - `-o, --output PATTERN`: Write frames to disk, `{}` is the frame number
//! - `-c, --capture FRAMES`: Frames to write, e.g. `0,5-10` (default all)

mod capture;
mod options;

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use volcast_cluster::{ClusterClient, ClusterConfig, VolumePreview};
use volcast_core::{Camera, VolumeDesc};

use crate::options::Options;

fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = Options::parse(std::env::args().skip(1))?;
    run(&options)
}

fn run(options: &Options) -> Result<()> {
    let volume = VolumeDesc::new(options.dims).with_frames(options.time_steps);
    let mut config = ClusterConfig::new(options.participants.clone())
        .with_size(options.width, options.height)
        .with_frame_timeout(options.frame_timeout)
        .with_order(options.order)
        .with_partial_frame_policy(options.policy);
    if let Some(extent) = options.brick_extent() {
        config = config.with_brick_extent(extent);
    }
    if let Some(weights) = options.weights.clone() {
        config = config.with_weights(weights);
    }

    let preview = VolumePreview::distributed(volume.clone());
    let mut client = ClusterClient::connect(config, &preview).context("cluster setup failed")?;
    info!(
        participants = client.participant_count(),
        width = options.width,
        height = options.height,
        "Cluster connected"
    );

    let aspect = options.width as f32 / options.height.max(1) as f32;
    let mut camera = Camera::looking_at(volume.extent().max, volume.position, aspect);
    let radius = volume.size().length() * 1.2;
    let height = volume.size().y * 0.3;

    let start = Instant::now();
    for frame in 0..options.frames {
        let angle = std::f32::consts::TAU * frame as f32 / options.frames.max(1) as f32;
        camera.orbit(volume.position, radius, height, angle);

        if options.time_steps > 1 {
            #[allow(clippy::cast_possible_wrap)]
            client.set_current_frame((frame % u64::from(options.time_steps)) as i32)?;
        }

        let stats = client.render(&camera.view_state())?;
        info!(
            frame,
            composited = stats.composited,
            reused = stats.reused,
            skipped = stats.skipped,
            elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
            "Frame composited"
        );
        if !stats.evicted.is_empty() || !stats.lost.is_empty() {
            warn!(frame, evicted = ?stats.evicted, lost = ?stats.lost, "Participants dropped");
        }

        if options.capture.should_capture(frame) {
            let path = options.capture.output_path(frame);
            client
                .framebuffer()
                .save_png(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Frame saved");
        }

        if client.live_participants().is_empty() {
            warn!(frame, "No participants left");
            break;
        }
    }

    info!(
        frames = client.frame_index(),
        seconds = start.elapsed().as_secs_f64(),
        "Orbit finished"
    );
    client.shutdown()?;
    Ok(())
}

fn print_help() {
    eprintln!("volcast-master - distributed volume rendering coordinator");
    eprintln!();
    eprintln!("Usage: volcast-master -p HOST:PORT [-p HOST:PORT ...] [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --participant HOST:PORT  Participant address (repeatable)");
    eprintln!("  --size WxH                   Output size (default 640x480)");
    eprintln!("  --frames N                   Frames in the orbit (default 36)");
    eprintln!("  --dims XxYxZ                 Volume dimensions (default 128x128x128)");
    eprintln!("  --time-steps N               Time steps to cycle through (default 1)");
    eprintln!("  --brick-size F               Brick edge length in object space");
    eprintln!("  --frame-timeout-ms MS        Wait for participant images (default 10000)");
    eprintln!("  --policy reuse|skip|abort    Handling of participants that miss a frame");
    eprintln!("  --front-to-back              Composite front to back");
    eprintln!("  --weights W0,W1,...          Relative participant workloads");
    eprintln!("  -o, --output PATTERN         Write frames, {{}} is the frame number");
    eprintln!("  -c, --capture FRAMES         Frames to write, e.g. 0,5-10 (default all)");
    eprintln!("  -h, --help                   Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG                     Log filter (default info)");
}

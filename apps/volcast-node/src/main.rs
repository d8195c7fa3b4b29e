//! Volcast rendering participant.
//!
//! Listens for coordinator connections and renders the bricks it is
//! assigned as flat color footprints.
//!
//! # Usage
//!
//! ```bash
//! volcast-node --listen 0.0.0.0:31050 --color 1,0.5,0,0.8
//! ```
//!
//! # Options
//!
//! - `--listen ADDR`: Address to listen on (default 0.0.0.0:31050)
//! - `--color R,G,B,A`: Brick color (default 1,1,1,1)
//! - `--depth`: Attach depth to rendered images
//! - `--sessions N`: Exit after N coordinator sessions (default 0, serve forever)

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec4;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use volcast_participant::{FlatRenderer, ParticipantServer};

const DEFAULT_LISTEN: &str = "0.0.0.0:31050";

#[derive(Debug)]
struct Options {
    listen: String,
    color: Vec4,
    depth: bool,
    sessions: u64,
}

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

    let options = parse_args(std::env::args().skip(1))?;
    let server = ParticipantServer::bind(&options.listen)
        .with_context(|| format!("failed to listen on {}", options.listen))?;
    info!(addr = %server.local_addr()?, "Participant listening");

    let mut renderer = FlatRenderer::new(options.color).with_depth(options.depth);
    let mut served = 0u64;
    while options.sessions == 0 || served < options.sessions {
        match server.serve_one(&mut renderer) {
            Ok(summary) => info!(
                frames = summary.frames_rendered,
                commands = summary.commands,
                clean_exit = summary.clean_exit,
                "Session finished"
            ),
            Err(err) => error!(%err, "Session failed"),
        }
        served += 1;
    }
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut options = Options {
        listen: DEFAULT_LISTEN.to_owned(),
        color: Vec4::ONE,
        depth: false,
        sessions: 0,
    };
    while let Some(arg) = args.next() {
        let mut value = || args.next().ok_or_else(|| anyhow!("{arg} requires a value"));
        match arg.as_str() {
            "--listen" => options.listen = value()?,
            "--color" => options.color = parse_color(&value()?)?,
            "--depth" => options.depth = true,
            "--sessions" => options.sessions = value()?.parse().context("--sessions")?,
            other => bail!("unknown option: {other}"),
        }
    }
    Ok(options)
}

fn parse_color(s: &str) -> Result<Vec4> {
    let parts = s
        .split(',')
        .map(|c| c.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid color {s:?}"))?;
    match parts[..] {
        [r, g, b] => Ok(Vec4::new(r, g, b, 1.0)),
        [r, g, b, a] => Ok(Vec4::new(r, g, b, a)),
        _ => bail!("expected R,G,B[,A], got {s:?}"),
    }
}

fn print_help() {
    eprintln!("volcast-node - distributed volume rendering participant");
    eprintln!();
    eprintln!("Usage: volcast-node [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --listen ADDR     Address to listen on (default {DEFAULT_LISTEN})");
    eprintln!("  --color R,G,B,A   Brick color (default 1,1,1,1)");
    eprintln!("  --depth           Attach depth to rendered images");
    eprintln!("  --sessions N      Exit after N sessions (default 0, serve forever)");
    eprintln!("  -h, --help        Show this help");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        parse_args(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn defaults() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.listen, DEFAULT_LISTEN);
        assert_eq!(options.color, Vec4::ONE);
        assert_eq!(options.sessions, 0);
    }

    #[test]
    fn color_alpha_is_optional() {
        let options = parse(&["--color", "1,0,0", "--depth"]).unwrap();
        assert_eq!(options.color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(options.depth);
        assert!(parse(&["--color", "1,0"]).is_err());
    }
}

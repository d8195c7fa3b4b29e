//! Command line options.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use glam::{UVec3, Vec3};
use volcast_cluster::{CompositeOrder, ParticipantAddress, PartialFramePolicy};

use crate::capture::{parse_frame_indices, CaptureConfig};

#[derive(Debug)]
pub struct Options {
    pub participants: Vec<ParticipantAddress>,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub dims: UVec3,
    pub time_steps: u32,
    pub brick_size: Option<f32>,
    pub frame_timeout: Duration,
    pub policy: PartialFramePolicy,
    pub order: CompositeOrder,
    pub weights: Option<Vec<f32>>,
    pub capture: CaptureConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            width: 640,
            height: 480,
            frames: 36,
            dims: UVec3::splat(128),
            time_steps: 1,
            brick_size: None,
            frame_timeout: Duration::from_secs(10),
            policy: PartialFramePolicy::default(),
            order: CompositeOrder::default(),
            weights: None,
            capture: CaptureConfig::default(),
        }
    }
}

impl Options {
    /// Parse options from an argument list, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut options = Self::default();
        let mut capture_frames = None;
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            let mut value = || args.next().ok_or_else(|| anyhow!("{arg} requires a value"));
            match arg.as_str() {
                "-p" | "--participant" => {
                    options.participants.push(ParticipantAddress::parse(&value()?)?);
                }
                "--size" => {
                    let (w, h) = parse_pair(&value()?, 'x')?;
                    options.width = w;
                    options.height = h;
                }
                "--frames" => options.frames = value()?.parse().context("--frames")?,
                "--dims" => options.dims = parse_dims(&value()?)?,
                "--time-steps" => options.time_steps = value()?.parse().context("--time-steps")?,
                "--brick-size" => {
                    options.brick_size = Some(value()?.parse().context("--brick-size")?);
                }
                "--frame-timeout-ms" => {
                    let ms: u64 = value()?.parse().context("--frame-timeout-ms")?;
                    options.frame_timeout = Duration::from_millis(ms);
                }
                "--policy" => options.policy = parse_policy(&value()?)?,
                "--front-to-back" => options.order = CompositeOrder::FrontToBack,
                "--weights" => {
                    let weights = value()?
                        .split(',')
                        .map(|w| w.trim().parse::<f32>())
                        .collect::<Result<Vec<_>, _>>()
                        .context("--weights")?;
                    options.weights = Some(weights);
                }
                "-o" | "--output" => options.capture.output_pattern = value()?,
                "-c" | "--capture" => capture_frames = Some(value()?),
                other => bail!("unknown option: {other}"),
            }
        }

        if let Some(frames) = capture_frames {
            let frames = parse_frame_indices(&frames, options.frames);
            options.capture = options.capture.with_frames(frames);
        }
        if options.participants.is_empty() {
            bail!("at least one --participant is required");
        }
        Ok(options)
    }

    pub fn brick_extent(&self) -> Option<Vec3> {
        self.brick_size.map(Vec3::splat)
    }
}

fn parse_pair(s: &str, sep: char) -> Result<(u32, u32)> {
    let (a, b) = s
        .split_once(sep)
        .ok_or_else(|| anyhow!("expected A{sep}B, got {s:?}"))?;
    Ok((a.trim().parse()?, b.trim().parse()?))
}

fn parse_dims(s: &str) -> Result<UVec3> {
    let parts = s
        .split('x')
        .map(|d| d.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid volume dimensions {s:?}"))?;
    match parts[..] {
        [x, y, z] => Ok(UVec3::new(x, y, z)),
        _ => bail!("expected XxYxZ, got {s:?}"),
    }
}

fn parse_policy(s: &str) -> Result<PartialFramePolicy> {
    match s {
        "reuse" => Ok(PartialFramePolicy::ReuseLastImage),
        "skip" => Ok(PartialFramePolicy::Skip),
        "abort" => Ok(PartialFramePolicy::Abort),
        _ => bail!("unknown policy {s:?}, expected reuse, skip or abort"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let options = Options::parse([
            "-p", "10.0.0.1:31050", "--participant", "node2:31051", "--size", "800x600",
            "--dims", "64x32x16", "--policy", "skip", "--front-to-back", "--weights", "1,3",
            "-o", "frame_{}.png", "-c", "0,2-3",
        ])
        .unwrap();

        assert_eq!(options.participants.len(), 2);
        assert_eq!(options.participants[1].port, 31051);
        assert_eq!((options.width, options.height), (800, 600));
        assert_eq!(options.dims, UVec3::new(64, 32, 16));
        assert_eq!(options.policy, PartialFramePolicy::Skip);
        assert_eq!(options.order, CompositeOrder::FrontToBack);
        assert_eq!(options.weights, Some(vec![1.0, 3.0]));
        assert!(options.capture.should_capture(2));
        assert!(!options.capture.should_capture(1));
    }

    #[test]
    fn requires_a_participant() {
        assert!(Options::parse(["--frames", "3"]).is_err());
    }

    #[test]
    fn rejects_unknown_and_incomplete_options() {
        assert!(Options::parse(["-p", "a:1", "--bogus"]).is_err());
        assert!(Options::parse(["-p", "a:1", "--size"]).is_err());
        assert!(Options::parse(["-p", "a:1", "--dims", "4x4"]).is_err());
    }

    #[test]
    fn capture_selection_is_bounded_by_frames() {
        let options =
            Options::parse(["-p", "a:1", "-o", "f_{}.png", "-c", "3-99999999999", "--frames", "5"])
                .unwrap();
        assert_eq!(options.capture.frames, Some([3, 4].into()));

        let options = Options::parse(["-p", "a:1", "-o", "f_{}.png", "-c", "40", "--frames", "5"])
            .unwrap();
        assert!(!options.capture.should_capture(0));
    }
}

//! Selection of rendered frames to write to disk.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Which frames are saved, and where.
#[derive(Clone, Debug, Default)]
pub struct CaptureConfig {
    pub output_pattern: String,
    /// `None` captures every frame.
    pub frames: Option<BTreeSet<u64>>,
}

impl CaptureConfig {
    pub fn new(output_pattern: impl Into<String>) -> Self {
        Self {
            output_pattern: output_pattern.into(),
            frames: None,
        }
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.frames.get_or_insert_with(BTreeSet::new).extend(frames);
        self
    }

    /// Path for `frame`; `{}` in the pattern is replaced by the frame number.
    pub fn output_path(&self, frame: u64) -> PathBuf {
        PathBuf::from(self.output_pattern.replace("{}", &frame.to_string()))
    }

    pub fn should_capture(&self, frame: u64) -> bool {
        if self.output_pattern.is_empty() {
            return false;
        }
        match &self.frames {
            Some(frames) => frames.contains(&frame),
            None => true,
        }
    }
}

/// Parse frame indices like `"0,5-7,10"`, keeping only frames below
/// `frame_count`. Malformed parts are ignored.
pub fn parse_frame_indices(s: &str, frame_count: u64) -> BTreeSet<u64> {
    let mut frames = BTreeSet::new();
    let Some(last) = frame_count.checked_sub(1) else {
        return frames;
    };
    for part in s.split(',').map(str::trim) {
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) {
                frames.extend(start..=end.min(last));
            }
        } else if let Ok(frame) = part.parse::<u64>() {
            if frame <= last {
                frames.insert(frame);
            }
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mixed() {
        let frames = parse_frame_indices("0, 5-7,10,x,9-", 36);
        assert_eq!(frames, BTreeSet::from([0, 5, 6, 7, 10]));
    }

    #[test]
    fn ranges_stop_at_frame_count() {
        let frames = parse_frame_indices("2-18446744073709551615", 5);
        assert_eq!(frames, BTreeSet::from([2, 3, 4]));
        assert_eq!(parse_frame_indices("1,7,9-12", 8), BTreeSet::from([1, 7]));
        assert!(parse_frame_indices("0-3", 0).is_empty());
    }

    #[test]
    fn output_path_substitutes_frame() {
        let config = CaptureConfig::new("orbit_{}.png");
        assert_eq!(config.output_path(12), PathBuf::from("orbit_12.png"));
    }

    #[test]
    fn missing_selection_captures_everything() {
        let all = CaptureConfig::new("f_{}.png");
        assert!(all.should_capture(3));
        let some = CaptureConfig::new("f_{}.png").with_frames([1, 2]);
        assert!(some.should_capture(2));
        assert!(!some.should_capture(3));
        assert!(!CaptureConfig::default().should_capture(0));
        let none = CaptureConfig::new("f_{}.png").with_frames(std::iter::empty());
        assert!(!none.should_capture(0));
    }
}

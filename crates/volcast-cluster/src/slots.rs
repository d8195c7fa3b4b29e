//! Per-participant image slots shared between workers and the coordinator.

use std::sync::Arc;

use parking_lot::Mutex;
use volcast_core::FrameImage;

/// The latest image delivered by one participant.
#[derive(Clone, Debug)]
pub struct SlotEntry {
    /// Frame sequence the image was delivered for.
    pub frame: u64,
    pub image: Arc<FrameImage>,
}

/// One slot per participant.
///
/// Slot `i` is written only by worker `i` and read by the coordinator after
/// the frame barrier, so the locks are never contended.
#[derive(Debug)]
pub struct ImageSlots {
    slots: Vec<Mutex<Option<SlotEntry>>>,
}

impl ImageSlots {
    pub fn new(participants: usize) -> Self {
        Self {
            slots: (0..participants).map(|_| Mutex::new(None)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Replace the image in slot `participant`.
    pub fn store(&self, participant: usize, frame: u64, image: FrameImage) {
        if let Some(slot) = self.slots.get(participant) {
            *slot.lock() = Some(SlotEntry {
                frame,
                image: Arc::new(image),
            });
        }
    }

    pub fn get(&self, participant: usize) -> Option<SlotEntry> {
        self.slots.get(participant)?.lock().clone()
    }

    /// The image in slot `participant` if it belongs to `frame`.
    pub fn fresh(&self, participant: usize, frame: u64) -> Option<Arc<FrameImage>> {
        self.get(participant)
            .filter(|entry| entry.frame == frame)
            .map(|entry| entry.image)
    }

    pub fn is_fresh(&self, participant: usize, frame: u64) -> bool {
        self.slots
            .get(participant)
            .is_some_and(|slot| slot.lock().as_ref().is_some_and(|e| e.frame == frame))
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            *slot.lock() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volcast_core::ScreenRect;

    #[test]
    fn freshness_tracks_frame() {
        let slots = ImageSlots::new(2);
        assert!(slots.get(0).is_none());

        slots.store(1, 5, FrameImage::filled(1, ScreenRect::new(0, 0, 1, 1), [0; 4]));
        assert!(slots.is_fresh(1, 5));
        assert!(!slots.is_fresh(1, 6));
        assert!(!slots.is_fresh(0, 5));
        assert!(slots.fresh(1, 5).is_some());
        assert!(slots.fresh(1, 4).is_none());
        assert_eq!(slots.get(1).unwrap().frame, 5);

        slots.clear();
        assert!(slots.get(1).is_none());
    }

    #[test]
    fn out_of_range_is_ignored() {
        let slots = ImageSlots::new(1);
        slots.store(3, 1, FrameImage::empty(3));
        assert!(slots.get(3).is_none());
        assert!(!slots.is_fresh(3, 1));
    }
}

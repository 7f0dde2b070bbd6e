//! Marker frame sources.
//!
//! Detection runs outside cardsync; the peer runtime only needs something
//! that yields the current frame each sync period.

use cardsync_protocol::{MarkerFrame, CORNER_VALUES_PER_TAG};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Yields the marker detections of the current camera frame.
pub trait MarkerSource: Send {
    fn current(&mut self) -> MarkerFrame;
}

/// No camera: always an empty frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMarkers;

impl MarkerSource for NoMarkers {
    fn current(&mut self) -> MarkerFrame {
        MarkerFrame::default()
    }
}

/// Fixed set of tags drifting a little every frame.
#[derive(Debug)]
pub struct SyntheticMarkers {
    rng: StdRng,
    ids: Vec<i32>,
    width: i32,
    height: i32,
}

impl SyntheticMarkers {
    pub fn new(seed: u64, ids: Vec<i32>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ids,
            width: 1280,
            height: 720,
        }
    }
}

impl MarkerSource for SyntheticMarkers {
    fn current(&mut self) -> MarkerFrame {
        let mut corners = Vec::with_capacity(self.ids.len() * CORNER_VALUES_PER_TAG);
        for (slot, _) in self.ids.iter().enumerate() {
            let cx = 160.0 + slot as f32 * 240.0 + self.rng.gen_range(-4.0..4.0);
            let cy = self.height as f32 / 2.0 + self.rng.gen_range(-4.0..4.0);
            for (dx, dy) in [(-40.0, -40.0), (40.0, -40.0), (40.0, 40.0), (-40.0, 40.0)] {
                corners.push(cx + dx);
                corners.push(cy + dy);
            }
        }
        MarkerFrame {
            corners,
            ids: self.ids.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_frames_are_well_formed() {
        let mut source = SyntheticMarkers::new(3, vec![10, 20, 30]);
        let frame = source.current();
        frame.validate().unwrap();
        assert_eq!(frame.tags().len(), 3);
        assert!(NoMarkers.current().is_empty());
    }
}

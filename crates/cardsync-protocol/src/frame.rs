//! Marker frame payload (event id 50).
//!
//! The marker pipeline is an external collaborator: it hands us flat arrays of
//! corner coordinates and tag ids for one camera frame, and we carry them
//! opaquely to every peer. The only structure checked here is the one the
//! receivers rely on: eight corner values (four x/y pairs) per tag id.

use serde::{Deserialize, Serialize};

use crate::envelope::{Field, FieldReader};
use crate::error::{DecodeError, Result};
use crate::payload::Payload;
use crate::types::EventId;

/// Corner values per detected tag: four (x, y) pairs.
pub const CORNER_VALUES_PER_TAG: usize = 8;

/// Raw marker detections for one camera frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerFrame {
    /// Flattened corner coordinates, `CORNER_VALUES_PER_TAG` per tag.
    pub corners: Vec<f32>,
    /// Unique tag ids, one per detected tag.
    pub ids: Vec<i32>,
    pub width: i32,
    pub height: i32,
}

/// One detected tag with its corners in display space.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTag {
    pub id: i32,
    /// Corners with x mirrored about the frame width.
    pub corners: [(f64, f64); 4],
}

impl MarkerFrame {
    /// Number of detected tags.
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check the corners array matches the id count.
    pub fn validate(&self) -> Result<()> {
        let expected = self.ids.len() * CORNER_VALUES_PER_TAG;
        if self.corners.len() != expected {
            return Err(DecodeError::Malformed(format!(
                "{} tag ids need {} corner values, got {}",
                self.ids.len(),
                expected,
                self.corners.len()
            )));
        }
        if self.width < 0 || self.height < 0 {
            return Err(DecodeError::Malformed(format!(
                "negative frame size {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Per-tag corner quads. Camera images arrive mirrored, so x is flipped.
    pub fn tags(&self) -> Vec<MarkerTag> {
        let width = f64::from(self.width);
        self.ids
            .iter()
            .zip(self.corners.chunks_exact(CORNER_VALUES_PER_TAG))
            .map(|(&id, c)| MarkerTag {
                id,
                corners: [
                    (width - f64::from(c[0]), f64::from(c[1])),
                    (width - f64::from(c[2]), f64::from(c[3])),
                    (width - f64::from(c[4]), f64::from(c[5])),
                    (width - f64::from(c[6]), f64::from(c[7])),
                ],
            })
            .collect()
    }
}

/// A player's marker frame, as broadcast to the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    pub markers: MarkerFrame,
    pub player_id: i32,
    pub player_nick: String,
}

impl std::fmt::Display for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tags: {}, nick: {}, player: {}",
            self.markers.count(),
            self.player_nick,
            self.player_id
        )
    }
}

impl Payload for FrameData {
    const EVENT_ID: EventId = EventId::FRAME_SYNC;

    fn write_fields(&self) -> Vec<Field> {
        vec![
            Field::Text(self.player_nick.clone()),
            Field::Int(self.player_id),
            Field::Int(self.markers.width),
            Field::Int(self.markers.height),
            Field::IntArray(self.markers.ids.clone()),
            Field::FloatArray(self.markers.corners.clone()),
        ]
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self> {
        let player_nick = reader.text()?;
        let player_id = reader.int()?;
        let width = reader.int()?;
        let height = reader.int()?;
        let ids = reader.int_array()?;
        let corners = reader.float_array()?;

        let markers = MarkerFrame {
            corners,
            ids,
            width,
            height,
        };
        markers.validate()?;

        Ok(Self {
            markers,
            player_id,
            player_nick,
        })
    }
}

//! Position ranges of human motion, used to sanity check scale tables against real data.

use std::collections::BTreeMap;

use nalgebra::Vector3;

use crate::frame::MotionClip;

/// The axis aligned bounds of one body's trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyRange {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
    /// Number of frames the body appears in.
    pub samples: usize,
}

impl BodyRange {
    fn new(position: Vector3<f64>) -> Self {
        Self {
            min: position,
            max: position,
            samples: 1,
        }
    }

    fn extend(&mut self, position: &Vector3<f64>) {
        self.min = self.min.inf(position);
        self.max = self.max.sup(position);
        self.samples += 1;
    }

    #[must_use]
    pub fn range(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Length of the diagonal of the bounds.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.range().norm()
    }
}

/// Per body movement ranges of a clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionRanges {
    pub frames: usize,
    /// Duration in seconds.
    pub duration: f64,
    pub bodies: BTreeMap<String, BodyRange>,
}

impl MotionRanges {
    #[must_use]
    pub fn from_clip(clip: &MotionClip) -> Self {
        let mut bodies: BTreeMap<String, BodyRange> = BTreeMap::new();

        for (body, pose) in clip.frames.iter().flat_map(|frame| frame.iter()) {
            match bodies.get_mut(body) {
                Some(range) => range.extend(&pose.position),
                None => {
                    bodies.insert(body.to_string(), BodyRange::new(pose.position));
                }
            }
        }

        Self {
            frames: clip.frames.len(),
            duration: clip.duration(),
            bodies,
        }
    }

    /// Bodies ordered by how far they move, largest first.
    #[must_use]
    pub fn by_magnitude(&self) -> Vec<(&str, &BodyRange)> {
        let mut bodies: Vec<_> = self
            .bodies
            .iter()
            .map(|(body, range)| (body.as_str(), range))
            .collect();
        bodies.sort_by(|(_, a), (_, b)| b.magnitude().total_cmp(&a.magnitude()));
        bodies
    }
}

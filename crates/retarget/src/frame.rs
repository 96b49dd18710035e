//! Human motion as produced by a motion source: per frame, a pose for every body the source
//! knows about.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::{Error, KeyPath, Result};

/// World position and orientation of a single body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl BodyPose {
    #[must_use]
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// A pose at `position` with identity orientation.
    #[must_use]
    pub fn at(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }
}

/// The poses of all bodies of one human motion frame, keyed by body name.
///
/// Sources are frequently sparse: a body that one source produces may be missing from another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HumanFrame {
    bodies: BTreeMap<String, BodyPose>,
}

impl HumanFrame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, body: impl Into<String>, pose: BodyPose) -> Option<BodyPose> {
        self.bodies.insert(body.into(), pose)
    }

    #[must_use]
    pub fn get(&self, body: &str) -> Option<&BodyPose> {
        self.bodies.get(body)
    }

    #[must_use]
    pub fn contains(&self, body: &str) -> bool {
        self.bodies.contains_key(body)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BodyPose)> {
        self.bodies.iter().map(|(body, pose)| (body.as_str(), pose))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, BodyPose)> for HumanFrame {
    fn from_iter<I: IntoIterator<Item = (S, BodyPose)>>(iter: I) -> Self {
        Self {
            bodies: iter
                .into_iter()
                .map(|(body, pose)| (body.into(), pose))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct WireClip {
    fps: f64,
    #[serde(default)]
    human_height: Option<f64>,
    frames: Vec<BTreeMap<String, ([f64; 3], [f64; 4])>>,
}

/// A sequence of human frames, as exported by a motion source.
///
/// The document layout is
/// `{"fps": 30.0, "human_height": 1.75, "frames": [{"pelvis": [[x, y, z], [w, x, y, z]]}]}`,
/// where `human_height` is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionClip {
    pub fps: f64,
    /// Measured height of the recorded subject, in meters.
    pub human_height: Option<f64>,
    pub frames: Vec<HumanFrame>,
}

impl MotionClip {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(Error::io(path))?;

        let clip = Self::from_json_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            frames = clip.frames.len(),
            fps = clip.fps,
            "loaded motion clip"
        );
        Ok(clip)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let wire: WireClip = serde_json::from_str(contents)?;
        let root = KeyPath::root();

        if !(wire.fps.is_finite() && wire.fps > 0.0) {
            return Err(Error::motion(
                &root.field("fps"),
                format!("frame rate must be positive, got {}", wire.fps),
            ));
        }

        let frames_path = root.field("frames");
        let frames = wire
            .frames
            .into_iter()
            .enumerate()
            .map(|(index, bodies)| {
                let frame_path = frames_path.index(index);
                bodies
                    .into_iter()
                    .map(|(body, (position, [w, x, y, z]))| {
                        let orientation =
                            UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f64::EPSILON)
                                .ok_or_else(|| {
                                    Error::motion(
                                        &frame_path.field(&body).index(1),
                                        "orientation cannot be normalized",
                                    )
                                })?;
                        let pose = BodyPose::new(Vector3::from(position), orientation);
                        Ok::<_, Error>((body, pose))
                    })
                    .collect::<Result<HumanFrame>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            fps: wire.fps,
            human_height: wire.human_height.filter(|height| *height > 0.0),
            frames,
        })
    }

    /// Duration of the clip in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    /// Names of all bodies that appear in at least one frame.
    #[must_use]
    pub fn body_names(&self) -> BTreeSet<&str> {
        self.frames
            .iter()
            .flat_map(|frame| frame.iter().map(|(body, _)| body))
            .collect()
    }

    /// Add a body that takes its position from one body and its orientation from another.
    ///
    /// BVH exports typically track the foot joint position but the toe orientation, e.g. a
    /// `LeftFootMod` built from `LeftFoot` and `LeftToe`. Frames where either source body is
    /// missing are left unchanged.
    #[must_use]
    pub fn with_derived_body(
        mut self,
        name: &str,
        position_from: &str,
        orientation_from: &str,
    ) -> Self {
        for frame in &mut self.frames {
            let (Some(position), Some(orientation)) =
                (frame.get(position_from), frame.get(orientation_from))
            else {
                continue;
            };

            let pose = BodyPose::new(position.position, orientation.orientation);
            frame.insert(name, pose);
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP: &str = r#"{
        "fps": 30.0,
        "human_height": 1.75,
        "frames": [
            {
                "pelvis": [[0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 0.0]],
                "left_foot": [[0.1, 0.1, 0.05], [1.0, 0.0, 0.0, 0.0]],
                "left_toe": [[0.2, 0.1, 0.0], [0.0, 0.0, 0.0, 1.0]]
            },
            {
                "pelvis": [[0.0, 0.1, 1.0], [2.0, 0.0, 0.0, 0.0]]
            }
        ]
    }"#;

    #[test]
    fn load_clip() {
        let clip = MotionClip::from_json_str(CLIP).unwrap();

        assert_eq!(clip.frames.len(), 2);
        assert_eq!(clip.human_height, Some(1.75));
        assert!((clip.duration() - 2.0 / 30.0).abs() < 1e-12);
        assert_eq!(
            clip.body_names().into_iter().collect::<Vec<_>>(),
            vec!["left_foot", "left_toe", "pelvis"]
        );

        // orientations are normalized on load
        let pelvis = clip.frames[1].get("pelvis").unwrap();
        assert_eq!(pelvis.orientation, UnitQuaternion::identity());
    }

    #[test]
    fn degenerate_orientation_is_reported() {
        let contents = CLIP.replace("[2.0, 0.0, 0.0, 0.0]", "[0.0, 0.0, 0.0, 0.0]");
        let error = MotionClip::from_json_str(&contents).unwrap_err();

        assert_eq!(
            error.key_path().map(KeyPath::as_str),
            Some("frames[1].pelvis[1]")
        );
    }

    #[test]
    fn derived_body() {
        let clip = MotionClip::from_json_str(CLIP)
            .unwrap()
            .with_derived_body("LeftFootMod", "left_foot", "left_toe");

        let derived = clip.frames[0].get("LeftFootMod").unwrap();
        assert_eq!(derived.position, Vector3::new(0.1, 0.1, 0.05));
        assert_eq!(
            derived.orientation,
            clip.frames[0].get("left_toe").unwrap().orientation
        );
        assert!(!clip.frames[1].contains("LeftFootMod"));
    }
}

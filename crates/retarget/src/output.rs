//! The target document handed to the IK solver.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    blend::{BlendedTarget, Contribution},
    resolve::ResolvedTarget,
    session::TargetFrame,
};

/// A target pose with its weights, as written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub position: [f64; 3],
    /// Rotation as `[w, x, y, z]`.
    pub rotation: [f64; 4],
    pub position_weight: f64,
    pub rotation_weight: f64,
}

impl TargetRecord {
    fn new(
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
        position_weight: f64,
        rotation_weight: f64,
    ) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            rotation: [rotation.w, rotation.i, rotation.j, rotation.k],
            position_weight,
            rotation_weight,
        }
    }
}

impl From<&ResolvedTarget> for TargetRecord {
    fn from(target: &ResolvedTarget) -> Self {
        Self::new(
            &target.position,
            &target.rotation,
            target.position_weight,
            target.rotation_weight,
        )
    }
}

/// The blended target of one robot body and what each table contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedRecord {
    #[serde(flatten)]
    pub target: TargetRecord,
    /// Contributions keyed by table key, e.g. `ik_match_table1`.
    pub contributions: BTreeMap<String, TargetRecord>,
}

impl From<&BlendedTarget> for BlendedRecord {
    fn from(blended: &BlendedTarget) -> Self {
        Self {
            target: TargetRecord::new(
                &blended.position,
                &blended.rotation,
                blended.position_weight,
                blended.rotation_weight,
            ),
            contributions: blended
                .contributions
                .iter()
                .map(|Contribution { table, target }| (table.key().to_string(), target.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub targets: BTreeMap<String, BlendedRecord>,
    /// Robot bodies that received no target in this frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub root_missing: bool,
}

impl From<&TargetFrame> for FrameRecord {
    fn from(frame: &TargetFrame) -> Self {
        let mut omitted: Vec<String> = frame
            .missing
            .iter()
            .filter(|missing| !frame.targets.contains_key(&missing.robot_body))
            .map(|missing| missing.robot_body.clone())
            .collect();
        omitted.sort();
        omitted.dedup();

        Self {
            targets: frame
                .targets
                .iter()
                .map(|(robot_body, target)| (robot_body.clone(), target.into()))
                .collect(),
            omitted,
            root_missing: frame.root_missing,
        }
    }
}

/// Retargeted targets of a whole motion clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDocument {
    /// The motion file the targets were computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub fps: f64,
    pub robot_root_name: String,
    pub frame_count: usize,
    pub frames: Vec<FrameRecord>,
}

impl TargetDocument {
    #[must_use]
    pub fn new(robot_root_name: impl Into<String>, fps: f64, frames: &[TargetFrame]) -> Self {
        Self {
            source: None,
            fps,
            robot_root_name: robot_root_name.into(),
            frame_count: frames.len(),
            frames: frames.iter().map(FrameRecord::from).collect(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::io(path))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(Error::io(path))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(Error::io(path))
    }

    /// Whether this document holds every frame of a clip with `expected_frames` frames.
    #[must_use]
    pub fn is_complete_for(&self, expected_frames: usize) -> bool {
        self.frame_count == expected_frames && self.frames.len() == expected_frames
    }
}

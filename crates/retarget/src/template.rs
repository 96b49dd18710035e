//! Generation of starting point configurations for a new robot.

use std::collections::BTreeSet;

use nalgebra::{Quaternion, Vector3};

use crate::{
    BodyClass, Error, KeyPath, Result,
    config::{BodyCorrespondence, MatchTable, RetargetConfig, ScaleTable},
};

/// Robot height used when the robot model gives no better estimate.
pub const DEFAULT_ROBOT_HEIGHT: f64 = 1.0;

/// Height of the reference human, in meters.
pub const DEFAULT_HUMAN_HEIGHT: f64 = 1.8;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub robot_body: String,
    pub human_body: String,
    pub position_offset: Vector3<f64>,
    pub rotation_offset: Quaternion<f64>,
}

/// A robot body to human body mapping from which a full configuration is derived.
///
/// Scale factors follow from the height ratio between robot and human, with slightly shorter arms,
/// and the head and unclassified bodies shorter still. Weights follow from the body class of the
/// robot body: feet and torso get full position weight, everything else is tracked by rotation
/// only. Both tables start out identical.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTemplate {
    pub robot_root_name: String,
    pub human_root_name: String,
    pub robot_height: f64,
    pub human_height_assumption: f64,
    pub entries: Vec<TemplateEntry>,
}

impl ConfigTemplate {
    #[must_use]
    pub fn new(robot_root_name: impl Into<String>, human_root_name: impl Into<String>) -> Self {
        Self {
            robot_root_name: robot_root_name.into(),
            human_root_name: human_root_name.into(),
            robot_height: DEFAULT_ROBOT_HEIGHT,
            human_height_assumption: DEFAULT_HUMAN_HEIGHT,
            entries: Vec::new(),
        }
    }

    /// The DASH humanoid tracking SMPL-X bodies.
    #[must_use]
    pub fn dash() -> Self {
        let pitched = Quaternion::new(0.5, -0.5, -0.5, -0.5);
        let identity = Quaternion::identity();

        [
            ("torso", "pelvis", pitched),
            ("r_hip", "right_hip", pitched),
            ("r_upper_leg", "right_knee", pitched),
            ("r_foot", "right_foot", pitched),
            ("l_hip", "left_hip", pitched),
            ("l_upper_leg", "left_knee", pitched),
            ("l_foot", "left_foot", pitched),
            ("r_prox_shoulder", "right_shoulder", Quaternion::new(0.0, 0.707, 0.0, 0.707)),
            ("r_upper_arm", "right_elbow", Quaternion::new(0.0, 0.0, 0.0, -1.0)),
            ("r_lower_arm", "right_wrist", Quaternion::new(0.0, 0.0, 0.0, -1.0)),
            ("l_prox_shoulder", "left_shoulder", Quaternion::new(0.707, 0.0, -0.707, 0.0)),
            ("l_upper_arm", "left_elbow", identity),
            ("l_lower_arm", "left_wrist", identity),
        ]
        .into_iter()
        .fold(
            Self::new("torso", "pelvis"),
            |template, (robot_body, human_body, rotation_offset)| {
                template.map_with_offsets(robot_body, human_body, Vector3::zeros(), rotation_offset)
            },
        )
    }

    #[must_use]
    pub fn with_robot_height(mut self, robot_height: f64) -> Self {
        self.robot_height = robot_height;
        self
    }

    #[must_use]
    pub fn with_human_height(mut self, human_height_assumption: f64) -> Self {
        self.human_height_assumption = human_height_assumption;
        self
    }

    /// Drop the entries for robot bodies that `robot_bodies` does not contain.
    #[must_use]
    pub fn restricted_to<'b>(mut self, robot_bodies: impl IntoIterator<Item = &'b str>) -> Self {
        let robot_bodies: BTreeSet<&str> = robot_bodies.into_iter().collect();
        self.entries
            .retain(|entry| robot_bodies.contains(entry.robot_body.as_str()));
        self
    }

    /// Map `robot_body` onto `human_body` without offsets.
    #[must_use]
    pub fn map(self, robot_body: &str, human_body: &str) -> Self {
        self.map_with_offsets(robot_body, human_body, Vector3::zeros(), Quaternion::identity())
    }

    #[must_use]
    pub fn map_with_offsets(
        mut self,
        robot_body: &str,
        human_body: &str,
        position_offset: Vector3<f64>,
        rotation_offset: Quaternion<f64>,
    ) -> Self {
        self.entries.retain(|entry| entry.robot_body != robot_body);
        self.entries.push(TemplateEntry {
            robot_body: robot_body.to_string(),
            human_body: human_body.to_string(),
            position_offset,
            rotation_offset,
        });
        self
    }

    /// Scale factor of the torso and legs, rounded to centimeter precision.
    #[must_use]
    pub fn base_scale(&self) -> f64 {
        round_scale(self.robot_height / self.human_height_assumption)
    }

    /// Build the configuration.
    ///
    /// The result is passed through the loader, so it is rejected exactly like a hand written
    /// document would be, e.g. for a non-positive height or a degenerate rotation offset.
    pub fn build(&self) -> Result<RetargetConfig> {
        for (key, height) in [
            ("robot_height", self.robot_height),
            ("human_height_assumption", self.human_height_assumption),
        ] {
            if !(height.is_finite() && height > 0.0) {
                return Err(Error::config(
                    &KeyPath::root().field(key),
                    format!("height must be positive, got {height}"),
                ));
            }
        }

        let base = self.robot_height / self.human_height_assumption;

        let scale_table: ScaleTable = self
            .entries
            .iter()
            .map(|entry| entry.human_body.as_str())
            .chain(std::iter::once(self.human_root_name.as_str()))
            .map(|human_body| {
                let factor = match BodyClass::classify(human_body) {
                    BodyClass::Foot | BodyClass::Torso | BodyClass::Leg => base,
                    BodyClass::Arm => base * 0.9,
                    BodyClass::Head | BodyClass::Other => base * 0.8,
                };
                (human_body, round_scale(factor))
            })
            .collect();

        let table: MatchTable = self
            .entries
            .iter()
            .map(|entry| {
                let (position_weight, rotation_weight) = default_weights(&entry.robot_body);
                BodyCorrespondence {
                    robot_body: entry.robot_body.clone(),
                    human_body: entry.human_body.clone(),
                    position_weight,
                    rotation_weight,
                    position_offset: entry.position_offset,
                    rotation_offset: entry.rotation_offset,
                }
            })
            .collect();

        let config = RetargetConfig {
            robot_root_name: self.robot_root_name.clone(),
            human_root_name: self.human_root_name.clone(),
            ground_height: 0.0,
            human_height_assumption: self.human_height_assumption,
            use_table1: true,
            use_table2: true,
            scale_table,
            table1: table.clone(),
            table2: Some(table),
        };

        RetargetConfig::from_json_str(&config.to_json_string()?)
    }
}

fn round_scale(factor: f64) -> f64 {
    (factor * 100.0).round() / 100.0
}

/// Position and rotation weight for a robot body, by body class.
#[must_use]
pub fn default_weights(robot_body: &str) -> (f64, f64) {
    match BodyClass::classify(robot_body) {
        BodyClass::Foot => (100.0, 50.0),
        BodyClass::Torso => (100.0, 10.0),
        _ => (0.0, 10.0),
    }
}

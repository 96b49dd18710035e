//! Rescaling of human motion to the robot's proportions.

use nalgebra::Vector3;

use crate::{
    Error, KeyPath, Result,
    config::{RetargetConfig, ScaleTable},
    frame::{BodyPose, HumanFrame},
};

/// A human frame expressed at robot scale.
///
/// Only bodies with a scale factor survive normalization. Orientations are untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaledFrame(HumanFrame);

impl ScaledFrame {
    #[must_use]
    pub fn get(&self, body: &str) -> Option<&BodyPose> {
        self.0.get(body)
    }

    #[must_use]
    pub fn contains(&self, body: &str) -> bool {
        self.0.contains(body)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BodyPose)> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> HumanFrame {
        self.0
    }
}

/// Scales human body positions relative to the human root.
///
/// The root is scaled from the world origin by its own factor, every other body keeps its
/// displacement from the root scaled by `scale[body] * actual_height / assumed_height`.
#[derive(Debug, Clone)]
pub struct ScaleNormalizer<'a> {
    scale_table: &'a ScaleTable,
    human_root: &'a str,
    ratio: f64,
    ground_height: f64,
}

impl<'a> ScaleNormalizer<'a> {
    /// Create a normalizer for a subject of `actual_subject_height` meters.
    ///
    /// A non-positive subject height is treated as unknown, and the scale table is used as
    /// authored.
    pub fn new(
        scale_table: &'a ScaleTable,
        human_root: &'a str,
        human_height_assumption: f64,
        actual_subject_height: f64,
    ) -> Result<Self> {
        if !(human_height_assumption.is_finite() && human_height_assumption > 0.0) {
            return Err(Error::config(
                &KeyPath::root().field("human_height_assumption"),
                format!("human height must be positive, got {human_height_assumption}"),
            ));
        }
        scale_table.require(human_root)?;

        let ratio = if actual_subject_height.is_finite() && actual_subject_height > 0.0 {
            actual_subject_height / human_height_assumption
        } else {
            tracing::warn!(
                actual_subject_height,
                "invalid subject height, using the assumed human height"
            );
            1.0
        };

        Ok(Self {
            scale_table,
            human_root,
            ratio,
            ground_height: 0.0,
        })
    }

    /// Create a normalizer for every human body the enabled tables of `config` track.
    ///
    /// Fails if any of those bodies has no scale factor.
    pub fn for_config(
        config: &'a RetargetConfig,
        actual_subject_height: Option<f64>,
    ) -> Result<Self> {
        for body in config.tracked_human_bodies() {
            config.scale_table.require(body)?;
        }

        let normalizer = Self::new(
            &config.scale_table,
            &config.human_root_name,
            config.human_height_assumption,
            actual_subject_height.unwrap_or(config.human_height_assumption),
        )?;
        Ok(normalizer.with_ground_height(config.ground_height))
    }

    /// Height of the ground plane in the human frame, removed before scaling.
    #[must_use]
    pub fn with_ground_height(mut self, ground_height: f64) -> Self {
        self.ground_height = ground_height;
        self
    }

    /// Ratio between the actual subject height and the assumed human height.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Scale a frame, or `None` if the frame does not contain the human root.
    #[must_use]
    pub fn normalize(&self, frame: &HumanFrame) -> Option<ScaledFrame> {
        let ground = Vector3::z() * self.ground_height;
        let root = frame.get(self.human_root)?.position - ground;

        // the root factor is required on construction
        let root_scale = self.scale_table.get(self.human_root)? * self.ratio;
        let scaled_root = root * root_scale;

        let scaled = frame
            .iter()
            .filter_map(|(body, pose)| {
                let factor = self.scale_table.get(body)? * self.ratio;
                let position = if body == self.human_root {
                    scaled_root
                } else {
                    scaled_root + (pose.position - ground - root) * factor
                };

                Some((body, BodyPose::new(position, pose.orientation)))
            })
            .collect();

        Some(ScaledFrame(scaled))
    }
}

/// Scale a single frame, see [`ScaleNormalizer`].
///
/// Returns `Ok(None)` when the frame lacks the human root.
pub fn normalize(
    frame: &HumanFrame,
    scale_table: &ScaleTable,
    human_root: &str,
    human_height_assumption: f64,
    actual_subject_height: f64,
) -> Result<Option<ScaledFrame>> {
    let normalizer = ScaleNormalizer::new(
        scale_table,
        human_root,
        human_height_assumption,
        actual_subject_height,
    )?;
    Ok(normalizer.normalize(frame))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    use super::*;

    fn scale_table() -> ScaleTable {
        [("pelvis", 0.55), ("left_foot", 0.5)].into_iter().collect()
    }

    fn frame() -> HumanFrame {
        let tilted = UnitQuaternion::from_euler_angles(0.1, 0.0, 0.3);
        [
            ("pelvis", BodyPose::at(Vector3::new(0.0, 0.0, 1.0))),
            ("left_foot", BodyPose::new(Vector3::new(0.1, 0.0, 0.1), tilted)),
            ("jaw", BodyPose::at(Vector3::new(0.0, 0.0, 1.6))),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn root_scaled_from_origin() {
        let scaled = normalize(&frame(), &scale_table(), "pelvis", 1.8, 1.8)
            .unwrap()
            .unwrap();

        assert_relative_eq!(
            scaled.get("pelvis").unwrap().position,
            Vector3::new(0.0, 0.0, 0.55),
            epsilon = 1e-12
        );
    }

    #[test]
    fn bodies_scaled_relative_to_root() {
        let scaled = normalize(&frame(), &scale_table(), "pelvis", 1.8, 1.8)
            .unwrap()
            .unwrap();

        let foot = scaled.get("left_foot").unwrap();
        assert_relative_eq!(foot.position, Vector3::new(0.05, 0.0, 0.1), epsilon = 1e-12);
        assert_eq!(
            foot.orientation,
            frame().get("left_foot").unwrap().orientation
        );

        // nothing references the jaw, and it has no factor
        assert!(!scaled.contains("jaw"));
    }

    #[test]
    fn subject_height_adjusts_scale() {
        let scaled = normalize(&frame(), &scale_table(), "pelvis", 1.8, 0.9)
            .unwrap()
            .unwrap();

        assert_relative_eq!(
            scaled.get("pelvis").unwrap().position,
            Vector3::new(0.0, 0.0, 0.275),
            epsilon = 1e-12
        );
    }

    #[test]
    fn invalid_subject_height_is_ignored() {
        let table = scale_table();
        let normalizer = ScaleNormalizer::new(&table, "pelvis", 1.8, -1.0).unwrap();
        assert_relative_eq!(normalizer.ratio(), 1.0);
    }

    #[test]
    fn ground_height_is_removed_before_scaling() {
        let table = scale_table();
        let normalizer = ScaleNormalizer::new(&table, "pelvis", 1.8, 1.8)
            .unwrap()
            .with_ground_height(0.2);

        let scaled = normalizer.normalize(&frame()).unwrap();
        assert_relative_eq!(
            scaled.get("pelvis").unwrap().position,
            Vector3::new(0.0, 0.0, 0.44),
            epsilon = 1e-12
        );
    }

    #[test]
    fn missing_root_in_frame() {
        let frame: HumanFrame = [("left_foot", BodyPose::at(Vector3::zeros()))]
            .into_iter()
            .collect();

        let scaled = normalize(&frame, &scale_table(), "pelvis", 1.8, 1.8).unwrap();
        assert!(scaled.is_none());
    }

    #[test]
    fn missing_root_factor_is_config_error() {
        let error = normalize(&frame(), &scale_table(), "hips", 1.8, 1.8).unwrap_err();
        assert!(matches!(error, Error::Config { .. }));
    }

    #[test]
    fn non_positive_assumption_is_config_error() {
        for assumption in [0.0, -1.8] {
            let error = normalize(&frame(), &scale_table(), "pelvis", assumption, 1.8).unwrap_err();
            assert_eq!(
                error.key_path().map(KeyPath::as_str),
                Some("human_height_assumption")
            );
        }
    }
}

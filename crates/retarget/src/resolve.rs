//! Resolution of match table entries into per robot body targets.

use std::{collections::BTreeMap, fmt};

use nalgebra::{UnitQuaternion, Vector3};

use crate::{
    config::{BodyCorrespondence, MatchTable, TableId},
    scale::ScaledFrame,
};

/// Target pose and weights for one robot body, from one table, for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTarget {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub position_weight: f64,
    pub rotation_weight: f64,
}

/// A table entry whose human body was absent from the frame.
///
/// The target is dropped for that frame only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MissingBodyWarning {
    pub table: TableId,
    pub robot_body: String,
    pub human_body: String,
}

impl fmt::Display for MissingBodyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` tracks `{}` in {}, which is missing from the frame",
            self.robot_body, self.human_body, self.table
        )
    }
}

/// Resolve the target of a single entry.
///
/// The rotation offset is right-multiplied onto the human orientation, the position offset is
/// added to the human position. Returns `None` when the frame does not contain the human body.
#[must_use]
pub fn resolve(
    correspondence: &BodyCorrespondence,
    frame: &ScaledFrame,
) -> Option<ResolvedTarget> {
    let pose = frame.get(&correspondence.human_body)?;

    Some(ResolvedTarget {
        position: pose.position + correspondence.position_offset,
        rotation: pose.orientation * correspondence.unit_rotation_offset(),
        position_weight: correspondence.position_weight,
        rotation_weight: correspondence.rotation_weight,
    })
}

/// All targets one table produces for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TableTargets {
    pub table: TableId,
    pub targets: BTreeMap<String, ResolvedTarget>,
    pub missing: Vec<MissingBodyWarning>,
}

impl TableTargets {
    /// Take the target for `robot_body` out of this set.
    pub fn take(&mut self, robot_body: &str) -> Option<ResolvedTarget> {
        self.targets.remove(robot_body)
    }
}

/// Resolve every entry of `table`, collecting entries whose human body is missing.
#[must_use]
pub fn resolve_table(id: TableId, table: &MatchTable, frame: &ScaledFrame) -> TableTargets {
    let mut targets = BTreeMap::new();
    let mut missing = Vec::new();

    for entry in table.iter() {
        match resolve(entry, frame) {
            Some(target) => {
                targets.insert(entry.robot_body.clone(), target);
            }
            None => missing.push(MissingBodyWarning {
                table: id,
                robot_body: entry.robot_body.clone(),
                human_body: entry.human_body.clone(),
            }),
        }
    }

    TableTargets {
        table: id,
        targets,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use nalgebra::Quaternion;

    use super::*;
    use crate::{
        config::ScaleTable,
        frame::{BodyPose, HumanFrame},
        scale::ScaleNormalizer,
    };

    fn entry(
        robot_body: &str,
        human_body: &str,
        rotation_offset: Quaternion<f64>,
    ) -> BodyCorrespondence {
        BodyCorrespondence {
            robot_body: robot_body.to_string(),
            human_body: human_body.to_string(),
            position_weight: 100.0,
            rotation_weight: 40.0,
            position_offset: Vector3::new(0.0, 0.0, 0.05),
            rotation_offset,
        }
    }

    fn scaled(frame: &HumanFrame) -> ScaledFrame {
        let table: ScaleTable = [("pelvis", 1.0), ("right_foot", 1.0)].into_iter().collect();
        ScaleNormalizer::new(&table, "pelvis", 1.8, 1.8)
            .unwrap()
            .normalize(frame)
            .unwrap()
    }

    #[test]
    fn offsets_are_applied() {
        let yaw = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let frame: HumanFrame = [
            ("pelvis", BodyPose::at(Vector3::new(0.0, 0.0, 1.0))),
            ("right_foot", BodyPose::new(Vector3::new(0.0, -0.1, 0.0), yaw)),
        ]
        .into_iter()
        .collect();

        let roll = UnitQuaternion::from_euler_angles(FRAC_PI_2, 0.0, 0.0);
        let correspondence = entry("r_foot", "right_foot", *roll.quaternion());
        let target = resolve(&correspondence, &scaled(&frame)).unwrap();

        assert_relative_eq!(target.position, Vector3::new(0.0, -0.1, 0.05), epsilon = 1e-12);
        // offset is applied in the body frame, after the human orientation
        assert_relative_eq!(target.rotation, yaw * roll, epsilon = 1e-12);
        assert_eq!(target.position_weight, 100.0);
        assert_eq!(target.rotation_weight, 40.0);
    }

    #[test]
    fn missing_body_is_omitted() {
        let frame: HumanFrame = [("pelvis", BodyPose::at(Vector3::new(0.0, 0.0, 1.0)))]
            .into_iter()
            .collect();
        let identity = Quaternion::identity();
        let table: MatchTable = [
            entry("torso", "pelvis", identity),
            entry("r_foot", "right_foot", identity),
        ]
        .into_iter()
        .collect();

        let targets = resolve_table(TableId::Primary, &table, &scaled(&frame));

        assert!(targets.targets.contains_key("torso"));
        assert!(!targets.targets.contains_key("r_foot"));
        assert_eq!(
            targets.missing,
            vec![MissingBodyWarning {
                table: TableId::Primary,
                robot_body: "r_foot".to_string(),
                human_body: "right_foot".to_string(),
            }]
        );
    }
}

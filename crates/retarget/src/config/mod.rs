//! The IK match configuration: which human body each robot body tracks, how strongly, and how
//! human proportions map onto the robot.
//!
//! Configurations are loaded once, never mutated during a run, and replaced wholesale when
//! switching to a different configuration. Everything that would make a configuration unusable is
//! rejected by [`RetargetConfig::load`], so a loaded value is always safe to hand to a
//! [`RetargetSession`](crate::session::RetargetSession).

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs,
    path::Path,
};

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::{Error, KeyPath, Result};

mod validate;
mod wire;

pub use validate::{PLAUSIBLE_SCALE, Warning, check_model_coverage};

/// Maximum deviation from unit norm accepted for an authored rotation offset.
pub const QUATERNION_TOLERANCE: f64 = 1e-3;

/// Upper bound for position and rotation weights.
pub const MAX_WEIGHT: f64 = 100.0;

/// Identifies one of the two IK match tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// `ik_match_table1`, the stability oriented table.
    Primary,
    /// `ik_match_table2`, the fine-tuning table.
    Secondary,
}

impl TableId {
    /// The key of this table in the configuration document.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            TableId::Primary => "ik_match_table1",
            TableId::Secondary => "ik_match_table2",
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single robot body to human body mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyCorrespondence {
    pub robot_body: String,
    pub human_body: String,
    pub position_weight: f64,
    pub rotation_weight: f64,
    /// Offset in meters, added to the human body position.
    pub position_offset: Vector3<f64>,
    /// Rotation offset exactly as authored, right-multiplied onto the human orientation.
    pub rotation_offset: Quaternion<f64>,
}

impl BodyCorrespondence {
    /// The rotation offset as a unit quaternion.
    #[must_use]
    pub fn unit_rotation_offset(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(self.rotation_offset)
    }

    /// An entry with both weights at zero contributes nothing to the IK objective.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.position_weight > 0.0 || self.rotation_weight > 0.0
    }
}

/// One IK match table, keyed and ordered by robot body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchTable {
    entries: BTreeMap<String, BodyCorrespondence>,
}

impl MatchTable {
    #[must_use]
    pub fn get(&self, robot_body: &str) -> Option<&BodyCorrespondence> {
        self.entries.get(robot_body)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BodyCorrespondence> {
        self.entries.values()
    }

    pub fn robot_bodies(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<BodyCorrespondence> for MatchTable {
    fn from_iter<I: IntoIterator<Item = BodyCorrespondence>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|entry| (entry.robot_body.clone(), entry))
                .collect(),
        }
    }
}

/// Per human body scale factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleTable {
    factors: BTreeMap<String, f64>,
}

impl ScaleTable {
    #[must_use]
    pub fn get(&self, human_body: &str) -> Option<f64> {
        self.factors.get(human_body).copied()
    }

    /// Look up a scale factor that must exist.
    ///
    /// Missing factors are never defaulted, a missing entry is a configuration error.
    pub fn require(&self, human_body: &str) -> Result<f64> {
        self.get(human_body).ok_or_else(|| {
            Error::config(
                &KeyPath::root().field("human_scale_table").field(human_body),
                "missing scale factor",
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.factors.iter().map(|(body, factor)| (body.as_str(), *factor))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ScaleTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            factors: iter
                .into_iter()
                .map(|(body, factor)| (body.into(), factor))
                .collect(),
        }
    }
}

/// A complete retargeting configuration for one robot and one human body model.
#[derive(Debug, Clone, PartialEq)]
pub struct RetargetConfig {
    pub robot_root_name: String,
    pub human_root_name: String,
    /// Height of the ground plane in the human frame, in meters.
    pub ground_height: f64,
    /// Human height the scale table was authored for, in meters.
    pub human_height_assumption: f64,
    pub use_table1: bool,
    pub use_table2: bool,
    pub scale_table: ScaleTable,
    pub table1: MatchTable,
    pub table2: Option<MatchTable>,
}

impl RetargetConfig {
    /// Load and check a configuration document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(Error::io(path))?;

        let config = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            table1 = config.table1.len(),
            table2 = config.table2.as_ref().map_or(0, MatchTable::len),
            "loaded retarget config"
        );
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(contents)?;
        wire::parse_config(&document)
    }

    /// Serialize to the configuration document layout, indented like the authored files.
    pub fn to_json_string(&self) -> Result<String> {
        wire::write_config(self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut contents = self.to_json_string()?;
        contents.push('\n');
        fs::write(path, contents).map_err(Error::io(path))
    }

    /// The tables that take part in retargeting, in priority order.
    ///
    /// A disabled table is never returned, even when the document contains its entries.
    pub fn enabled_tables(&self) -> impl Iterator<Item = (TableId, &MatchTable)> {
        let table1 = self
            .use_table1
            .then_some((TableId::Primary, &self.table1));
        let table2 = self
            .table2
            .as_ref()
            .filter(|_| self.use_table2)
            .map(|table| (TableId::Secondary, table));

        table1.into_iter().chain(table2)
    }

    /// Look up a table by id, regardless of whether it is enabled.
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&MatchTable> {
        match id {
            TableId::Primary => Some(&self.table1),
            TableId::Secondary => self.table2.as_ref(),
        }
    }

    /// Every human body the enabled tables track, plus the human root.
    #[must_use]
    pub fn tracked_human_bodies(&self) -> BTreeSet<&str> {
        self.enabled_tables()
            .flat_map(|(_, table)| table.iter().map(|entry| entry.human_body.as_str()))
            .chain(std::iter::once(self.human_root_name.as_str()))
            .collect()
    }

    /// Every robot body named by an enabled table.
    #[must_use]
    pub fn tracked_robot_bodies(&self) -> BTreeSet<&str> {
        self.enabled_tables()
            .flat_map(|(_, table)| table.robot_bodies())
            .collect()
    }

    /// Non-fatal findings about this configuration.
    #[must_use]
    pub fn validate(&self) -> Vec<Warning> {
        validate::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DASH_CONFIG: &str = include_str!("../../../../config/dash/smplx_to_dash.json");

    fn minimal(table2_enabled: bool) -> String {
        format!(
            r#"{{
                "robot_root_name": "torso",
                "human_root_name": "pelvis",
                "ground_height": 0.0,
                "human_height_assumption": 1.8,
                "use_ik_match_table1": true,
                "use_ik_match_table2": {table2_enabled},
                "human_scale_table": {{"pelvis": 0.55, "right_foot": 0.55}},
                "ik_match_table1": {{
                    "torso": ["pelvis", 100, 20, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]],
                    "r_foot": ["right_foot", 100, 40, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]
                }},
                "ik_match_table2": {{
                    "r_foot": ["right_foot", 100, 30, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]
                }}
            }}"#
        )
    }

    #[test]
    fn load_dash_config() {
        let config = RetargetConfig::from_json_str(DASH_CONFIG).unwrap();

        assert_eq!(config.robot_root_name, "torso");
        assert_eq!(config.human_root_name, "pelvis");
        assert_eq!(config.table1.len(), 13);
        assert_eq!(config.table2.as_ref().map(MatchTable::len), Some(13));

        let foot = config.table1.get("r_foot").unwrap();
        assert_eq!(foot.human_body, "right_foot");
        assert_eq!(foot.position_weight, 100.0);
        assert_eq!(foot.rotation_weight, 30.0);
        assert_eq!(foot.rotation_offset, Quaternion::new(0.5, -0.5, -0.5, -0.5));
    }

    #[test]
    fn dash_config_is_within_bounds() {
        let config = RetargetConfig::from_json_str(DASH_CONFIG).unwrap();

        for (_, table) in config.enabled_tables() {
            for entry in table.iter() {
                assert!((entry.rotation_offset.norm() - 1.0).abs() <= QUATERNION_TOLERANCE);
                assert!((0.0..=MAX_WEIGHT).contains(&entry.position_weight));
                assert!((0.0..=MAX_WEIGHT).contains(&entry.rotation_weight));
            }
        }
    }

    #[test]
    fn save_and_load_is_idempotent() {
        let config = RetargetConfig::from_json_str(DASH_CONFIG).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.json");
        config.save(&path).unwrap();

        let reloaded = RetargetConfig::load(&path).unwrap();
        assert_eq!(config, reloaded);
        assert_eq!(
            config.to_json_string().unwrap(),
            reloaded.to_json_string().unwrap()
        );
    }

    #[test]
    fn disabled_secondary_table_is_not_enabled() {
        let config = RetargetConfig::from_json_str(&minimal(false)).unwrap();

        assert!(config.table2.is_some());
        let tables: Vec<_> = config.enabled_tables().map(|(id, _)| id).collect();
        assert_eq!(tables, vec![TableId::Primary]);
    }

    #[test]
    fn tracked_bodies_include_root() {
        let config = RetargetConfig::from_json_str(&minimal(true)).unwrap();

        let human: Vec<_> = config.tracked_human_bodies().into_iter().collect();
        assert_eq!(human, vec!["pelvis", "right_foot"]);

        let robot: Vec<_> = config.tracked_robot_bodies().into_iter().collect();
        assert_eq!(robot, vec!["r_foot", "torso"]);
    }

    #[test]
    fn scale_table_require() {
        let table: ScaleTable = [("pelvis", 0.55)].into_iter().collect();

        assert_eq!(table.require("pelvis").unwrap(), 0.55);
        let error = table.require("head").unwrap_err();
        assert_eq!(
            error.key_path().map(KeyPath::as_str),
            Some("human_scale_table.head")
        );
    }
}

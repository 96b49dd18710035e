use std::{collections::BTreeSet, fmt};

use super::{RetargetConfig, TableId};
use crate::{BodyClass, Error, KeyPath, Result};

/// Scale factors outside this range are implausible for humanoid proportions.
pub const PLAUSIBLE_SCALE: std::ops::RangeInclusive<f64> = 0.2..=1.2;

/// A finding that does not prevent retargeting, but likely degrades it.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A scale factor outside [`PLAUSIBLE_SCALE`].
    ImplausibleScale { human_body: String, scale: f64 },
    /// Both weights of an entry are zero, so the robot body is effectively untracked.
    UntrackedEntry { table: TableId, robot_body: String },
    /// A foot or torso entry in the primary table without any position weight.
    UnanchoredCriticalBody { robot_body: String },
    /// `use_ik_match_table2` is set, but the document has no secondary table.
    MissingSecondaryTable,
    /// The document contains a secondary table that is never consulted.
    SecondaryTableDisabled { entries: usize },
    /// Neither table is enabled, every frame will resolve to an empty target set.
    NoTableEnabled,
    /// A table entry names a body the robot model does not have.
    UnknownRobotBody { table: TableId, robot_body: String },
}

impl Warning {
    /// The JSON key path this warning points at, if it has one.
    #[must_use]
    pub fn key_path(&self) -> Option<KeyPath> {
        let root = KeyPath::root();
        match self {
            Warning::ImplausibleScale { human_body, .. } => {
                Some(root.field("human_scale_table").field(human_body))
            }
            Warning::UntrackedEntry { table, robot_body }
            | Warning::UnknownRobotBody { table, robot_body } => {
                Some(root.field(table.key()).field(robot_body))
            }
            Warning::UnanchoredCriticalBody { robot_body } => Some(
                root.field(TableId::Primary.key())
                    .field(robot_body)
                    .index(1),
            ),
            Warning::MissingSecondaryTable => Some(root.field("use_ik_match_table2")),
            Warning::SecondaryTableDisabled { .. } => Some(root.field(TableId::Secondary.key())),
            Warning::NoTableEnabled => None,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ImplausibleScale { human_body, scale } => write!(
                f,
                "scale factor {scale} for `{human_body}` is outside [{}, {}]",
                PLAUSIBLE_SCALE.start(),
                PLAUSIBLE_SCALE.end()
            ),
            Warning::UntrackedEntry { table, robot_body } => write!(
                f,
                "`{robot_body}` has zero position and rotation weight in {table}"
            ),
            Warning::UnanchoredCriticalBody { robot_body } => write!(
                f,
                "`{robot_body}` carries balance but has no position weight in {}",
                TableId::Primary
            ),
            Warning::MissingSecondaryTable => {
                write!(f, "{} is enabled but not present", TableId::Secondary)
            }
            Warning::SecondaryTableDisabled { entries } => write!(
                f,
                "{} has {entries} entries but is disabled",
                TableId::Secondary
            ),
            Warning::NoTableEnabled => write!(f, "no IK match table is enabled"),
            Warning::UnknownRobotBody { table, robot_body } => write!(
                f,
                "`{robot_body}` in {table} does not exist in the robot model"
            ),
        }
    }
}

pub(super) fn validate(config: &RetargetConfig) -> Vec<Warning> {
    let mut warnings = Vec::new();

    warnings.extend(
        config
            .scale_table
            .iter()
            .filter(|(_, scale)| !PLAUSIBLE_SCALE.contains(scale))
            .map(|(human_body, scale)| Warning::ImplausibleScale {
                human_body: human_body.to_string(),
                scale,
            }),
    );

    match (&config.table2, config.use_table2) {
        (None, true) => warnings.push(Warning::MissingSecondaryTable),
        (Some(table), false) if !table.is_empty() => {
            warnings.push(Warning::SecondaryTableDisabled {
                entries: table.len(),
            });
        }
        _ => {}
    }

    if config.enabled_tables().next().is_none() {
        warnings.push(Warning::NoTableEnabled);
    }

    for (id, table) in config.enabled_tables() {
        warnings.extend(
            table
                .iter()
                .filter(|entry| !entry.is_tracked())
                .map(|entry| Warning::UntrackedEntry {
                    table: id,
                    robot_body: entry.robot_body.clone(),
                }),
        );
    }

    if config.use_table1 {
        warnings.extend(
            config
                .table1
                .iter()
                .filter(|entry| {
                    entry.is_tracked()
                        && entry.position_weight == 0.0
                        && BodyClass::classify(&entry.robot_body).is_stability_critical()
                })
                .map(|entry| Warning::UnanchoredCriticalBody {
                    robot_body: entry.robot_body.clone(),
                }),
        );
    }

    for warning in &warnings {
        tracing::debug!(key_path = ?warning.key_path(), "{warning}");
    }

    warnings
}

/// Check a configuration against the bodies of the robot model it will drive.
///
/// Every model body must be covered by the primary table when that table is enabled; entries that
/// name bodies the model lacks only produce warnings, since their targets are dropped.
pub fn check_model_coverage<'a>(
    config: &RetargetConfig,
    robot_bodies: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Warning>> {
    let robot_bodies: BTreeSet<&str> = robot_bodies.into_iter().collect();

    if config.use_table1 {
        if let Some(uncovered) = robot_bodies
            .iter()
            .find(|body| config.table1.get(body).is_none())
        {
            return Err(Error::config(
                &KeyPath::root().field(TableId::Primary.key()),
                format!("robot body `{uncovered}` has no entry"),
            ));
        }
    }

    Ok(config
        .enabled_tables()
        .flat_map(|(id, table)| {
            table
                .robot_bodies()
                .filter(|body| !robot_bodies.contains(body))
                .map(move |body| Warning::UnknownRobotBody {
                    table: id,
                    robot_body: body.to_string(),
                })
        })
        .collect())
}

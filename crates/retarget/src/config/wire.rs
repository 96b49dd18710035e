//! The on-disk layout of a configuration document.
//!
//! Match table entries are positional arrays in the document,
//! `[human_body, pos_weight, rot_weight, [x, y, z], [w, x, y, z]]`. They are converted into
//! [`BodyCorrespondence`] here and nowhere else.

use std::collections::BTreeMap;

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, ser::PrettyFormatter};

use super::{
    BodyCorrespondence, MAX_WEIGHT, MatchTable, QUATERNION_TOLERANCE, RetargetConfig, ScaleTable,
};
use crate::{Error, KeyPath, Result};

#[derive(Serialize, Deserialize)]
struct WireEntry(String, f64, f64, [f64; 3], [f64; 4]);

#[derive(Serialize)]
struct WireConfig<'a> {
    robot_root_name: &'a str,
    human_root_name: &'a str,
    ground_height: f64,
    human_height_assumption: f64,
    use_ik_match_table1: bool,
    use_ik_match_table2: bool,
    human_scale_table: BTreeMap<&'a str, f64>,
    ik_match_table1: BTreeMap<&'a str, WireEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ik_match_table2: Option<BTreeMap<&'a str, WireEntry>>,
}

pub(super) fn parse_config(document: &Value) -> Result<RetargetConfig> {
    let root = KeyPath::root();
    let object = document
        .as_object()
        .ok_or_else(|| Error::config(&root, "expected a JSON object"))?;

    let robot_root_name: String = required(object, &root, "robot_root_name")?;
    let human_root_name: String = required(object, &root, "human_root_name")?;
    for (key, name) in [
        ("robot_root_name", &robot_root_name),
        ("human_root_name", &human_root_name),
    ] {
        if name.trim().is_empty() {
            return Err(Error::config(&root.field(key), "root name must not be empty"));
        }
    }

    let ground_height: f64 = required(object, &root, "ground_height")?;
    if !ground_height.is_finite() {
        return Err(Error::config(
            &root.field("ground_height"),
            "ground height must be finite",
        ));
    }

    let human_height_assumption: f64 = required(object, &root, "human_height_assumption")?;
    if !(human_height_assumption.is_finite() && human_height_assumption > 0.0) {
        return Err(Error::config(
            &root.field("human_height_assumption"),
            format!("human height must be positive, got {human_height_assumption}"),
        ));
    }

    let scale_table = parse_scale_table(
        &required(object, &root, "human_scale_table")?,
        &root.field("human_scale_table"),
    )?;

    let table1 = parse_table(
        &required(object, &root, "ik_match_table1")?,
        &root.field("ik_match_table1"),
    )?;
    let table2 = optional::<BTreeMap<String, Value>>(object, &root, "ik_match_table2")?
        .map(|entries| parse_table(&entries, &root.field("ik_match_table2")))
        .transpose()?;

    let use_table1 = optional(object, &root, "use_ik_match_table1")?.unwrap_or(true);
    let use_table2 =
        optional(object, &root, "use_ik_match_table2")?.unwrap_or(table2.is_some());

    if use_table1 && table1.is_empty() {
        return Err(Error::config(
            &root.field("ik_match_table1"),
            "table is enabled but has no entries",
        ));
    }

    // Both tables are checked, a disabled table may be enabled by the next edit of the file.
    let tables = [
        Some(("ik_match_table1", &table1)),
        table2.as_ref().map(|table| ("ik_match_table2", table)),
    ];
    for (key, table) in tables.into_iter().flatten() {
        for entry in table.iter() {
            if scale_table.get(&entry.human_body).is_none() {
                return Err(Error::config(
                    &root.field(key).field(&entry.robot_body).index(0),
                    format!(
                        "human body `{}` has no entry in `human_scale_table`",
                        entry.human_body
                    ),
                ));
            }
        }
    }
    if scale_table.get(&human_root_name).is_none() {
        return Err(Error::config(
            &root.field("human_root_name"),
            format!("human root `{human_root_name}` has no entry in `human_scale_table`"),
        ));
    }

    Ok(RetargetConfig {
        robot_root_name,
        human_root_name,
        ground_height,
        human_height_assumption,
        use_table1,
        use_table2,
        scale_table,
        table1,
        table2,
    })
}

pub(super) fn write_config(config: &RetargetConfig) -> Result<String> {
    let wire = WireConfig {
        robot_root_name: &config.robot_root_name,
        human_root_name: &config.human_root_name,
        ground_height: config.ground_height,
        human_height_assumption: config.human_height_assumption,
        use_ik_match_table1: config.use_table1,
        use_ik_match_table2: config.use_table2,
        human_scale_table: config.scale_table.iter().collect(),
        ik_match_table1: write_table(&config.table1),
        ik_match_table2: config.table2.as_ref().map(write_table),
    };

    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    wire.serialize(&mut serializer)?;

    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn write_table(table: &MatchTable) -> BTreeMap<&str, WireEntry> {
    table
        .iter()
        .map(|entry| {
            let offset = entry.position_offset;
            let rotation = entry.rotation_offset;
            (
                entry.robot_body.as_str(),
                WireEntry(
                    entry.human_body.clone(),
                    entry.position_weight,
                    entry.rotation_weight,
                    [offset.x, offset.y, offset.z],
                    [rotation.w, rotation.i, rotation.j, rotation.k],
                ),
            )
        })
        .collect()
}

fn parse_scale_table(factors: &BTreeMap<String, f64>, path: &KeyPath) -> Result<ScaleTable> {
    // implausible but finite factors are reported by `validate`
    for (body, factor) in factors {
        if !factor.is_finite() {
            return Err(Error::config(
                &path.field(body),
                format!("scale factor must be finite, got {factor}"),
            ));
        }
    }

    Ok(factors
        .iter()
        .map(|(body, factor)| (body.clone(), *factor))
        .collect())
}

fn parse_table(entries: &BTreeMap<String, Value>, path: &KeyPath) -> Result<MatchTable> {
    entries
        .iter()
        .map(|(robot_body, value)| parse_entry(robot_body, value, &path.field(robot_body)))
        .collect()
}

fn parse_entry(robot_body: &str, value: &Value, path: &KeyPath) -> Result<BodyCorrespondence> {
    let WireEntry(human_body, position_weight, rotation_weight, position_offset, rotation_offset) =
        WireEntry::deserialize(value).map_err(|error| Error::config(path, error.to_string()))?;

    if human_body.trim().is_empty() {
        return Err(Error::config(&path.index(0), "human body must not be empty"));
    }
    check_weight(position_weight, &path.index(1))?;
    check_weight(rotation_weight, &path.index(2))?;

    if position_offset.iter().any(|value| !value.is_finite()) {
        return Err(Error::config(
            &path.index(3),
            "position offset must be finite",
        ));
    }

    Ok(BodyCorrespondence {
        robot_body: robot_body.to_string(),
        human_body,
        position_weight,
        rotation_weight,
        position_offset: Vector3::from(position_offset),
        rotation_offset: checked_rotation(rotation_offset, &path.index(4))?,
    })
}

fn check_weight(weight: f64, path: &KeyPath) -> Result<()> {
    if (0.0..=MAX_WEIGHT).contains(&weight) {
        Ok(())
    } else {
        Err(Error::config(
            path,
            format!("weight must be within [0, {MAX_WEIGHT}], got {weight}"),
        ))
    }
}

/// Check that a `[w, x, y, z]` rotation offset is a unit quaternion.
fn checked_rotation(wxyz: [f64; 4], path: &KeyPath) -> Result<Quaternion<f64>> {
    let [w, x, y, z] = wxyz;
    let quaternion = Quaternion::new(w, x, y, z);
    let norm = quaternion.norm();

    if !norm.is_finite() || norm <= f64::EPSILON {
        return Err(Error::OrientationDegenerate {
            key_path: path.clone(),
            quaternion: wxyz,
        });
    }

    if (norm - 1.0).abs() > QUATERNION_TOLERANCE {
        return Err(Error::config(
            path,
            format!("rotation offset has norm {norm:.5}, expected 1 ± {QUATERNION_TOLERANCE}"),
        ));
    }

    Ok(quaternion)
}

fn required<T: DeserializeOwned>(
    object: &Map<String, Value>,
    path: &KeyPath,
    key: &str,
) -> Result<T> {
    optional(object, path, key)?
        .ok_or_else(|| Error::config(&path.field(key), "missing required field"))
}

fn optional<T: DeserializeOwned>(
    object: &Map<String, Value>,
    path: &KeyPath,
    key: &str,
) -> Result<Option<T>> {
    object
        .get(key)
        .map(|value| {
            T::deserialize(value).map_err(|error| Error::config(&path.field(key), error.to_string()))
        })
        .transpose()
}

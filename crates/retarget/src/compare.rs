//! Differences between two retargeting configurations.

use itertools::{EitherOrBoth, Itertools};

use crate::config::{BodyCorrespondence, MatchTable, RetargetConfig, ScaleTable, TableId};

fn delta(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(b? - a?)
}

/// A top level field with different values, rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub a: String,
    pub b: String,
}

/// Scale factors of one human body in both configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleDiff {
    pub human_body: String,
    pub a: Option<f64>,
    pub b: Option<f64>,
}

impl ScaleDiff {
    /// `b - a`, if both configurations scale this body.
    #[must_use]
    pub fn delta(&self) -> Option<f64> {
        delta(self.a, self.b)
    }

    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.a != self.b
    }
}

/// The entries of one robot body in both configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDiff {
    pub robot_body: String,
    pub a: Option<BodyCorrespondence>,
    pub b: Option<BodyCorrespondence>,
}

impl EntryDiff {
    #[must_use]
    pub fn position_weight_delta(&self) -> Option<f64> {
        delta(
            self.a.as_ref().map(|entry| entry.position_weight),
            self.b.as_ref().map(|entry| entry.position_weight),
        )
    }

    #[must_use]
    pub fn rotation_weight_delta(&self) -> Option<f64> {
        delta(
            self.a.as_ref().map(|entry| entry.rotation_weight),
            self.b.as_ref().map(|entry| entry.rotation_weight),
        )
    }

    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.a != self.b
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDiff {
    pub table: TableId,
    pub entries: Vec<EntryDiff>,
}

impl TableDiff {
    fn between(table: TableId, a: Option<&MatchTable>, b: Option<&MatchTable>) -> Self {
        let a = a.into_iter().flat_map(MatchTable::iter);
        let b = b.into_iter().flat_map(MatchTable::iter);

        let entries = a
            .merge_join_by(b, |a, b| a.robot_body.cmp(&b.robot_body))
            .map(|pair| {
                let (a, b) = pair
                    .map_any(BodyCorrespondence::clone, BodyCorrespondence::clone)
                    .left_and_right();
                let robot_body = a
                    .as_ref()
                    .or(b.as_ref())
                    .map(|entry| entry.robot_body.clone())
                    .unwrap_or_default();
                EntryDiff { robot_body, a, b }
            })
            .collect();

        Self { table, entries }
    }

    pub fn changed(&self) -> impl Iterator<Item = &EntryDiff> {
        self.entries.iter().filter(|entry| entry.is_changed())
    }
}

/// Everything that differs between configuration `a` and configuration `b`.
///
/// Scale and table rows cover the union of both configurations, so bodies present in only one of
/// them show up with the other side empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDiff {
    pub fields: Vec<FieldChange>,
    pub scale: Vec<ScaleDiff>,
    pub tables: Vec<TableDiff>,
}

impl ConfigDiff {
    #[must_use]
    pub fn between(a: &RetargetConfig, b: &RetargetConfig, include_table2: bool) -> Self {
        let mut tables = vec![TableDiff::between(
            TableId::Primary,
            Some(&a.table1),
            Some(&b.table1),
        )];
        if include_table2 {
            tables.push(TableDiff::between(
                TableId::Secondary,
                a.table2.as_ref(),
                b.table2.as_ref(),
            ));
        }

        Self {
            fields: field_changes(a, b),
            scale: scale_diff(&a.scale_table, &b.scale_table),
            tables,
        }
    }

    /// Whether both configurations are equivalent in every compared part.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && !self.scale.iter().any(ScaleDiff::is_changed)
            && self.tables.iter().all(|table| table.changed().next().is_none())
    }
}

fn scale_diff(a: &ScaleTable, b: &ScaleTable) -> Vec<ScaleDiff> {
    a.iter()
        .merge_join_by(b.iter(), |(a, _), (b, _)| a.cmp(b))
        .map(|pair| match pair {
            EitherOrBoth::Both((body, a), (_, b)) => (body, Some(a), Some(b)),
            EitherOrBoth::Left((body, a)) => (body, Some(a), None),
            EitherOrBoth::Right((body, b)) => (body, None, Some(b)),
        })
        .map(|(body, a, b)| ScaleDiff {
            human_body: body.to_string(),
            a,
            b,
        })
        .collect()
}

fn field_changes(a: &RetargetConfig, b: &RetargetConfig) -> Vec<FieldChange> {
    let fields = [
        ("robot_root_name", a.robot_root_name.clone(), b.robot_root_name.clone()),
        ("human_root_name", a.human_root_name.clone(), b.human_root_name.clone()),
        ("ground_height", a.ground_height.to_string(), b.ground_height.to_string()),
        (
            "human_height_assumption",
            a.human_height_assumption.to_string(),
            b.human_height_assumption.to_string(),
        ),
        ("use_ik_match_table1", a.use_table1.to_string(), b.use_table1.to_string()),
        ("use_ik_match_table2", a.use_table2.to_string(), b.use_table2.to_string()),
    ];

    fields
        .into_iter()
        .filter(|(_, a, b)| a != b)
        .map(|(field, a, b)| FieldChange { field, a, b })
        .collect()
}

//! Combination of the primary and secondary table targets of a robot body.
//!
//! Each table's weights are authoritative for that table's contribution. The blended target keeps
//! both contributions so an IK solver can apply its own cost function, and additionally exposes a
//! single combined objective:
//!
//! - the effective weights are the sums of the contributing weights,
//! - the effective position is the weight averaged position, which is the exact minimizer of the
//!   sum of both weighted squared distance terms,
//! - the effective rotation interpolates between both rotations by their rotation weights.

use nalgebra::{UnitQuaternion, Vector3};

use crate::{config::TableId, resolve::ResolvedTarget};

/// A single table's share of a blended target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub table: TableId,
    pub target: ResolvedTarget,
}

/// The combined objective of all enabled tables for one robot body.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendedTarget {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub position_weight: f64,
    pub rotation_weight: f64,
    /// Per table targets, in table order.
    pub contributions: Vec<Contribution>,
}

impl BlendedTarget {
    #[must_use]
    pub fn contribution(&self, table: TableId) -> Option<&ResolvedTarget> {
        self.contributions
            .iter()
            .find(|contribution| contribution.table == table)
            .map(|contribution| &contribution.target)
    }
}

impl From<Contribution> for BlendedTarget {
    fn from(contribution: Contribution) -> Self {
        let target = contribution.target;
        Self {
            position: target.position,
            rotation: target.rotation,
            position_weight: target.position_weight,
            rotation_weight: target.rotation_weight,
            contributions: vec![contribution],
        }
    }
}

/// Blend the primary and secondary target of one robot body.
///
/// Returns `None` only when neither table produced a target.
#[must_use]
pub fn blend(
    primary: Option<ResolvedTarget>,
    secondary: Option<ResolvedTarget>,
) -> Option<BlendedTarget> {
    let primary = primary.map(|target| Contribution {
        table: TableId::Primary,
        target,
    });
    let secondary = secondary.map(|target| Contribution {
        table: TableId::Secondary,
        target,
    });

    match (primary, secondary) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.into()),
        (Some(primary), Some(secondary)) => Some(blend_both(primary, secondary)),
    }
}

fn blend_both(primary: Contribution, secondary: Contribution) -> BlendedTarget {
    let (first, second) = (primary.target, secondary.target);

    let position_weight = first.position_weight + second.position_weight;
    let position = if position_weight > 0.0 {
        (first.position * first.position_weight + second.position * second.position_weight)
            / position_weight
    } else {
        first.position
    };

    let rotation_weight = first.rotation_weight + second.rotation_weight;
    let rotation = if rotation_weight > 0.0 {
        let t = second.rotation_weight / rotation_weight;
        first
            .rotation
            .try_slerp(&second.rotation, t, f64::EPSILON)
            .unwrap_or(if t > 0.5 { second.rotation } else { first.rotation })
    } else {
        first.rotation
    };

    BlendedTarget {
        position,
        rotation,
        position_weight,
        rotation_weight,
        contributions: vec![primary, secondary],
    }
}

//! Coarse grouping of human and robot bodies by their role in the skeleton.

use std::fmt;

/// The part of the skeleton a body belongs to, derived from its name.
///
/// Feet and torso carry the robot's balance, so configs usually give them the dominant position
/// weight in the primary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyClass {
    Foot,
    Torso,
    Leg,
    Arm,
    Head,
    Other,
}

impl BodyClass {
    // Checked in order, the first match wins: `left_foot` is a foot before it is a leg.
    const PATTERNS: [(BodyClass, &'static [&'static str]); 5] = [
        (BodyClass::Foot, &["foot", "ankle", "toe"]),
        (BodyClass::Torso, &["torso", "pelvis", "spine", "waist", "hips", "chest"]),
        (BodyClass::Leg, &["hip", "knee", "leg", "thigh", "shin"]),
        (BodyClass::Arm, &["shoulder", "elbow", "wrist", "arm", "hand"]),
        (BodyClass::Head, &["head", "neck"]),
    ];

    /// Classify a body by name, case-insensitively.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        let name = name.to_lowercase();

        Self::PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|pattern| name.contains(pattern)))
            .map_or(BodyClass::Other, |(class, _)| *class)
    }

    /// Whether losing track of this body is likely to make the robot fall.
    #[must_use]
    pub fn is_stability_critical(self) -> bool {
        matches!(self, BodyClass::Foot | BodyClass::Torso)
    }
}

impl fmt::Display for BodyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodyClass::Foot => "foot",
            BodyClass::Torso => "torso",
            BodyClass::Leg => "leg",
            BodyClass::Arm => "arm",
            BodyClass::Head => "head",
            BodyClass::Other => "other",
        };
        f.write_str(name)
    }
}

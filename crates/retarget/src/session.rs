//! A retargeting run: one immutable configuration applied frame by frame.

use std::{collections::BTreeMap, fmt};

use crate::{
    Result,
    blend::{BlendedTarget, blend},
    config::{RetargetConfig, TableId},
    frame::{HumanFrame, MotionClip},
    resolve::{MissingBodyWarning, TableTargets, resolve_table},
    scale::ScaleNormalizer,
};

/// The weighted target set of one frame, ready for the IK solver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetFrame {
    /// Blended targets keyed by robot body.
    pub targets: BTreeMap<String, BlendedTarget>,
    /// Entries dropped because their human body was missing from the frame.
    pub missing: Vec<MissingBodyWarning>,
    /// The frame did not contain the human root, so no target could be resolved.
    pub root_missing: bool,
}

/// Counts of everything that was dropped during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OmissionReport {
    pub frames: usize,
    pub frames_without_root: usize,
    pub omissions: BTreeMap<MissingBodyWarning, usize>,
}

impl OmissionReport {
    fn record(&mut self, frame: &TargetFrame) {
        self.frames += 1;
        if frame.root_missing {
            self.frames_without_root += 1;
        }
        for missing in &frame.missing {
            *self.omissions.entry(missing.clone()).or_default() += 1;
        }
    }

    /// Number of dropped targets over all frames.
    #[must_use]
    pub fn total_omissions(&self) -> usize {
        self.omissions.values().sum()
    }

    /// Whether every frame resolved every target.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.frames_without_root == 0 && self.omissions.is_empty()
    }
}

impl fmt::Display for OmissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} frames, {} without human root, {} dropped targets",
            self.frames,
            self.frames_without_root,
            self.total_omissions()
        )?;
        for (missing, count) in &self.omissions {
            writeln!(
                f,
                "  {:<18} <- {:<16} {:>6} frames ({})",
                missing.robot_body, missing.human_body, count, missing.table
            )?;
        }
        Ok(())
    }
}

/// Applies a [`RetargetConfig`] to a sequence of human frames.
///
/// The session borrows its configuration immutably, so any number of sessions can share one
/// configuration, and a configuration can never change underneath a running session.
#[derive(Debug)]
pub struct RetargetSession<'a> {
    config: &'a RetargetConfig,
    normalizer: ScaleNormalizer<'a>,
    report: OmissionReport,
}

impl<'a> RetargetSession<'a> {
    /// Start a session for a subject of the given height.
    ///
    /// Without a subject height the configuration's human height assumption is used. Fails if the
    /// configuration cannot scale every body it tracks.
    pub fn new(config: &'a RetargetConfig, actual_subject_height: Option<f64>) -> Result<Self> {
        let normalizer = ScaleNormalizer::for_config(config, actual_subject_height)?;
        tracing::debug!(ratio = normalizer.ratio(), "started retarget session");

        Ok(Self {
            config,
            normalizer,
            report: OmissionReport::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RetargetConfig {
        self.config
    }

    /// Resolve and blend the targets of a single frame.
    ///
    /// Missing bodies never abort processing, they are dropped from this frame and counted.
    pub fn process(&mut self, frame: &HumanFrame) -> TargetFrame {
        let target_frame = self.resolve_frame(frame);
        self.report.record(&target_frame);
        target_frame
    }

    /// Process every frame of a clip, in order.
    pub fn process_clip(&mut self, clip: &MotionClip) -> Vec<TargetFrame> {
        clip.frames.iter().map(|frame| self.process(frame)).collect()
    }

    #[must_use]
    pub fn report(&self) -> &OmissionReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> OmissionReport {
        self.report
    }

    fn resolve_frame(&self, frame: &HumanFrame) -> TargetFrame {
        let Some(scaled) = self.normalizer.normalize(frame) else {
            tracing::debug!(
                root = %self.config.human_root_name,
                "frame has no human root, dropping all targets"
            );
            return TargetFrame {
                root_missing: true,
                ..TargetFrame::default()
            };
        };

        let mut primary: Option<TableTargets> = None;
        let mut secondary: Option<TableTargets> = None;
        for (id, table) in self.config.enabled_tables() {
            let resolved = resolve_table(id, table, &scaled);
            match id {
                TableId::Primary => primary = Some(resolved),
                TableId::Secondary => secondary = Some(resolved),
            }
        }

        let missing: Vec<_> = primary
            .iter()
            .chain(&secondary)
            .flat_map(|resolved| resolved.missing.iter().cloned())
            .collect();
        for warning in &missing {
            tracing::debug!("{warning}");
        }

        let targets = self
            .config
            .tracked_robot_bodies()
            .into_iter()
            .filter_map(|robot_body| {
                let first = primary.as_mut().and_then(|targets| targets.take(robot_body));
                let second = secondary.as_mut().and_then(|targets| targets.take(robot_body));
                blend(first, second).map(|blended| (robot_body.to_string(), blended))
            })
            .collect();

        TargetFrame {
            targets,
            missing,
            root_missing: false,
        }
    }
}

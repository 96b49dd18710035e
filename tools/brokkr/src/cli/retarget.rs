use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use colored::Colorize;
use miette::Result;
use retarget::{
    RetargetConfig, RetargetSession, frame::MotionClip, output::TargetDocument,
    session::OmissionReport,
};

use crate::{error::Error, settings::BrokkrSettings};

/// A body synthesized from the position of one body and the orientation of another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedBody {
    pub name: String,
    pub position_from: String,
    pub orientation_from: String,
}

impl FromStr for DerivedBody {
    type Err = Error;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::DerivedBody(value.to_string());

        let (name, sources) = value.split_once('=').ok_or_else(invalid)?;
        let (position_from, orientation_from) = sources.split_once(':').ok_or_else(invalid)?;
        if [name, position_from, orientation_from]
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return Err(invalid());
        }

        Ok(Self {
            name: name.trim().to_string(),
            position_from: position_from.trim().to_string(),
            orientation_from: orientation_from.trim().to_string(),
        })
    }
}

/// Options shared by every command that retargets motion.
#[derive(Clone, Debug, Default, Parser)]
pub struct ConfigOptsRetarget {
    /// The retargeting configuration [default: `retarget.config` in `brokkr.toml`]
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Height of the recorded subject in meters [default: from the motion file, then `brokkr.toml`]
    #[clap(long)]
    pub subject_height: Option<f64>,

    /// Add a body built from the position of one body and the orientation of another, e.g.
    /// `LeftFootMod=LeftFoot:LeftToe`
    #[clap(long = "derive-body")]
    pub derived_bodies: Vec<DerivedBody>,

    /// Print the dropped target summary [default: `report.summary` in `brokkr.toml`]
    #[clap(long)]
    pub summary: bool,
}

impl ConfigOptsRetarget {
    pub fn config_path(&self, settings: &BrokkrSettings) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| settings.retarget.config.clone())
    }

    pub fn summary(&self, settings: &BrokkrSettings) -> bool {
        self.summary || settings.report.summary
    }

    /// The per file retargeting parameters, with settings applied.
    pub fn job(&self, settings: &BrokkrSettings) -> RetargetJob {
        RetargetJob {
            subject_height: self.subject_height,
            fallback_subject_height: settings.retarget.subject_height,
            derived_bodies: self.derived_bodies.clone(),
        }
    }
}

/// How a single motion file is retargeted.
#[derive(Clone, Debug, Default)]
pub struct RetargetJob {
    /// Overrides the height stored in the motion file.
    pub subject_height: Option<f64>,
    /// Used when the motion file stores no height.
    pub fallback_subject_height: Option<f64>,
    pub derived_bodies: Vec<DerivedBody>,
}

/// The result of retargeting one motion file.
#[derive(Clone, Debug)]
pub struct Retargeted {
    pub frames: usize,
    pub report: OmissionReport,
}

impl RetargetJob {
    pub fn load_motion(&self, motion: &Path) -> retarget::Result<MotionClip> {
        let clip = MotionClip::load(motion)?;

        Ok(self.derived_bodies.iter().fold(clip, |clip, derived| {
            clip.with_derived_body(
                &derived.name,
                &derived.position_from,
                &derived.orientation_from,
            )
        }))
    }

    /// Retarget an already loaded clip and write its targets to `output`.
    pub fn run(
        &self,
        config: &RetargetConfig,
        motion: &Path,
        clip: &MotionClip,
        output: &Path,
    ) -> retarget::Result<Retargeted> {
        let subject_height = self
            .subject_height
            .or(clip.human_height)
            .or(self.fallback_subject_height);

        let mut session = RetargetSession::new(config, subject_height)?;
        let frames = session.process_clip(clip);

        TargetDocument::new(&config.robot_root_name, clip.fps, &frames)
            .with_source(motion.display().to_string())
            .save(output)?;

        tracing::info!(
            motion = %motion.display(),
            output = %output.display(),
            frames = frames.len(),
            "retargeted motion"
        );

        Ok(Retargeted {
            frames: frames.len(),
            report: session.into_report(),
        })
    }
}

/// Retarget a single motion file.
#[derive(Parser, Debug)]
#[clap(name = "retarget")]
pub struct Retarget {
    #[clap(flatten)]
    pub retarget: ConfigOptsRetarget,

    /// The motion file to retarget
    #[clap(short, long)]
    pub motion: PathBuf,

    /// Where to write the targets
    #[clap(short, long)]
    pub save_path: PathBuf,
}

impl Retarget {
    pub fn retarget(self, settings: &BrokkrSettings) -> Result<()> {
        let config = RetargetConfig::load(self.retarget.config_path(settings))?;
        let job = self.retarget.job(settings);

        let clip = job.load_motion(&self.motion)?;
        let retargeted = job.run(&config, &self.motion, &clip, &self.save_path)?;

        println!(
            "{} {} -> {} {}",
            "  Retargeted".green().bold(),
            self.motion.display(),
            self.save_path.display(),
            format!(
                "({} frames, {} dropped targets)",
                retargeted.frames,
                retargeted.report.total_omissions()
            )
            .dimmed()
        );

        if self.retarget.summary(settings) {
            print!("{}", retargeted.report);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const CONFIG: &str = include_str!("../../../../config/dash/smplx_to_dash.json");

    #[test]
    fn parse_derived_body() {
        let derived: DerivedBody = "LeftFootMod=LeftFoot:LeftToe".parse().unwrap();
        assert_eq!(
            derived,
            DerivedBody {
                name: "LeftFootMod".to_string(),
                position_from: "LeftFoot".to_string(),
                orientation_from: "LeftToe".to_string(),
            }
        );

        assert!("LeftFootMod=LeftFoot".parse::<DerivedBody>().is_err());
        assert!("=LeftFoot:LeftToe".parse::<DerivedBody>().is_err());
    }

    #[test]
    fn retarget_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let motion = dir.path().join("idle.json");
        let output = dir.path().join("idle_targets.json");
        fs::write(
            &motion,
            r#"{"fps": 30.0, "frames": [
                {"pelvis": [[0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 0.0]]},
                {"pelvis": [[0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 0.0]]}
            ]}"#,
        )
        .unwrap();

        let config = RetargetConfig::from_json_str(CONFIG).unwrap();
        let job = RetargetJob::default();
        let clip = job.load_motion(&motion).unwrap();
        let retargeted = job.run(&config, &motion, &clip, &output).unwrap();

        assert_eq!(retargeted.frames, 2);
        // 12 of 13 bodies in both tables, in both frames
        assert_eq!(retargeted.report.total_omissions(), 48);

        let document = TargetDocument::load(&output).unwrap();
        assert!(document.is_complete_for(2));
        assert_eq!(document.frames[0].targets.len(), 1);
        assert_eq!(document.frames[0].omitted.len(), 12);
    }
}

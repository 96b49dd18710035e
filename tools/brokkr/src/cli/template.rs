use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use miette::Result;
use retarget::{
    model::RobotModel,
    template::{ConfigTemplate, DEFAULT_HUMAN_HEIGHT, DEFAULT_ROBOT_HEIGHT},
};

use crate::error::Error;

/// Generate a starting point configuration for the DASH humanoid.
#[derive(Parser, Debug)]
#[clap(name = "template")]
pub struct Template {
    /// Standing height of the robot in meters [default: estimated from `--robot-model`, or 1.0]
    #[clap(long)]
    pub robot_height: Option<f64>,

    /// MJCF robot model, only bodies it contains are mapped
    #[clap(long)]
    pub robot_model: Option<PathBuf>,

    /// Height of the reference human in meters
    #[clap(long, default_value_t = DEFAULT_HUMAN_HEIGHT)]
    pub human_height: f64,

    /// Where to write the configuration
    #[clap(short, long)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[clap(long)]
    pub force: bool,
}

impl Template {
    pub fn template(self) -> Result<()> {
        if self.output.exists() && !self.force {
            return Err(Error::OutputExists { path: self.output }.into());
        }

        let model = self.robot_model.as_ref().map(RobotModel::load).transpose()?;
        let estimated = model.as_ref().and_then(RobotModel::estimate_height);
        if model.is_some() && estimated.is_none() && self.robot_height.is_none() {
            tracing::warn!("could not estimate the robot height, using {DEFAULT_ROBOT_HEIGHT} m");
        }
        let robot_height = self
            .robot_height
            .or(estimated)
            .unwrap_or(DEFAULT_ROBOT_HEIGHT);

        let mut template = ConfigTemplate::dash()
            .with_robot_height(robot_height)
            .with_human_height(self.human_height);
        if let Some(model) = &model {
            template = template.restricted_to(model.body_names());
        }
        let config = template.build()?;
        config.save(&self.output)?;

        println!(
            "{} {} {}",
            "   Generated".green().bold(),
            self.output.display(),
            format!(
                "(base scale: {:.2}, entries: {})",
                template.base_scale(),
                config.table1.len()
            )
            .dimmed()
        );

        for warning in config.validate() {
            println!("{} {warning}", "     warning".yellow().bold());
        }

        Ok(())
    }
}

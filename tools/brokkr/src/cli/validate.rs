use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use miette::Result;
use retarget::{
    RetargetConfig,
    config::{MatchTable, Warning, check_model_coverage},
    model::RobotModel,
};

use crate::settings::BrokkrSettings;

/// Load a retargeting configuration and report everything that is wrong with it.
#[derive(Parser, Debug)]
#[clap(name = "validate")]
pub struct Validate {
    /// The configuration to check [default: `retarget.config` in `brokkr.toml`]
    pub config: Option<PathBuf>,

    /// Comma separated body names of the robot model, checked against the enabled tables
    #[clap(long, value_delimiter = ',')]
    pub robot_bodies: Vec<String>,

    /// MJCF robot model whose bodies are checked against the enabled tables
    #[clap(long)]
    pub robot_model: Option<PathBuf>,
}

impl Validate {
    pub fn validate(self, settings: &BrokkrSettings) -> Result<()> {
        let path = self.config.unwrap_or_else(|| settings.retarget.config.clone());
        let config = RetargetConfig::load(&path)?;

        let mut robot_bodies = self.robot_bodies;
        if let Some(path) = &self.robot_model {
            let model = RobotModel::load(path)?;
            robot_bodies.extend(model.body_names().map(str::to_string));
        }

        let mut warnings = config.validate();
        if !robot_bodies.is_empty() {
            let bodies = robot_bodies.iter().map(String::as_str);
            warnings.extend(check_model_coverage(&config, bodies)?);
        }

        println!(
            "{} {} {}",
            "   Validated".green().bold(),
            path.display(),
            format!(
                "(scale: {}, table1: {}, table2: {})",
                config.scale_table.len(),
                config.table1.len(),
                config.table2.as_ref().map_or(0, MatchTable::len),
            )
            .dimmed()
        );

        for warning in &warnings {
            print_warning(warning);
        }

        if warnings.is_empty() {
            println!("{}", "    No warnings".green());
        } else {
            println!(
                "{} {} warnings",
                "    Finished".yellow().bold(),
                warnings.len()
            );
        }

        Ok(())
    }
}

fn print_warning(warning: &Warning) {
    let location = warning
        .key_path()
        .map(|path| format!(" ({path})"))
        .unwrap_or_default();

    println!(
        "{} {}{}",
        "     warning".yellow().bold(),
        warning,
        location.dimmed()
    );
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const CONFIG: &str = include_str!("../../../../config/dash/smplx_to_dash.json");

    fn validate_against(model: &str) -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("dash.json");
        fs::write(&config, CONFIG).unwrap();
        let robot_model = dir.path().join("dash.xml");
        fs::write(&robot_model, model).unwrap();

        Validate {
            config: Some(config),
            robot_bodies: vec!["l_foot".to_string()],
            robot_model: Some(robot_model),
        }
        .validate(&BrokkrSettings::default())
    }

    #[test]
    fn model_bodies_must_be_covered() {
        let covered = r#"<mujoco><worldbody>
            <body name="torso" pos="0 0 1"><body name="r_foot" pos="0 0 -0.9"/></body>
        </worldbody></mujoco>"#;
        validate_against(covered).unwrap();

        let uncovered = r#"<mujoco><worldbody>
            <body name="torso" pos="0 0 1"><body name="tail" pos="0 -0.2 0"/></body>
        </worldbody></mujoco>"#;
        let error = validate_against(uncovered).unwrap_err();
        assert!(error.to_string().contains("`tail` has no entry"), "{error}");

        assert!(validate_against("<robot/>").is_err());
    }
}

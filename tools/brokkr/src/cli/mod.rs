use clap::{ArgAction, Parser};

pub mod analyze;
pub mod batch;
pub mod compare;
pub mod retarget;
pub mod template;
pub mod validate;

/// `brokkr` - The retargeting tool for the DASH humanoid
///
/// `brokkr` checks and edits the IK match configurations that map human motion onto the robot,
/// and applies them to motion files to produce the weighted targets consumed by the IK solver.
///
/// # Checking a Configuration
/// ```sh
/// brokkr validate config/dash/smplx_to_dash.json
/// ```
/// Against the bodies of a robot model:
/// ```sh
/// brokkr validate config/dash/smplx_to_dash.json --robot-model dash.xml
/// ```
///
/// # Retargeting Motion
/// A single motion file:
/// ```sh
/// brokkr retarget --motion walk.json --save-path walk_targets.json
/// ```
/// A whole directory, four files at a time:
/// ```sh
/// brokkr batch motions/ --workers 4 --resume
/// ```
///
/// # Robot Settings
/// Defaults are read from `config/brokkr.toml`. Use `--robot <name>` to apply the overlay in
/// `config/overlay/<name>/brokkr.toml`.
///
/// # Additional Options
/// For more advanced options use `brokkr --help`.
#[derive(Parser)]
#[clap(name = "brokkr", version)]
pub struct Cli {
    /// Increase log output, once for progress information, twice for every dropped target
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Robot whose settings overlay is applied [default: none]
    #[clap(long, global = true)]
    pub robot: Option<String>,

    #[clap(subcommand)]
    pub action: Commands,
}

/// All possible commands for the cli, used for clap derive macros.
#[derive(Parser)]
pub enum Commands {
    Validate(validate::Validate),
    Compare(compare::Compare),
    Template(template::Template),
    Analyze(analyze::Analyze),
    Retarget(retarget::Retarget),
    Batch(batch::Batch),
}

//! Retargeting of human motion onto the DASH humanoid.
//!
//! A [`RetargetConfig`] describes which human body every robot body tracks, with what weight and
//! offset, and how human proportions map onto the robot. A [`RetargetSession`] applies such a
//! configuration to human motion frames:
//!
//! 1. the [`ScaleNormalizer`] rescales the frame to robot proportions,
//! 2. every enabled match table is [resolved](resolve::resolve_table) into per robot body targets,
//! 3. the targets of both tables are [blended](blend::blend) into a single weighted target set,
//!    which is what an IK solver consumes.
//!
//! ```no_run
//! use retarget::prelude::*;
//!
//! let config = RetargetConfig::load("config/dash/smplx_to_dash.json")?;
//! let clip = MotionClip::load("walk.json")?;
//!
//! let mut session = RetargetSession::new(&config, clip.human_height)?;
//! let frames = session.process_clip(&clip);
//! TargetDocument::new(&config.robot_root_name, clip.fps, &frames).save("walk_targets.json")?;
//! # Ok::<(), retarget::Error>(())
//! ```

pub mod analysis;
pub mod blend;
pub mod body;
pub mod compare;
pub mod config;
pub mod error;
pub mod frame;
pub mod model;
pub mod output;
pub mod resolve;
pub mod scale;
pub mod session;
pub mod template;

pub use body::BodyClass;
pub use config::RetargetConfig;
pub use error::{Error, KeyPath, Result};
pub use scale::ScaleNormalizer;
pub use session::RetargetSession;

/// Most commonly used types.
pub mod prelude {
    pub use crate::{
        BodyClass, Error, KeyPath, Result, RetargetConfig, RetargetSession, ScaleNormalizer,
        blend::BlendedTarget,
        config::{BodyCorrespondence, MatchTable, ScaleTable, TableId, Warning},
        frame::{BodyPose, HumanFrame, MotionClip},
        model::RobotModel,
        output::TargetDocument,
        resolve::{MissingBodyWarning, ResolvedTarget},
        session::{OmissionReport, TargetFrame},
    };
}

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use miette::Result;
use retarget::{RetargetConfig, analysis::MotionRanges, frame::MotionClip};

/// Show how far every body moves in a motion file.
#[derive(Parser, Debug)]
#[clap(name = "analyze")]
pub struct Analyze {
    /// The motion file to analyze
    pub motion: PathBuf,

    /// Also report the bodies this configuration tracks that never appear in the motion
    #[clap(long)]
    pub config: Option<PathBuf>,
}

impl Analyze {
    pub fn analyze(self) -> Result<()> {
        let clip = MotionClip::load(&self.motion)?;
        let ranges = MotionRanges::from_clip(&clip);

        println!(
            "{} {} {}",
            "    Analyzed".green().bold(),
            self.motion.display(),
            format!(
                "({} frames at {} fps, {:.2}s)",
                ranges.frames, clip.fps, ranges.duration
            )
            .dimmed()
        );

        println!(
            "\n{:<20}{:>26}{:>26}{:>26}{:>10}",
            "Body".bold(),
            "Min".bold(),
            "Max".bold(),
            "Range".bold(),
            "|Range|".bold()
        );
        for (body, range) in ranges.by_magnitude() {
            let [min, max, extent] = [range.min, range.max, range.range()]
                .map(|v| format!("[{:+.3}, {:+.3}, {:+.3}]", v.x, v.y, v.z));
            println!(
                "{body:<20}{min:>26}{max:>26}{extent:>26}{:>10.3}",
                range.magnitude()
            );
        }

        if let Some(path) = self.config {
            let config = RetargetConfig::load(&path)?;
            let present = clip.body_names();
            let absent: Vec<_> = config
                .tracked_human_bodies()
                .into_iter()
                .filter(|body| !present.contains(body))
                .collect();

            if absent.is_empty() {
                println!("\n{}", "Every tracked body is present".green());
            } else {
                println!(
                    "\n{} {} tracked bodies never appear: {}",
                    "     warning".yellow().bold(),
                    absent.len(),
                    absent.join(", ")
                );
            }
        }

        Ok(())
    }
}

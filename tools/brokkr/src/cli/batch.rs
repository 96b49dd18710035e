use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use colored::Colorize;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use retarget::{RetargetConfig, output::TargetDocument};
use tokio::{sync::Semaphore, task::JoinSet};
use walkdir::WalkDir;

use super::retarget::{ConfigOptsRetarget, RetargetJob, Retargeted};
use crate::{error::Error, settings::BrokkrSettings};

/// Retarget many motion files in parallel.
///
/// Interrupting a batch with Ctrl-C lets the files that are being processed finish, and skips the
/// rest. Run the same command with `--resume` to continue where it stopped.
#[derive(Parser, Debug)]
#[clap(name = "batch")]
pub struct Batch {
    #[clap(flatten)]
    pub retarget: ConfigOptsRetarget,

    /// Motion files, directories containing motion files, or glob patterns
    #[clap(required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    /// Directory for the target files [default: `batch.output_dir` in `brokkr.toml`]
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of files processed at the same time [default: `batch.workers` in `brokkr.toml`]
    #[clap(short, long)]
    pub workers: Option<usize>,

    /// Skip files whose targets already exist and are complete
    #[clap(long)]
    pub resume: bool,
}

/// What happened to a single motion file.
#[derive(Debug)]
enum Outcome {
    Retargeted(Retargeted),
    /// Complete targets already existed.
    Skipped,
    /// The batch was interrupted before the file was started.
    Cancelled,
}

impl Batch {
    pub async fn batch(self, settings: BrokkrSettings) -> Result<()> {
        let config = RetargetConfig::load(self.retarget.config_path(&settings))?;
        for warning in config.validate() {
            tracing::warn!("{warning}");
        }

        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| settings.batch.output_dir.clone());
        let motions = plan_outputs(
            collect_inputs(&self.inputs)?,
            &output_dir,
            &settings.batch.suffix,
        )?;

        let output_dirs: BTreeSet<_> = motions
            .iter()
            .filter_map(|(_, output)| output.parent())
            .chain(std::iter::once(output_dir.as_path()))
            .collect();
        for dir in output_dirs {
            fs::create_dir_all(dir).map_err(|source| Error::OutputDir {
                source,
                path: dir.to_path_buf(),
            })?;
        }

        let workers = self.workers.unwrap_or(settings.batch.workers).max(1);
        let job = Arc::new(self.retarget.job(&settings));
        let semaphore = Arc::new(Semaphore::new(workers));
        let cancelled = Arc::new(AtomicBool::new(false));

        let progress = ProgressBar::new(motions.len() as u64).with_style(
            ProgressStyle::with_template(
                "{prefix:.blue.bold} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
            )
            .into_diagnostic()?
            .progress_chars("=> "),
        );
        progress.set_prefix("Retargeting");
        progress.enable_steady_tick(Duration::from_millis(80));

        let mut join_set = JoinSet::new();
        for (motion, output) in motions.iter().cloned() {
            let config = config.clone();
            let job = job.clone();
            let semaphore = semaphore.clone();
            let cancelled = cancelled.clone();
            let resume = self.resume;

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (motion, Ok(Ok(Outcome::Cancelled)));
                };
                if cancelled.load(Ordering::Relaxed) {
                    return (motion, Ok(Ok(Outcome::Cancelled)));
                }

                let task_motion = motion.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    process_file(&config, &job, &task_motion, &output, resume)
                })
                .await;

                (motion, outcome)
            });
        }

        let mut summary = BatchSummary::default();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    let (motion, outcome) = joined.into_diagnostic()?;
                    summary.record(&progress, &motion, outcome.into_diagnostic()?);
                    progress.inc(1);
                }
                _ = &mut ctrl_c, if !cancelled.load(Ordering::Relaxed) => {
                    cancelled.store(true, Ordering::Relaxed);
                    semaphore.close();
                    progress.println(format!(
                        "{} waiting for running files to finish",
                        " Interrupted".yellow().bold()
                    ));
                }
            }
        }

        progress.finish_and_clear();
        summary.print(progress.elapsed(), self.retarget.summary(&settings));

        if summary.failed > 0 {
            return Err(Error::BatchFailed {
                failed: summary.failed,
                total: motions.len(),
            }
            .into());
        }

        Ok(())
    }
}

/// Retarget one file, or skip it when resuming and its targets are complete.
fn process_file(
    config: &RetargetConfig,
    job: &RetargetJob,
    motion: &Path,
    output: &Path,
    resume: bool,
) -> retarget::Result<Outcome> {
    let clip = job.load_motion(motion)?;

    if resume && output.exists() {
        match TargetDocument::load(output) {
            Ok(document) if document.is_complete_for(clip.frames.len()) => {
                return Ok(Outcome::Skipped);
            }
            Ok(_) => tracing::info!(output = %output.display(), "incomplete targets, retargeting"),
            Err(error) => {
                tracing::info!(output = %output.display(), %error, "invalid targets, retargeting");
            }
        }
    }

    job.run(config, motion, &clip, output)
        .map(Outcome::Retargeted)
}

#[derive(Debug, Default)]
struct BatchSummary {
    retargeted: Vec<(PathBuf, Retargeted)>,
    skipped: usize,
    cancelled: usize,
    failed: usize,
}

impl BatchSummary {
    fn record(
        &mut self,
        progress: &ProgressBar,
        motion: &Path,
        outcome: retarget::Result<Outcome>,
    ) {
        progress.set_message(motion.display().to_string());

        match outcome {
            Ok(Outcome::Retargeted(retargeted)) => {
                progress.println(format!(
                    "{} {} {}",
                    "  Retargeted".green().bold(),
                    motion.display(),
                    format!("({} frames)", retargeted.frames).dimmed()
                ));
                self.retargeted.push((motion.to_path_buf(), retargeted));
            }
            Ok(Outcome::Skipped) => {
                progress.println(format!("{} {}", "     Skipped".cyan().bold(), motion.display()));
                self.skipped += 1;
            }
            Ok(Outcome::Cancelled) => self.cancelled += 1,
            Err(error) => {
                progress.println(format!(
                    "{} {}: {error}",
                    "      Failed".red().bold(),
                    motion.display()
                ));
                self.failed += 1;
            }
        }
    }

    fn print(&self, elapsed: Duration, omissions: bool) {
        if omissions {
            for (motion, retargeted) in &self.retargeted {
                if !retargeted.report.is_clean() {
                    println!("{}", motion.display().to_string().bold());
                    print!("{}", retargeted.report);
                }
            }
        }

        println!(
            "{} in {} {}",
            "    Finished".cyan().bold(),
            HumanDuration(elapsed),
            format!(
                "(retargeted: {}, skipped: {}, failed: {}, cancelled: {})",
                self.retargeted.len(),
                self.skipped,
                self.failed,
                self.cancelled
            )
            .dimmed()
        );

        if self.cancelled > 0 {
            println!(
                "{}",
                "Rerun the same command with `--resume` to process the remaining files".yellow()
            );
        }
    }
}

/// A motion file, and its path relative to the input it was found through.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MotionInput {
    path: PathBuf,
    relative: PathBuf,
}

/// Expand files, directories and glob patterns into a sorted list of motion files.
///
/// Files found by walking a directory keep their path below that directory, so the target files
/// mirror the layout of the inputs.
fn collect_inputs(inputs: &[String]) -> crate::error::Result<Vec<MotionInput>> {
    let mut motions = BTreeMap::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry?;
                if entry.file_type().is_file() && is_json(entry.path()) {
                    let relative = entry
                        .path()
                        .strip_prefix(path)
                        .map_or_else(|_| file_name(entry.path()), Path::to_path_buf);
                    motions.entry(entry.into_path()).or_insert(relative);
                }
            }
        } else if path.is_file() {
            motions
                .entry(path.to_path_buf())
                .or_insert_with(|| file_name(path));
        } else {
            let paths = glob::glob(input).map_err(|source| Error::Pattern {
                source,
                pattern: input.clone(),
            })?;
            // unreadable entries are skipped
            for path in paths.flatten().filter(|path| path.is_file()) {
                let relative = file_name(&path);
                motions.entry(path).or_insert(relative);
            }
        }
    }

    if motions.is_empty() {
        return Err(Error::NoInputs {
            inputs: inputs.to_vec(),
        });
    }

    Ok(motions
        .into_iter()
        .map(|(path, relative)| MotionInput { path, relative })
        .collect())
}

/// Pair every motion file with its target file, rejecting inputs that would share one.
fn plan_outputs(
    motions: Vec<MotionInput>,
    output_dir: &Path,
    suffix: &str,
) -> crate::error::Result<Vec<(PathBuf, PathBuf)>> {
    let mut claimed: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    let mut planned = Vec::with_capacity(motions.len());

    for motion in motions {
        let output = output_path(output_dir, &motion.relative, suffix);
        if let Some(first) = claimed.get(&output) {
            return Err(Error::DuplicateOutput {
                output,
                first: first.clone(),
                second: motion.path,
            });
        }

        claimed.insert(output.clone(), motion.path.clone());
        planned.push((motion.path, output));
    }

    Ok(planned)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "json")
}

fn file_name(path: &Path) -> PathBuf {
    path.file_name().map_or_else(PathBuf::new, PathBuf::from)
}

fn output_path(output_dir: &Path, relative: &Path, suffix: &str) -> PathBuf {
    let stem = relative
        .file_stem()
        .map_or_else(|| "motion".into(), |stem| stem.to_string_lossy());
    let dir = relative
        .parent()
        .map_or_else(|| output_dir.to_path_buf(), |parent| output_dir.join(parent));
    dir.join(format!("{stem}{suffix}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = include_str!("../../../../config/dash/smplx_to_dash.json");
    const MOTION: &str = r#"{"fps": 30.0, "frames": [
        {"pelvis": [[0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 0.0]]},
        {"pelvis": [[0.0, 0.1, 1.0], [1.0, 0.0, 0.0, 0.0]]},
        {"pelvis": [[0.0, 0.2, 1.0], [1.0, 0.0, 0.0, 0.0]]}
    ]}"#;

    fn paths(motions: &[MotionInput]) -> Vec<&Path> {
        motions.iter().map(|motion| motion.path.as_path()).collect()
    }

    #[test]
    fn inputs_from_files_directories_and_globs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("walks/slow");
        fs::create_dir_all(&nested).unwrap();
        for path in [
            dir.path().join("jump.json"),
            dir.path().join("notes.txt"),
            nested.join("walk_01.json"),
            nested.join("walk_02.json"),
        ] {
            fs::write(path, MOTION).unwrap();
        }

        let walks = collect_inputs(&[dir.path().join("walks").display().to_string()]).unwrap();
        assert_eq!(
            paths(&walks),
            vec![nested.join("walk_01.json"), nested.join("walk_02.json")]
        );
        assert_eq!(walks[0].relative, PathBuf::from("slow/walk_01.json"));

        let pattern = dir.path().join("*.json").display().to_string();
        let file = nested.join("walk_01.json").display().to_string();
        let mixed = collect_inputs(&[pattern, file]).unwrap();
        assert_eq!(
            paths(&mixed),
            vec![dir.path().join("jump.json"), nested.join("walk_01.json")]
        );
        assert_eq!(mixed[1].relative, PathBuf::from("walk_01.json"));

        let missing = dir.path().join("*.bvh").display().to_string();
        assert!(matches!(
            collect_inputs(&[missing]),
            Err(Error::NoInputs { .. })
        ));
    }

    #[test]
    fn target_file_names() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("walk_01.json"), "_targets"),
            PathBuf::from("out/walk_01_targets.json")
        );
        assert_eq!(
            output_path(Path::new("out"), Path::new("slow/walk_01.json"), "_targets"),
            PathBuf::from("out/slow/walk_01_targets.json")
        );
    }

    #[test]
    fn inputs_sharing_a_target_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for speed in ["slow", "fast"] {
            fs::create_dir_all(dir.path().join(speed)).unwrap();
            fs::write(dir.path().join(speed).join("walk.json"), MOTION).unwrap();
        }

        let inputs = ["slow", "fast"].map(|speed| dir.path().join(speed).display().to_string());
        let motions = collect_inputs(&inputs).unwrap();
        let error = plan_outputs(motions, Path::new("targets"), "_targets").unwrap_err();

        let Error::DuplicateOutput { output, .. } = error else {
            panic!("expected a duplicate output, got {error:?}");
        };
        assert_eq!(output, PathBuf::from("targets/walk_targets.json"));
    }

    #[test]
    fn resume_revalidates_existing_targets() {
        let dir = tempfile::tempdir().unwrap();
        let motion = dir.path().join("walk.json");
        let output = dir.path().join("walk_targets.json");
        fs::write(&motion, MOTION).unwrap();

        let config = RetargetConfig::from_json_str(CONFIG).unwrap();
        let job = RetargetJob::default();

        // a truncated file from an interrupted run is processed again
        fs::write(&output, r#"{"fps": 30.0, "frames": ["#).unwrap();
        let outcome = process_file(&config, &job, &motion, &output, true).unwrap();
        assert!(matches!(outcome, Outcome::Retargeted(ref done) if done.frames == 3));

        let outcome = process_file(&config, &job, &motion, &output, true).unwrap();
        assert!(matches!(outcome, Outcome::Skipped));

        // targets for a different number of frames are stale
        let mut document = TargetDocument::load(&output).unwrap();
        document.frames.pop();
        document.frame_count = 2;
        document.save(&output).unwrap();
        let outcome = process_file(&config, &job, &motion, &output, true).unwrap();
        assert!(matches!(outcome, Outcome::Retargeted(_)));

        // without resume existing targets are always replaced
        let outcome = process_file(&config, &job, &motion, &output, false).unwrap();
        assert!(matches!(outcome, Outcome::Retargeted(_)));
    }

    #[tokio::test]
    async fn batch_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dash.json");
        fs::write(&config_path, CONFIG).unwrap();

        let motions = dir.path().join("motions");
        fs::create_dir_all(&motions).unwrap();
        for name in ["a.json", "b.json", "c.json"] {
            fs::write(motions.join(name), MOTION).unwrap();
        }

        let output_dir = dir.path().join("targets");
        let batch = Batch {
            retarget: ConfigOptsRetarget {
                config: Some(config_path),
                ..ConfigOptsRetarget::default()
            },
            inputs: vec![motions.display().to_string()],
            output_dir: Some(output_dir.clone()),
            workers: Some(2),
            resume: false,
        };
        batch.batch(BrokkrSettings::default()).await.unwrap();

        for name in ["a_targets.json", "b_targets.json", "c_targets.json"] {
            let document = TargetDocument::load(output_dir.join(name)).unwrap();
            assert!(document.is_complete_for(3));
        }
    }

    #[tokio::test]
    async fn same_file_name_in_different_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dash.json");
        fs::write(&config_path, CONFIG).unwrap();

        let motions = dir.path().join("motions");
        for speed in ["slow", "fast"] {
            fs::create_dir_all(motions.join(speed)).unwrap();
            fs::write(motions.join(speed).join("walk.json"), MOTION).unwrap();
        }

        let output_dir = dir.path().join("targets");
        let batch = Batch {
            retarget: ConfigOptsRetarget {
                config: Some(config_path),
                ..ConfigOptsRetarget::default()
            },
            inputs: vec![motions.display().to_string()],
            output_dir: Some(output_dir.clone()),
            workers: Some(2),
            resume: false,
        };
        batch.batch(BrokkrSettings::default()).await.unwrap();

        let slow = TargetDocument::load(output_dir.join("slow/walk_targets.json")).unwrap();
        assert!(slow.is_complete_for(3));
        let fast = TargetDocument::load(output_dir.join("fast/walk_targets.json")).unwrap();
        assert!(fast.is_complete_for(3));
        assert!(!output_dir.join("walk_targets.json").exists());
    }
}

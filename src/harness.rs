//! End-to-end scenario orchestration.
//!
//! One `run_scenario` call walks the full lifecycle: prepare workspace,
//! write the input container, compute ground truth, materialize the
//! output-schema and launcher artifacts, launch the controller, wait,
//! verify the output container, tear everything down. The workspace and
//! the process handle are both Drop-guarded, so every failure path (a
//! timeout, a corrupt container, a verification mismatch) still kills
//! the worker and removes every artifact.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::container;
use crate::counter::count_words;
use crate::error::{TcError, TcResult};
use crate::launcher::{self, ExitOutcome, TetherInvocation};
use crate::model::{Protocol, ScenarioReport, Schema};
use crate::verifier::verify_output;
use crate::workspace::Workspace;

/// The canonical three-line input dataset.
pub const SEED_LINES: [&str; 3] = [
    "the quick brown fox jumps over the lazy dog",
    "the cow jumps over the moon",
    "the rain in spain falls mainly on the plains",
];

pub const INPUT_CONTAINER_NAME: &str = "lines.tcf";
pub const OUTPUT_PART_NAME: &str = "part-00000.tcf";

#[must_use]
pub fn seed_lines() -> Vec<String> {
    SEED_LINES.iter().map(|line| (*line).to_owned()).collect()
}

/// How the worker launcher artifact handed to the controller is obtained.
#[derive(Debug, Clone)]
pub enum ProgramSource {
    /// An opaque, pre-built launcher executable.
    Executable(PathBuf),
    /// Script text the harness materializes world-executable at run time.
    Script(String),
}

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub controller: PathBuf,
    pub program: ProgramSource,
    pub lines: Vec<String>,
    pub protocol: Protocol,
    pub timeout: Option<Duration>,
    /// Explicit workspace root; `None` picks a unique temp path per run.
    pub base_dir: Option<PathBuf>,
    /// Leave the workspace on disk after the run (debugging aid).
    pub keep_workspace: bool,
}

impl ScenarioConfig {
    #[must_use]
    pub fn new(controller: PathBuf, program: ProgramSource) -> Self {
        Self {
            controller,
            program,
            lines: seed_lines(),
            protocol: Protocol::Http,
            timeout: None,
            base_dir: None,
            keep_workspace: false,
        }
    }
}

/// Run one tethered word-count scenario end to end.
pub fn run_scenario(config: &ScenarioConfig) -> TcResult<ScenarioReport> {
    let run_id = Uuid::new_v4().to_string();
    let started_at_rfc3339 = Utc::now().to_rfc3339();
    tracing::info!(run_id = %run_id, "starting tethered word-count scenario");

    let mut workspace = match &config.base_dir {
        Some(base) => Workspace::prepare(base)?,
        None => Workspace::unique()?,
    };
    if config.keep_workspace {
        workspace.persist();
    }

    let input_path = workspace.input_dir().join(INPUT_CONTAINER_NAME);
    let records = container::write_lines(&input_path, &config.lines)?;
    if !input_path.exists() {
        return Err(TcError::MissingArtifact(input_path));
    }
    tracing::debug!(records, path = %input_path.display(), "input container written");

    let ground_truth = count_words(&config.lines);

    let out_schema = workspace.materialize_schema(&Schema::word_count_pair())?;
    let program = match &config.program {
        ProgramSource::Executable(path) => path.clone(),
        ProgramSource::Script(text) => workspace.materialize_launcher(text)?,
    };

    let invocation = TetherInvocation {
        controller: config.controller.clone(),
        input_dir: workspace.input_dir(),
        output_dir: workspace.output_dir(),
        out_schema,
        protocol: config.protocol,
        program,
    };

    let mut handle = launcher::launch(&invocation, None)?;
    let exit_code = match handle.await_completion(config.timeout)? {
        ExitOutcome::Completed(code) => Some(code),
        ExitOutcome::TimedOut => {
            return Err(TcError::WorkerTimeout {
                command: handle.rendered().to_owned(),
                timeout_ms: config
                    .timeout
                    .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            });
        }
        ExitOutcome::AlreadyFaulted => None,
    };

    // The output directory is a hand-off zone: only read once the
    // controller has reached a terminal state.
    let output_path = workspace.output_dir().join(OUTPUT_PART_NAME);
    let verify = verify_output(&output_path, &ground_truth)?;

    let report = ScenarioReport {
        run_id,
        started_at_rfc3339,
        finished_at_rfc3339: Utc::now().to_rfc3339(),
        exit_code,
        distinct_words: ground_truth.len(),
        records_verified: verify.records_checked,
    };
    tracing::info!(
        run_id = %report.run_id,
        records = report.records_verified,
        "scenario verified"
    );
    Ok(report)
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::error::TcResult;
use crate::harness::{self, ProgramSource, ScenarioConfig};
use crate::model::Protocol;

#[derive(Debug, Parser)]
#[command(name = "tethercount")]
#[command(about = "Correctness harness for tethered word-count jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full scenario: write input, launch the controller, verify output.
    Run(RunArgs),
    /// Dump a container file's schema and records.
    Inspect(InspectArgs),
    /// Print the canonical output-schema descriptor.
    Schema,
    /// Run the reference word counter and print the tally.
    Count(CountArgs),
}

#[derive(Debug, Args)]
pub struct LinesArgs {
    /// Input line (repeatable); defaults to the canonical seed dataset.
    #[arg(long = "line")]
    pub lines: Vec<String>,

    /// Read input lines from a text file instead.
    #[arg(long, conflicts_with = "lines")]
    pub lines_file: Option<PathBuf>,
}

impl LinesArgs {
    pub fn resolve(&self) -> TcResult<Vec<String>> {
        if let Some(path) = &self.lines_file {
            let text = std::fs::read_to_string(path)?;
            return Ok(text.lines().map(str::to_owned).collect());
        }
        if self.lines.is_empty() {
            Ok(harness::seed_lines())
        } else {
            Ok(self.lines.clone())
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Job-controller executable (explicit path, or a name on PATH).
    #[arg(long)]
    pub controller: PathBuf,

    /// Worker launcher artifact handed to the controller via --program.
    #[arg(long)]
    pub program: PathBuf,

    #[command(flatten)]
    pub input: LinesArgs,

    /// Tether transport.
    #[arg(long, value_enum, default_value_t = Protocol::Http)]
    pub protocol: Protocol,

    /// Kill the controller if it runs longer than this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Pin the workspace to a fixed directory instead of a unique temp path.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Leave the workspace on disk after the run.
    #[arg(long)]
    pub keep_workspace: bool,

    /// Emit the scenario report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn to_config(&self) -> TcResult<ScenarioConfig> {
        Ok(ScenarioConfig {
            controller: self.controller.clone(),
            program: ProgramSource::Executable(self.program.clone()),
            lines: self.input.resolve()?,
            protocol: self.protocol,
            timeout: self.timeout_secs.map(Duration::from_secs),
            base_dir: self.base_dir.clone(),
            keep_workspace: self.keep_workspace,
        })
    }
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Container file to dump.
    pub container: PathBuf,

    /// Emit the schema and records as JSON lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CountArgs {
    #[command(flatten)]
    pub input: LinesArgs,
}

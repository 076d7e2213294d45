#![forbid(unsafe_code)]

pub mod cli;
pub mod container;
pub mod counter;
pub mod error;
pub mod harness;
pub mod launcher;
pub mod logging;
pub mod model;
pub mod verifier;
pub mod workspace;

pub use error::{TcError, TcResult};
pub use harness::{ProgramSource, ScenarioConfig, SEED_LINES, run_scenario};
pub use launcher::{ExitOutcome, JobHandle, TetherInvocation};
pub use model::{Protocol, Record, ScenarioReport, Schema, VerifyReport};
pub use workspace::Workspace;

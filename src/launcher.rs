//! External job-controller lifecycle.
//!
//! Builds the tether argument vector, spawns the controller, and owns the
//! resulting OS process. A `JobHandle` is a scoped resource: dropping a
//! handle whose child is still running forcibly terminates and reaps it,
//! so no exit path of the harness can leak a live worker.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{TcError, TcResult};
use crate::model::Protocol;

/// Poll interval for the completion wait loop.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Fully resolved argument set for one `tether` controller invocation.
#[derive(Debug, Clone)]
pub struct TetherInvocation {
    pub controller: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub out_schema: PathBuf,
    pub protocol: Protocol,
    pub program: PathBuf,
}

impl TetherInvocation {
    /// The deterministic controller argument vector:
    /// `tether --in <in> --out <out> --outschema <schema> --protocol <p>
    /// --program <launcher>`.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "tether".to_owned(),
            "--in".to_owned(),
            self.input_dir.display().to_string(),
            "--out".to_owned(),
            self.output_dir.display().to_string(),
            "--outschema".to_owned(),
            self.out_schema.display().to_string(),
            "--protocol".to_owned(),
            self.protocol.wire_name().to_owned(),
            "--program".to_owned(),
            self.program.display().to_string(),
        ]
    }

    /// The full command line, for logs and diagnostics.
    #[must_use]
    pub fn rendered(&self) -> String {
        format!("{} {}", self.controller.display(), self.to_args().join(" "))
    }
}

/// Terminal states of one awaited controller process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own with the given code.
    Completed(i32),
    /// The wait deadline elapsed; the process was killed and reaped.
    TimedOut,
    /// The handle's process had already been reaped by an earlier call.
    AlreadyFaulted,
}

/// Exclusive owner of the controller's OS process.
#[derive(Debug)]
pub struct JobHandle {
    child: Option<Child>,
    rendered: String,
}

impl JobHandle {
    /// The command line this handle was spawned from.
    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// OS pid while the process has not been reaped.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Block until the process reaches a terminal state.
    ///
    /// With a timeout, a process still running at the deadline is killed
    /// AND reaped before `TimedOut` is returned, so callers observe a
    /// confirmed-terminated worker, never a merely-signaled one.
    pub fn await_completion(&mut self, timeout: Option<Duration>) -> TcResult<ExitOutcome> {
        let started_at = Instant::now();
        loop {
            let Some(child) = self.child.as_mut() else {
                return Ok(ExitOutcome::AlreadyFaulted);
            };

            if let Some(status) = child.try_wait()? {
                let code = status.code().unwrap_or(-1);
                self.child = None;
                if code != 0 {
                    tracing::warn!(
                        command = %self.rendered,
                        code,
                        "controller exited nonzero"
                    );
                }
                return Ok(ExitOutcome::Completed(code));
            }

            if let Some(limit) = timeout
                && started_at.elapsed() >= limit
            {
                self.terminate();
                return Ok(ExitOutcome::TimedOut);
            }

            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Forced kill + reap. Idempotent; a handle without a live child is a
    /// no-op.
    pub fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Whether the owned process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if self.child.is_some() {
            tracing::warn!(command = %self.rendered, "terminating still-running controller");
        }
        self.terminate();
    }
}

/// Spawn the controller described by `invocation`.
///
/// The child inherits the harness's working directory (unless `cwd`
/// overrides it), environment, and stdio. Spawn failures surface
/// immediately; callers must not proceed to read output after one.
pub fn launch(invocation: &TetherInvocation, cwd: Option<&Path>) -> TcResult<JobHandle> {
    let controller = resolve_controller(&invocation.controller)?;
    let rendered = invocation.rendered();
    tracing::info!(command = %rendered, "launching tether controller");

    let mut command = Command::new(&controller);
    command.args(invocation.to_args());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let child = command
        .spawn()
        .map_err(|error| TcError::from_spawn_failure(rendered.clone(), &error))?;

    Ok(JobHandle {
        child: Some(child),
        rendered,
    })
}

/// Bare program names resolve on PATH; explicit paths must exist.
fn resolve_controller(controller: &Path) -> TcResult<PathBuf> {
    let bare_name = controller.components().count() == 1 && !controller.is_absolute();
    if bare_name {
        return which::which(controller).map_err(|_| TcError::ControllerMissing {
            command: controller.display().to_string(),
        });
    }
    if controller.exists() {
        Ok(controller.to_path_buf())
    } else {
        Err(TcError::ControllerMissing {
            command: controller.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn invocation(controller: &str) -> TetherInvocation {
        TetherInvocation {
            controller: PathBuf::from(controller),
            input_dir: PathBuf::from("/ws/input"),
            output_dir: PathBuf::from("/ws/output"),
            out_schema: PathBuf::from("/tmp/wordcount.schema.json"),
            protocol: Protocol::Http,
            program: PathBuf::from("/tmp/exec_word_count"),
        }
    }

    #[test]
    fn argument_vector_is_deterministic() {
        let args = invocation("avro-tools").to_args();
        assert_eq!(
            args,
            vec![
                "tether",
                "--in",
                "/ws/input",
                "--out",
                "/ws/output",
                "--outschema",
                "/tmp/wordcount.schema.json",
                "--protocol",
                "http",
                "--program",
                "/tmp/exec_word_count",
            ]
        );
    }

    #[test]
    fn rendered_includes_controller_and_args() {
        let rendered = invocation("avro-tools").rendered();
        assert!(rendered.starts_with("avro-tools tether --in"));
        assert!(rendered.contains("--protocol http"));
    }

    #[test]
    fn missing_controller_path_fails_before_spawn() {
        let err = launch(&invocation("/nonexistent/controller/xyz_99"), None)
            .expect_err("missing path must fail");
        assert!(matches!(err, TcError::ControllerMissing { .. }));
    }

    #[test]
    fn missing_bare_name_fails_before_spawn() {
        let err = launch(&invocation("definitely_not_a_real_binary_xyz_99"), None)
            .expect_err("missing name must fail");
        assert!(matches!(err, TcError::ControllerMissing { .. }));
    }

    #[test]
    fn bare_names_resolve_on_path() {
        // `true` ignores the tether arguments and exits 0.
        let mut handle = launch(&invocation("true"), None).expect("spawn true");
        let outcome = handle.await_completion(None).expect("wait");
        assert_eq!(outcome, ExitOutcome::Completed(0));
    }

    #[test]
    fn nonzero_exit_is_still_a_completed_outcome() {
        let mut handle = launch(&invocation("false"), None).expect("spawn false");
        let outcome = handle.await_completion(None).expect("wait");
        assert_eq!(outcome, ExitOutcome::Completed(1));
    }

    #[test]
    fn second_await_reports_already_faulted() {
        let mut handle = launch(&invocation("true"), None).expect("spawn");
        handle.await_completion(None).expect("first wait");
        let outcome = handle.await_completion(None).expect("second wait");
        assert_eq!(outcome, ExitOutcome::AlreadyFaulted);
    }

    #[cfg(unix)]
    fn process_alive(pid: u32) -> bool {
        // kill -0 probes liveness without signaling.
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// A stub controller that ignores the tether arguments and sleeps.
    #[cfg(unix)]
    fn sleeping_controller(dir: &tempfile::TempDir) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("hung_controller");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 60\n").expect("write stub");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_and_reaps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inv = invocation("unused");
        inv.controller = sleeping_controller(&dir);
        let mut handle = launch(&inv, None).expect("spawn stub");
        let pid = handle.pid().expect("running");

        let outcome = handle
            .await_completion(Some(Duration::from_millis(100)))
            .expect("wait");
        assert_eq!(outcome, ExitOutcome::TimedOut);
        assert!(!handle.is_running());
        assert!(!process_alive(pid), "pid {pid} must be reaped, not lingering");
    }

    #[cfg(unix)]
    #[test]
    fn drop_terminates_a_running_controller() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inv = invocation("unused");
        inv.controller = sleeping_controller(&dir);
        let handle = launch(&inv, None).expect("spawn stub");
        let pid = handle.pid().expect("running");
        drop(handle);
        assert!(!process_alive(pid), "drop must kill pid {pid}");
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut handle = launch(&invocation("true"), None).expect("spawn");
        handle.await_completion(None).expect("wait");
        handle.terminate();
        handle.terminate();
        assert!(!handle.is_running());
    }
}

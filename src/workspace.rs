//! Scratch workspace for one scenario run.
//!
//! A `Workspace` owns the `input/`/`output/` directory tree plus the
//! standalone transient artifacts (output-schema file, worker launcher
//! script). Teardown is best-effort per artifact, idempotent, and wired
//! into `Drop` so it runs on every exit path, including unwinding out of
//! a failed verification.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{TcError, TcResult};
use crate::model::Schema;

pub struct Workspace {
    base_dir: PathBuf,
    transient: Vec<PathBuf>,
    torn_down: bool,
    persist: bool,
}

impl Workspace {
    /// Claim `base_dir`: wipe any stale tree at that path, then create
    /// `base_dir/input`. `output/` is created lazily (the external worker
    /// may create it itself; the harness holds no exclusive rights there).
    pub fn prepare(base_dir: impl Into<PathBuf>) -> TcResult<Self> {
        let base_dir = base_dir.into();
        if base_dir.exists() {
            fs::remove_dir_all(&base_dir).map_err(|error| {
                TcError::workspace(&base_dir, format!("failed to clear stale workspace: {error}"))
            })?;
        }
        let input_dir = base_dir.join("input");
        fs::create_dir_all(&input_dir)
            .map_err(|error| TcError::workspace(&input_dir, error.to_string()))?;

        Ok(Self {
            base_dir,
            transient: Vec::new(),
            torn_down: false,
            persist: false,
        })
    }

    /// A workspace under the system temp dir with a unique per-run name,
    /// so concurrent harness invocations never collide.
    pub fn unique() -> TcResult<Self> {
        let base_dir = std::env::temp_dir().join(format!("tethercount-{}", Uuid::new_v4()));
        Self::prepare(base_dir)
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn input_dir(&self) -> PathBuf {
        self.base_dir.join("input")
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join("output")
    }

    /// Create `output/` if the worker has not already done so.
    pub fn ensure_output_dir(&self) -> TcResult<PathBuf> {
        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir)
            .map_err(|error| TcError::workspace(&output_dir, error.to_string()))?;
        Ok(output_dir)
    }

    /// Write the schema descriptor to a fresh transient file and return its
    /// path. The file is tracked and removed at teardown.
    pub fn materialize_schema(&mut self, schema: &Schema) -> TcResult<PathBuf> {
        self.materialize_transient(
            "wordcount",
            ".schema.json",
            schema.to_descriptor_string().as_bytes(),
            false,
        )
    }

    /// Write `script_text` to a fresh transient file, mark it executable for
    /// all principals, and return its path.
    pub fn materialize_launcher(&mut self, script_text: &str) -> TcResult<PathBuf> {
        self.materialize_transient("exec_word_count_", "", script_text.as_bytes(), true)
    }

    fn materialize_transient(
        &mut self,
        prefix: &str,
        suffix: &str,
        bytes: &[u8],
        executable: bool,
    ) -> TcResult<PathBuf> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()
            .map_err(|error| TcError::workspace(std::env::temp_dir(), error.to_string()))?;
        let (mut handle, path) = temp
            .keep()
            .map_err(|error| TcError::workspace(std::env::temp_dir(), error.to_string()))?;

        handle.write_all(bytes)?;
        handle.sync_all()?;
        drop(handle);

        #[cfg(unix)]
        if executable {
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .map_err(|error| TcError::workspace(&path, error.to_string()))?;
        }
        #[cfg(not(unix))]
        let _ = executable;

        self.transient.push(path.clone());
        Ok(path)
    }

    /// Leave the workspace and its transient artifacts on disk when this
    /// value is dropped (debugging aid).
    pub fn persist(&mut self) {
        self.persist = true;
    }

    /// Best-effort removal of the base directory and every transient
    /// artifact. Each failure is logged independently; none aborts the
    /// sweep. Runs at most once; further calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if self.base_dir.exists()
            && let Err(error) = fs::remove_dir_all(&self.base_dir)
        {
            tracing::warn!(
                path = %self.base_dir.display(),
                "failed to remove workspace: {error}"
            );
        }
        for path in &self.transient {
            if path.exists()
                && let Err(error) = fs::remove_file(path)
            {
                tracing::warn!(path = %path.display(), "failed to remove artifact: {error}");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.persist {
            self.teardown();
        }
    }
}

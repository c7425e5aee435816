//! Captured output and status of one fragment execution.

use std::fmt::{self, Display, Formatter, Write as _};
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Failure raised while running a fragment. Fragment-local: the session
/// stays usable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    traceback: Option<String>,
    interpreter_restarted: bool,
}

impl ExecutionFailure {
    /// Creates a failure of the given kind, e.g. `NameError`.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            traceback: None,
            interpreter_restarted: false,
        }
    }

    /// Attaches a traceback-like diagnostic.
    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Marks that the interpreter was replaced and the namespace is now empty.
    #[must_use]
    pub fn with_restart(mut self) -> Self {
        self.interpreter_restarted = true;
        self
    }

    /// Error class name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Formatted traceback, when the interpreter produced one.
    #[must_use]
    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }

    /// Whether the namespace was lost because the interpreter was restarted.
    #[must_use]
    pub const fn interpreter_restarted(&self) -> bool {
        self.interpreter_restarted
    }
}

impl Display for ExecutionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Whether the fragment completed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Fragment ran to completion.
    Success,
    /// Fragment raised or was interrupted.
    Failure(ExecutionFailure),
}

/// Everything a fragment wrote, plus how it ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapturedResult {
    stdout: String,
    stderr: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    duration: Duration,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    restarted_before_run: bool,
    #[serde(flatten)]
    status: ExecutionStatus,
}

impl CapturedResult {
    /// Result of a fragment that completed.
    #[must_use]
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
            restarted_before_run: false,
            status: ExecutionStatus::Success,
        }
    }

    /// Result of a fragment that failed after writing `stdout` and `stderr`.
    #[must_use]
    pub fn failure(
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        failure: ExecutionFailure,
    ) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
            restarted_before_run: false,
            status: ExecutionStatus::Failure(failure),
        }
    }

    /// Records the wall-clock time spent on the fragment.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Marks that the interpreter was replaced before this fragment ran, so
    /// bindings from earlier fragments were not visible to it.
    #[must_use]
    pub fn with_restart_notice(mut self) -> Self {
        self.restarted_before_run = true;
        self
    }

    /// Text written to standard output, including output produced before a failure.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Text written to standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Wall-clock duration of the fragment.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Completion status.
    #[must_use]
    pub fn status(&self) -> &ExecutionStatus {
        &self.status
    }

    /// Returns `true` when the fragment completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn failure_details(&self) -> Option<&ExecutionFailure> {
        match &self.status {
            ExecutionStatus::Success => None,
            ExecutionStatus::Failure(failure) => Some(failure),
        }
    }

    /// Whether the namespace was lost to an interpreter restart, either before
    /// this fragment ran or while it was running.
    #[must_use]
    pub fn interpreter_restarted(&self) -> bool {
        self.restarted_before_run
            || self
                .failure_details()
                .is_some_and(ExecutionFailure::interpreter_restarted)
    }

    /// Renders the result as the single text block an agent reads: captured
    /// output, followed by the error and traceback on failure.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.stdout.clone();
        if let ExecutionStatus::Failure(failure) = &self.status {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            match failure.traceback() {
                Some(traceback) => text.push_str(traceback),
                None => {
                    text.push_str("Error: ");
                    text.push_str(&failure.to_string());
                }
            }
        }
        if self.interpreter_restarted() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("[interpreter restarted; previous variables are gone]");
        }
        text
    }

    /// Caps each stream at `limit` bytes.
    pub(crate) fn truncated(mut self, limit: usize) -> Self {
        truncate_text(&mut self.stdout, limit);
        truncate_text(&mut self.stderr, limit);
        self
    }
}

fn truncate_text(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let omitted = text.len() - cut;
    text.truncate(cut);
    let _ = write!(text, "\n[output truncated: {omitted} bytes omitted]\n");
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

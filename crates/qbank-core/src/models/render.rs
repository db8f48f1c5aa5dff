use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Outcome of one render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum RenderResult {
    /// The engine produced the final artifact.
    Compiled { output_path: PathBuf },
    /// Manual flow: the source file was written and the engine was not run.
    SourceWritten { source_path: PathBuf },
    /// The engine failed. The source file is kept for manual correction.
    Failed {
        reason: FailureReason,
        diagnostics: String,
        source_path: PathBuf,
    },
}

impl RenderResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, RenderResult::Failed { .. })
    }

    /// Path of the file the user should look at next.
    pub fn path(&self) -> &PathBuf {
        match self {
            RenderResult::Compiled { output_path } => output_path,
            RenderResult::SourceWritten { source_path } => source_path,
            RenderResult::Failed { source_path, .. } => source_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum FailureReason {
    /// The engine exited unsuccessfully. `code` is absent when killed by a signal.
    ExitCode { code: Option<i32> },
    /// The engine reported success but no artifact was found.
    MissingOutput,
    TimedOut { after_secs: u64 },
    Cancelled,
    /// The engine program could not be started.
    EngineUnavailable,
}

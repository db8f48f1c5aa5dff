use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::list::ListId;
use super::question::QuestionId;
use super::render::RenderResult;

/// Everything the caller needs to present the result of one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExportReport {
    pub list_id: ListId,
    pub outcome: RenderResult,
    /// Questions actually emitted.
    pub question_count: usize,
    /// List entries that no longer resolve to a record.
    pub omitted_questions: Vec<QuestionId>,
    pub substitutions: Vec<Substitution>,
    /// Seed used for shuffling/substitution, if any was needed.
    pub seed: Option<u64>,
    pub warnings: Vec<ExportWarning>,
    pub generated_at: jiff::Timestamp,
}

/// A position whose question was replaced by a linked alternate version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Substitution {
    pub position: usize,
    pub original: QuestionId,
    pub replacement: QuestionId,
}

/// Recoverable problems met while exporting. None of these abort the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum ExportWarning {
    QuestionMissing { question_id: QuestionId },
    ImageOmitted { question_id: QuestionId, reason: String },
    DirectiveRemoved { question_id: Option<QuestionId>, directive: String },
    MalformedQuestion { question_id: QuestionId, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ExportStatus {
    Succeeded,
    /// Succeeded, but questions or images were skipped.
    SucceededWithOmissions,
    /// Compilation failed; the source file is retained.
    Failed,
}

impl ExportReport {
    pub fn status(&self) -> ExportStatus {
        if self.outcome.is_failure() {
            return ExportStatus::Failed;
        }
        let omitted_something = self.warnings.iter().any(|w| {
            matches!(
                w,
                ExportWarning::QuestionMissing { .. } | ExportWarning::ImageOmitted { .. }
            )
        });
        if omitted_something {
            ExportStatus::SucceededWithOmissions
        } else {
            ExportStatus::Succeeded
        }
    }
}

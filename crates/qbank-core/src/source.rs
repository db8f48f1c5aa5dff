use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::list::{ListDocument, ListId};
use crate::models::question::{QuestionId, QuestionRecord};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("data store error: {0}")]
    Backend(String),
}

/// Read access to the question store, as needed by one export.
///
/// Implementations are read-only from the exporter's point of view; records
/// are fetched once at the start of an export and never written back.
pub trait QuestionSource: Send + Sync {
    fn fetch_list(&self, list_id: &ListId) -> Result<ListDocument, SourceError>;

    /// Fetch records for `ids`. Identifiers that no longer resolve are left
    /// out, so the result may be shorter than the input.
    fn fetch_questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionRecord>, SourceError>;

    /// Records designated as interchangeable with `question_id`.
    fn fetch_alternate_versions(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<QuestionRecord>, SourceError>;
}

/// Index fetched records by id.
pub fn index_by_id(records: Vec<QuestionRecord>) -> BTreeMap<QuestionId, QuestionRecord> {
    records.into_iter().map(|r| (r.id.clone(), r)).collect()
}

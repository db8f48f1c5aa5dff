use std::collections::HashMap;

use qbank_core::models::list::{ListDocument, ListId};
use qbank_core::models::question::{QuestionId, QuestionRecord};
use qbank_core::source::{QuestionSource, SourceError};

/// In-memory question store. Built up front, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    lists: HashMap<ListId, ListDocument>,
    questions: HashMap<QuestionId, QuestionRecord>,
    versions: HashMap<QuestionId, Vec<QuestionId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, list: ListDocument) -> Self {
        self.lists.insert(list.id.clone(), list);
        self
    }

    pub fn with_question(mut self, question: QuestionRecord) -> Self {
        self.questions.insert(question.id.clone(), question);
        self
    }

    /// Link `alternate` as an interchangeable version of `original`.
    pub fn with_version(mut self, original: QuestionId, alternate: QuestionId) -> Self {
        self.versions.entry(original).or_default().push(alternate);
        self
    }
}

impl QuestionSource for MemoryStore {
    fn fetch_list(&self, list_id: &ListId) -> Result<ListDocument, SourceError> {
        self.lists
            .get(list_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("list {list_id}")))
    }

    fn fetch_questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionRecord>, SourceError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.questions.get(id).cloned())
            .collect())
    }

    fn fetch_alternate_versions(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<QuestionRecord>, SourceError> {
        let Some(ids) = self.versions.get(question_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.questions.get(id).cloned())
            .collect())
    }
}

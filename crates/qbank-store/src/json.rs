use std::path::PathBuf;

use qbank_core::models::list::{ListDocument, ListId};
use qbank_core::models::question::{QuestionId, QuestionRecord};
use qbank_core::naming::is_safe_component;
use qbank_core::source::{QuestionSource, SourceError};
use qbank_core::store_keys;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Question store backed by JSON files under a root directory.
///
/// Layout follows [`qbank_core::store_keys`]:
/// `lists/<id>.json`, `questions/<id>.json`, `versions/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn get_list(&self, id: &ListId) -> Result<ListDocument, StorageError> {
        check_id(id.as_str())?;
        self.read_json(&store_keys::list(id))
    }

    pub fn get_question(&self, id: &QuestionId) -> Result<QuestionRecord, StorageError> {
        check_id(id.as_str())?;
        self.read_json(&store_keys::question(id))
    }

    /// Alternate ids linked to `id`. No versions file means no alternates.
    pub fn get_version_ids(&self, id: &QuestionId) -> Result<Vec<QuestionId>, StorageError> {
        check_id(id.as_str())?;
        match self.read_json(&store_keys::versions(id)) {
            Ok(ids) => Ok(ids),
            Err(StorageError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let path = self.root.join(key);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::Read {
                    key: key.to_string(),
                    source: e,
                }
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            source: e,
        })
    }

    /// Load one question for an export. Missing and unreadable records are
    /// both reported as `None`; the latter is logged.
    fn load_for_export(&self, id: &QuestionId) -> Option<QuestionRecord> {
        match self.get_question(id) {
            Ok(record) => {
                if let Err(e) = record.validate() {
                    warn!(question_id = %id, error = %e, "question record breaks invariants");
                }
                Some(record)
            }
            Err(StorageError::NotFound { key }) => {
                debug!(key, "question not found");
                None
            }
            Err(e) => {
                warn!(question_id = %id, error = %e, "skipping unreadable question");
                None
            }
        }
    }
}

fn check_id(id: &str) -> Result<(), StorageError> {
    if is_safe_component(id) {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}

impl QuestionSource for JsonStore {
    fn fetch_list(&self, list_id: &ListId) -> Result<ListDocument, SourceError> {
        Ok(self.get_list(list_id)?)
    }

    fn fetch_questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionRecord>, SourceError> {
        Ok(ids.iter().filter_map(|id| self.load_for_export(id)).collect())
    }

    fn fetch_alternate_versions(
        &self,
        question_id: &QuestionId,
    ) -> Result<Vec<QuestionRecord>, SourceError> {
        let ids = self.get_version_ids(question_id)?;
        Ok(ids.iter().filter_map(|id| self.load_for_export(id)).collect())
    }
}

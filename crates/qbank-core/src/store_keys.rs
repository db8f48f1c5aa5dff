//! On-disk layout of the JSON question store.
//!
//! Pure path functions relative to the store root. Identifiers must already
//! have passed [`crate::naming::is_safe_component`].

use crate::models::list::ListId;
use crate::models::question::QuestionId;

pub const LISTS_DIR: &str = "lists";
pub const QUESTIONS_DIR: &str = "questions";
pub const VERSIONS_DIR: &str = "versions";

pub fn list(id: &ListId) -> String {
    format!("{LISTS_DIR}/{id}.json")
}

pub fn question(id: &QuestionId) -> String {
    format!("{QUESTIONS_DIR}/{id}.json")
}

/// JSON array of alternate question ids linked to `id`.
pub fn versions(id: &QuestionId) -> String {
    format!("{VERSIONS_DIR}/{id}.json")
}

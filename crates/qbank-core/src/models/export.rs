use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::naming;

/// Fallback image scale when neither the question nor the caller sets one.
pub const DEFAULT_IMAGE_SCALE: f64 = 0.7;

/// Bounds for `answer_space_lines`.
pub const MIN_ANSWER_SPACE_LINES: u32 = 1;
pub const MAX_ANSWER_SPACE_LINES: u32 = 40;

/// Whether an export compiles the document or stops at the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ExportFlow {
    /// Compile and surface the final artifact.
    #[default]
    Direct,
    /// Write the source file and let the user compile it.
    Manual,
}

/// Per-call export options. Immutable for the duration of one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct ExportConfiguration {
    pub columns: u8,
    pub include_answer_key: bool,
    pub include_solutions: bool,
    pub space_for_answers: bool,
    pub answer_space_lines: u32,
    pub randomize: bool,
    pub substitute_versions: bool,
    /// Permutation seed. Reusing a reported seed regenerates the same variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub image_scale_default: f64,
    pub template: String,
    pub flow: ExportFlow,
    /// Output name without extension. Derived from the list title when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_filename: Option<String>,
    /// Free-form values exposed to templates (instructor, term, subject...).
    pub template_fields: BTreeMap<String, String>,
}

impl Default for ExportConfiguration {
    fn default() -> Self {
        Self {
            columns: 1,
            include_answer_key: true,
            include_solutions: false,
            space_for_answers: false,
            answer_space_lines: 6,
            randomize: false,
            substitute_versions: false,
            seed: None,
            image_scale_default: DEFAULT_IMAGE_SCALE,
            template: "default".to_string(),
            flow: ExportFlow::Direct,
            base_filename: None,
            template_fields: BTreeMap::new(),
        }
    }
}

impl ExportConfiguration {
    /// Reject malformed options before any filesystem or engine work.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.columns, 1 | 2) {
            return Err(CoreError::InvalidConfiguration(format!(
                "columns must be 1 or 2, got {}",
                self.columns
            )));
        }

        if self.space_for_answers
            && !(MIN_ANSWER_SPACE_LINES..=MAX_ANSWER_SPACE_LINES).contains(&self.answer_space_lines)
        {
            return Err(CoreError::InvalidConfiguration(format!(
                "answer_space_lines must be between {MIN_ANSWER_SPACE_LINES} and \
                 {MAX_ANSWER_SPACE_LINES}, got {}",
                self.answer_space_lines
            )));
        }

        if !self.image_scale_default.is_finite() {
            return Err(CoreError::InvalidConfiguration(
                "image_scale_default must be a finite number".to_string(),
            ));
        }

        if !naming::is_safe_component(&self.template) {
            return Err(CoreError::InvalidConfiguration(format!(
                "template id {:?} is not a plain name",
                self.template
            )));
        }

        if let Some(name) = &self.base_filename {
            naming::validate_base_filename(name)?;
        }

        Ok(())
    }

    /// True when the ordering step needs a seed.
    pub fn needs_seed(&self) -> bool {
        self.randomize || self.substitute_versions
    }
}

use serde::{Deserialize, Serialize};

/// Page styling handed to document templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStyles {
    /// Base font size in points (10, 11 or 12 for the standard classes).
    pub font_size_pt: u8,

    /// Paper option for the document class (e.g. "a4paper", "letterpaper").
    pub paper: String,

    /// Page margin in centimetres (applied uniformly).
    pub margin_cm: f64,

    /// Gap between columns in two-column layout, in centimetres.
    pub column_sep_cm: f64,
}

impl Default for DocumentStyles {
    fn default() -> Self {
        Self {
            font_size_pt: 11,
            paper: "a4paper".to_string(),
            margin_cm: 2.0,
            column_sep_cm: 0.8,
        }
    }
}

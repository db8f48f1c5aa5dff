//! File and identifier naming rules.
//!
//! Anything that ends up as a path component on disk goes through here:
//! export base filenames, template ids and store identifiers.

use crate::error::CoreError;

/// Characters that would let a name escape its directory on any platform.
const SEPARATORS: &[char] = &['/', '\\', '\0'];

/// Validate a caller-supplied export base filename.
///
/// The name is used verbatim as `{name}.tex` / `{name}.pdf` and passed to
/// the engine on its command line, so it is held to the same plain-name
/// alphabet as [`derive_base_filename`] produces.
pub fn validate_base_filename(name: &str) -> Result<(), CoreError> {
    let invalid = |reason| CoreError::InvalidFileName {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains(SEPARATORS) {
        return Err(invalid("name contains a path separator"));
    }
    if name.contains("..") {
        return Err(invalid("name contains a parent-directory sequence"));
    }
    if !is_safe_component(name) {
        return Err(invalid(
            "name may only contain ASCII letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// True when `id` is a plain name: ASCII letters, digits, `-` and `_` only.
pub fn is_safe_component(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Derive an export filename from a list title and template id.
///
/// `"Lista 1: Álgebra"` with template `default` gives `Lista_1___lgebra_default`.
pub fn derive_base_filename(title: &str, template: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let stem = if stem.is_empty() { "list".to_string() } else { stem };
    format!("{stem}_{template}")
}

//! Document templates.
//!
//! Templates are Tera (Jinja2 syntax) sources producing LaTeX. One template
//! is compiled in; more can be dropped into a templates directory as
//! `<id>.tex.tera`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use qbank_core::naming::is_safe_component;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, warn};

use crate::error::{ExportError, error_chain};
use crate::styles::DocumentStyles;

pub const DEFAULT_TEMPLATE_ID: &str = "default";

const TEMPLATE_EXTENSION: &str = ".tex.tera";

const BUILTIN_DEFAULT: &str = include_str!("../templates/default.tex.tera");

/// Values available to every template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext<'a> {
    pub title: &'a str,
    pub header: &'a str,
    pub instructions: &'a str,
    pub body: &'a str,
    pub answer_key: &'a str,
    pub solutions: &'a str,
    pub columns: u8,
    pub fields: &'a BTreeMap<String, String>,
    pub styles: &'a DocumentStyles,
}

/// Built-in templates plus those found in an optional directory.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    dir: Option<PathBuf>,
}

impl TemplateRegistry {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Template ids available for export, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids = vec![DEFAULT_TEMPLATE_ID.to_string()];

        if let Some(dir) = &self.dir {
            match std::fs::read_dir(dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        if let Some(id) = name.strip_suffix(TEMPLATE_EXTENSION)
                            && is_safe_component(id)
                        {
                            ids.push(id.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "could not list templates directory");
                }
            }
        }

        ids.sort();
        ids.dedup();
        ids
    }

    /// Template source for `id`. A directory template shadows a built-in of
    /// the same id.
    pub fn load(&self, id: &str) -> Result<String, ExportError> {
        if !is_safe_component(id) {
            return Err(ExportError::TemplateNotFound(id.to_string()));
        }

        if let Some(dir) = &self.dir {
            let path = template_path(dir, id);
            match std::fs::read_to_string(&path) {
                Ok(source) => {
                    debug!(template = id, path = %path.display(), "loaded template from directory");
                    return Ok(source);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ExportError::io(path, e)),
            }
        }

        match id {
            DEFAULT_TEMPLATE_ID => Ok(BUILTIN_DEFAULT.to_string()),
            _ => Err(ExportError::TemplateNotFound(id.to_string())),
        }
    }

    /// Render template `id` with `context`.
    pub fn render(&self, id: &str, context: &TemplateContext<'_>) -> Result<String, ExportError> {
        let source = self.load(id)?;
        render_template(id, &source, context)
    }
}

fn template_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}{TEMPLATE_EXTENSION}"))
}

/// Render a raw Tera template string.
///
/// The template is registered under a `.tex` name so Tera's HTML
/// autoescaping never applies to LaTeX output.
pub fn render_template(
    template_id: &str,
    template_content: &str,
    context: &TemplateContext<'_>,
) -> Result<String, ExportError> {
    let name = format!("{template_id}.tex");
    let mut tera = Tera::default();
    tera.add_raw_template(&name, template_content)
        .map_err(|e| ExportError::TemplateParse(error_chain(&e)))?;

    let context = Context::from_serialize(context)?;
    let rendered = tera.render(&name, &context)?;
    Ok(rendered)
}

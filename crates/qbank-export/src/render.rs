//! Combine the assembled sections into one source file and compile it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use qbank_core::models::export::{ExportConfiguration, ExportFlow};
use qbank_core::models::render::{FailureReason, RenderResult};
use qbank_core::naming::validate_base_filename;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assemble::{AssembledDocument, FrontMatter, STAGED_ASSET_DIR, StagedAsset};
use crate::engine::{CancelToken, CompileJob, CompileOutcome, Engine, SecurityFlags};
use crate::error::ExportError;
use crate::styles::DocumentStyles;
use crate::template::{TemplateContext, TemplateRegistry};

/// Directory under the export directory holding per-call working dirs.
pub const WORK_DIR: &str = ".qbank-work";

pub const SOURCE_EXTENSION: &str = "tex";

pub struct RenderPipeline<'a> {
    pub engine: &'a dyn Engine,
    pub templates: &'a TemplateRegistry,
    pub styles: &'a DocumentStyles,
    pub export_dir: &'a Path,
    pub timeout: Option<Duration>,
}

impl RenderPipeline<'_> {
    /// Render the full document source through the configured template.
    pub fn compose(
        &self,
        document: &AssembledDocument,
        front: &FrontMatter,
        config: &ExportConfiguration,
    ) -> Result<String, ExportError> {
        let context = TemplateContext {
            title: &front.title,
            header: &front.header,
            instructions: &front.instructions,
            body: &document.body,
            answer_key: document.answer_key.as_deref().unwrap_or_default(),
            solutions: document.solutions.as_deref().unwrap_or_default(),
            columns: config.columns,
            fields: &front.fields,
            styles: self.styles,
        };
        self.templates.render(&config.template, &context)
    }

    /// Write the document source and, in the direct flow, compile it.
    ///
    /// `Err` is reserved for invalid input and for failing to write the
    /// source. Engine failures come back as `RenderResult::Failed` with the
    /// source file left on disk.
    pub fn render(
        &self,
        document: &AssembledDocument,
        front: &FrontMatter,
        config: &ExportConfiguration,
        base_filename: &str,
        cancel: &CancelToken,
    ) -> Result<RenderResult, ExportError> {
        validate_base_filename(base_filename)?;
        let source = self.compose(document, front, config)?;

        match config.flow {
            ExportFlow::Manual => self.write_manual(&source, base_filename),
            ExportFlow::Direct => self.compile(&source, &document.assets, base_filename, cancel),
        }
    }

    fn write_manual(&self, source: &str, base_filename: &str) -> Result<RenderResult, ExportError> {
        create_dir(self.export_dir)?;
        let source_path = self
            .export_dir
            .join(format!("{base_filename}.{SOURCE_EXTENSION}"));
        write_file(&source_path, source)?;

        info!(path = %source_path.display(), "wrote source for manual compilation");
        Ok(RenderResult::SourceWritten { source_path })
    }

    fn compile(
        &self,
        source: &str,
        assets: &[StagedAsset],
        base_filename: &str,
        cancel: &CancelToken,
    ) -> Result<RenderResult, ExportError> {
        let work_root = self.export_dir.join(WORK_DIR);
        let working_dir = work_root.join(format!("{base_filename}-{}", Uuid::new_v4().simple()));
        create_dir(&working_dir)?;
        let working_dir = working_dir
            .canonicalize()
            .map_err(|e| ExportError::io(&working_dir, e))?;

        let source_path = working_dir.join(format!("{base_filename}.{SOURCE_EXTENSION}"));
        write_file(&source_path, source)?;
        stage_assets(&working_dir, assets)?;

        let job = CompileJob {
            source_path: &source_path,
            working_dir: &working_dir,
            security: SecurityFlags::LOCKED_DOWN,
            timeout: self.timeout,
            cancel,
        };

        info!(engine = self.engine.name(), source = %source_path.display(), "compiling document");
        let (reason, diagnostics) = match self.engine.compile(&job) {
            CompileOutcome::Succeeded { output_path, .. } if output_path.is_file() => {
                return self.publish(&output_path, base_filename, &working_dir);
            }
            CompileOutcome::Succeeded { diagnostics, .. } => {
                (FailureReason::MissingOutput, diagnostics)
            }
            CompileOutcome::Failed {
                reason,
                diagnostics,
            } => (reason, diagnostics),
        };

        let diagnostics = if diagnostics.trim().is_empty() {
            format!("{} produced no diagnostics ({reason:?})", self.engine.name())
        } else {
            diagnostics
        };

        error!(
            engine = self.engine.name(),
            ?reason,
            source = %source_path.display(),
            "compilation failed, source retained"
        );
        Ok(RenderResult::Failed {
            reason,
            diagnostics,
            source_path,
        })
    }

    /// Move the artifact to `<export_dir>/<base>.<ext>` and drop the working dir.
    fn publish(
        &self,
        output_path: &Path,
        base_filename: &str,
        working_dir: &Path,
    ) -> Result<RenderResult, ExportError> {
        let final_path: PathBuf = self.export_dir.join(format!(
            "{base_filename}.{}",
            self.engine.output_extension()
        ));
        std::fs::rename(output_path, &final_path)
            .map_err(|e| ExportError::io(&final_path, e))?;

        if let Err(e) = std::fs::remove_dir_all(working_dir) {
            warn!(dir = %working_dir.display(), error = %e, "could not remove working directory");
        }

        info!(path = %final_path.display(), "document compiled");
        Ok(RenderResult::Compiled {
            output_path: final_path,
        })
    }
}

/// Copy every staged image to `<working_dir>/assets/<name>`.
fn stage_assets(working_dir: &Path, assets: &[StagedAsset]) -> Result<(), ExportError> {
    if assets.is_empty() {
        return Ok(());
    }
    let dir = working_dir.join(STAGED_ASSET_DIR);
    create_dir(&dir)?;
    for asset in assets {
        let target = dir.join(&asset.name);
        std::fs::copy(&asset.source, &target).map_err(|e| ExportError::io(&asset.source, e))?;
    }
    debug!(count = assets.len(), dir = %dir.display(), "staged images");
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(path).map_err(|e| ExportError::io(path, e))
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents.as_bytes()).map_err(|e| ExportError::io(path, e))
}

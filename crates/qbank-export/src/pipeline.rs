//! The `export` entry point: fetch, order, assemble, render.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use qbank_core::models::export::ExportConfiguration;
use qbank_core::models::list::ListId;
use qbank_core::models::report::{ExportReport, ExportWarning};
use qbank_core::naming::{derive_base_filename, validate_base_filename};
use qbank_core::source::{QuestionSource, SourceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assemble::Assembler;
use crate::assets::AssetResolver;
use crate::engine::{CancelToken, Engine};
use crate::error::ExportError;
use crate::ordering::compute_order;
use crate::render::RenderPipeline;
use crate::sanitize::Sanitizer;
use crate::styles::DocumentStyles;
use crate::template::TemplateRegistry;

const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 120;

/// Process-wide export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExporterSettings {
    /// Where sources and final documents are written.
    pub export_dir: PathBuf,
    /// Trusted root for image references.
    pub image_root: PathBuf,
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Engine timeout. 0 disables it.
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,
    #[serde(default)]
    pub styles: DocumentStyles,
}

fn default_compile_timeout_secs() -> u64 {
    DEFAULT_COMPILE_TIMEOUT_SECS
}

impl ExporterSettings {
    pub fn new(export_dir: impl Into<PathBuf>, image_root: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            image_root: image_root.into(),
            templates_dir: None,
            compile_timeout_secs: DEFAULT_COMPILE_TIMEOUT_SECS,
            styles: DocumentStyles::default(),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        (self.compile_timeout_secs > 0).then(|| Duration::from_secs(self.compile_timeout_secs))
    }
}

/// Export façade wiring the data store, sanitizer, assets, templates and
/// engine together.
pub struct Exporter {
    source: Box<dyn QuestionSource>,
    engine: Box<dyn Engine>,
    sanitizer: Sanitizer,
    assets: AssetResolver,
    templates: TemplateRegistry,
    settings: ExporterSettings,
}

impl Exporter {
    pub fn new(
        source: impl QuestionSource + 'static,
        engine: impl Engine + 'static,
        settings: ExporterSettings,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            source: Box::new(source),
            engine: Box::new(engine),
            sanitizer: Sanitizer::latex()?,
            assets: AssetResolver::new(settings.image_root.clone()),
            templates: TemplateRegistry::new(settings.templates_dir.clone()),
            settings,
        })
    }

    /// Replace the sanitizer, e.g. with one built over a different denylist.
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn settings(&self) -> &ExporterSettings {
        &self.settings
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn export(
        &self,
        list_id: &ListId,
        config: &ExportConfiguration,
    ) -> Result<ExportReport, ExportError> {
        self.export_with_cancel(list_id, config, &CancelToken::new())
    }

    /// Run one export. Blocks for the duration of the engine run.
    ///
    /// Input errors return `Err` before anything is written. Missing
    /// questions, rejected images and sanitizer interventions are reported
    /// as warnings; a failed compile is an `Ok` report with a failed outcome.
    pub fn export_with_cancel(
        &self,
        list_id: &ListId,
        config: &ExportConfiguration,
        cancel: &CancelToken,
    ) -> Result<ExportReport, ExportError> {
        config.validate()?;
        // Fail on an unknown template before touching the store or disk.
        self.templates.load(&config.template)?;

        info!(list_id = %list_id, template = %config.template, flow = ?config.flow, "starting export");

        let list = self.source.fetch_list(list_id).map_err(|e| match e {
            SourceError::NotFound(_) => ExportError::ListNotFound(list_id.to_string()),
            SourceError::Backend(msg) => ExportError::Source(msg),
        })?;

        let base_filename = match &config.base_filename {
            Some(name) => name.clone(),
            None => derive_base_filename(&list.title, &config.template),
        };
        validate_base_filename(&base_filename)?;

        let ordered = compute_order(&list, config, self.source.as_ref())
            .map_err(|e| ExportError::Source(e.to_string()))?;

        let assembler = Assembler::new(&self.sanitizer, &self.assets);
        let (front, front_warnings) = assembler.front_matter(&list, config);
        let document = assembler.assemble(&ordered.questions, config);

        let pipeline = RenderPipeline {
            engine: self.engine.as_ref(),
            templates: &self.templates,
            styles: &self.settings.styles,
            export_dir: &self.settings.export_dir,
            timeout: self.settings.timeout(),
        };
        let outcome = pipeline.render(&document, &front, config, &base_filename, cancel)?;

        let mut warnings: Vec<ExportWarning> = ordered
            .omitted
            .iter()
            .map(|id| ExportWarning::QuestionMissing {
                question_id: id.clone(),
            })
            .collect();
        warnings.extend(front_warnings);
        warnings.extend(document.warnings);

        if !warnings.is_empty() {
            warn!(list_id = %list_id, count = warnings.len(), "export finished with warnings");
        }

        Ok(ExportReport {
            list_id: list.id,
            outcome,
            question_count: ordered.questions.len(),
            omitted_questions: ordered.omitted,
            substitutions: ordered.substitutions,
            seed: ordered.seed,
            warnings,
            generated_at: jiff::Timestamp::now(),
        })
    }
}

/// Run an export on tokio's blocking pool.
///
/// Setting `cancel` kills the engine subprocess; the export then completes
/// with a `Cancelled` failure and the source file retained.
pub async fn export_in_background(
    exporter: Arc<Exporter>,
    list_id: ListId,
    config: ExportConfiguration,
    cancel: CancelToken,
) -> Result<ExportReport, ExportError> {
    tokio::task::spawn_blocking(move || exporter.export_with_cancel(&list_id, &config, &cancel))
        .await
        .map_err(|e| ExportError::Background(e.to_string()))?
}

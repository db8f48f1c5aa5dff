use std::path::{Path, PathBuf};

use qbank_export::styles::DocumentStyles;
use qbank_export::{ExporterSettings, LatexEngine};
use serde::{Deserialize, Serialize};

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
pub const CURRENT_VERSION: u32 = 1;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QbankConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Root of the JSON question store.
    pub data_dir: PathBuf,
    /// Trusted root for question images.
    pub image_root: PathBuf,
    pub export_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
    /// Engine argv: program followed by any leading arguments.
    #[serde(default = "default_engine_command")]
    pub engine_command: Vec<String>,
    #[serde(default = "default_engine_passes")]
    pub engine_passes: u32,
    /// 0 disables the timeout.
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,
    #[serde(default)]
    pub styles: DocumentStyles,
}

fn default_engine_command() -> Vec<String> {
    vec!["pdflatex".to_string()]
}

fn default_engine_passes() -> u32 {
    2
}

fn default_compile_timeout_secs() -> u64 {
    120
}

impl QbankConfig {
    /// Defaults laid out under one base directory.
    pub fn under(base: &Path) -> Self {
        Self {
            config_version: CURRENT_VERSION,
            data_dir: base.join("data"),
            image_root: base.join("images"),
            export_dir: base.join("exports"),
            templates_dir: Some(base.join("templates")),
            engine_command: default_engine_command(),
            engine_passes: default_engine_passes(),
            compile_timeout_secs: default_compile_timeout_secs(),
            styles: DocumentStyles::default(),
        }
    }

    pub fn exporter_settings(&self) -> ExporterSettings {
        ExporterSettings {
            export_dir: self.export_dir.clone(),
            image_root: self.image_root.clone(),
            templates_dir: self.templates_dir.clone(),
            compile_timeout_secs: self.compile_timeout_secs,
            styles: self.styles.clone(),
        }
    }

    pub fn engine(&self) -> LatexEngine {
        LatexEngine::new(self.engine_command.clone(), self.engine_passes)
    }
}

fn config_dir() -> eyre::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre::eyre!("no config directory found"))?;
    Ok(base.join("qbank"))
}

pub fn default_config_path() -> eyre::Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Base directory for `init-config` defaults.
pub fn default_data_home() -> eyre::Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| eyre::eyre!("no data directory found"))?;
    Ok(base.join("qbank"))
}

pub fn load_config(path: &Path) -> eyre::Result<QbankConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: QbankConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
///
/// Each migration is a pure transform on the raw JSON value. Version 0 is a
/// file written before the version field existed; its shape is identical
/// to v1, so it needs no transform.
pub fn migrate(json: serde_json::Value, from_version: u32) -> eyre::Result<serde_json::Value> {
    if from_version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION}). \
             Please update qbank."
        ));
    }

    // Future migrations go here:
    // if from_version < 2 { ... }

    Ok(json)
}

pub fn save_config(path: &Path, config: &QbankConfig) -> eyre::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("config path {} has no parent", path.display()))?;
    std::fs::create_dir_all(dir)?;

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let json = serde_json::to_string_pretty(&stamped)?;

    // Write to a temp file then rename for atomicity
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

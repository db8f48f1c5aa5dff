//! Image reference validation against a trusted root.

use std::io;
use std::path::{Component, Path, PathBuf};

use qbank_core::models::export::DEFAULT_IMAGE_SCALE;
use qbank_core::models::question::ImageRef;
use thiserror::Error;
use tracing::debug;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 2.0;

/// Characters that cannot appear in a path embedded in `\includegraphics{}`.
const UNSAFE_PATH_CHARS: &[char] = &['{', '}', '%', '#', '$', '&', '^', '~', '\\', '"'];

/// Clamp an image scale into `[MIN_SCALE, MAX_SCALE]`.
///
/// Missing, non-positive and non-finite values give [`DEFAULT_IMAGE_SCALE`].
pub fn validate_scale(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.clamp(MIN_SCALE, MAX_SCALE),
        _ => DEFAULT_IMAGE_SCALE,
    }
}

/// True when `reference`, resolved against `trusted_root`, stays inside it.
///
/// Parent traversal, absolute overrides and symlinks pointing outside the
/// root all yield `false`, as does any resolution error. The referenced
/// file does not have to exist.
pub fn validate_path(reference: &str, trusted_root: &Path) -> bool {
    match resolve_within(reference, trusted_root) {
        Ok(Some(_)) => true,
        Ok(None) => false,
        Err(e) => {
            debug!(reference, error = %e, "image path did not resolve");
            false
        }
    }
}

/// Resolve `reference` under `trusted_root`. `Ok(None)` means it escapes.
fn resolve_within(reference: &str, trusted_root: &Path) -> io::Result<Option<PathBuf>> {
    let root = trusted_root.canonicalize()?;
    let resolved = resolve_lenient(&root.join(reference))?;
    Ok(resolved.starts_with(&root).then_some(resolved))
}

/// Canonicalize the longest existing prefix of `path`, then apply the
/// remaining components lexically. Non-existent components cannot be
/// symlinks, so the lexical part is exact.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut tail: Vec<Component<'_>> = Vec::new();

    let mut resolved = loop {
        match existing.canonicalize() {
            Ok(base) => break base,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(last), Some(parent)) = (existing.components().next_back(), existing.parent())
                else {
                    return Err(e);
                };
                tail.push(last);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    };

    for component in tail.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            Component::Normal(part) => resolved.push(part),
            Component::RootDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "unexpected root component in unresolved tail",
                ));
            }
        }
    }

    Ok(resolved)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetRejection {
    #[error("path resolves outside the image root")]
    OutsideRoot,

    #[error("image file does not exist")]
    NotFound,

    #[error("path contains characters that cannot be embedded")]
    UnsafeCharacters,

    #[error("path could not be resolved: {0}")]
    Unresolvable(String),
}

/// An image ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    /// Forward-slash form used inside the generated markup.
    pub markup_path: String,
    pub scale: f64,
}

/// Resolves image references against the image store root.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validate an image reference and pick its scale: the image's own
    /// scale, else `fallback_scale`, clamped either way.
    pub fn resolve(
        &self,
        image: &ImageRef,
        fallback_scale: f64,
    ) -> Result<ResolvedImage, AssetRejection> {
        let path = match resolve_within(&image.path, &self.root) {
            Ok(Some(path)) => path,
            Ok(None) => return Err(AssetRejection::OutsideRoot),
            Err(e) => return Err(AssetRejection::Unresolvable(e.to_string())),
        };

        if !path.is_file() {
            return Err(AssetRejection::NotFound);
        }

        let markup_path = markup_path(&path);
        if markup_path.contains(UNSAFE_PATH_CHARS) || markup_path.chars().any(char::is_control) {
            return Err(AssetRejection::UnsafeCharacters);
        }

        Ok(ResolvedImage {
            path,
            markup_path,
            scale: validate_scale(image.scale.filter(|s| *s > 0.0).or(Some(fallback_scale))),
        })
    }
}

fn markup_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if cfg!(windows) {
        let text = text.replace('\\', "/");
        match text.strip_prefix("//?/") {
            Some(stripped) => stripped.to_string(),
            None => text,
        }
    } else {
        text.into_owned()
    }
}

//! System-instruction templates and the fixed user-message texts.
//!
//! Templates are loaded through a [`TemplateProvider`]; the built-in texts
//! below are the fallbacks used when a template file is missing.

use crate::models::RecognitionMode;
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

pub const ANALYSIS_SYSTEM: &str = include_str!("../data/prompts/analysis_system.txt");
pub const FUSION_SYSTEM: &str = include_str!("../data/prompts/fusion_system.txt");
pub const RECOGNIZE_SIMPLE: &str = include_str!("../data/prompts/recognize_simple.txt");
pub const RECOGNIZE_DETAILED: &str = include_str!("../data/prompts/recognize_detailed.txt");
pub const ANALYZE_USER: &str = include_str!("../data/prompts/analyze_user.txt");
pub const RECOGNIZE_USER: &str = include_str!("../data/prompts/recognize_user.txt");
pub const FUSE_USER: &str = include_str!("../data/prompts/fuse_user.txt");

/// Which system instruction an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Analysis,
    Fusion,
    Recognition(RecognitionMode),
}

impl TemplateKind {
    /// File name looked up inside a template directory.
    pub fn file_name(self) -> &'static str {
        match self {
            TemplateKind::Analysis => "reverse_prompt.md",
            TemplateKind::Fusion => "fuse_prompt.md",
            TemplateKind::Recognition(RecognitionMode::Simple) => "recognize_simple.md",
            TemplateKind::Recognition(RecognitionMode::Detailed) => "recognize_detailed.md",
        }
    }

    /// Built-in instruction used when no template file is available.
    pub fn fallback(self) -> &'static str {
        match self {
            TemplateKind::Analysis => ANALYSIS_SYSTEM,
            TemplateKind::Fusion => FUSION_SYSTEM,
            TemplateKind::Recognition(RecognitionMode::Simple) => RECOGNIZE_SIMPLE,
            TemplateKind::Recognition(RecognitionMode::Detailed) => RECOGNIZE_DETAILED,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Supplies system-instruction text; fails with `TemplateNotFound` when absent.
pub trait TemplateProvider: Send + Sync {
    fn load_template(&self, kind: TemplateKind) -> Result<String>;
}

/// Reads templates from `<dir>/<kind file name>`.
pub struct FileTemplateProvider {
    dir: PathBuf,
}

impl FileTemplateProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl TemplateProvider for FileTemplateProvider {
    fn load_template(&self, kind: TemplateKind) -> Result<String> {
        let path = self.dir.join(kind.file_name());
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::TemplateNotFound(path.display().to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Substitutes the built-in instruction whenever the inner provider has no template.
pub struct FallbackTemplates<P> {
    inner: P,
}

impl<P: TemplateProvider> FallbackTemplates<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: TemplateProvider> TemplateProvider for FallbackTemplates<P> {
    fn load_template(&self, kind: TemplateKind) -> Result<String> {
        match self.inner.load_template(kind) {
            Err(Error::TemplateNotFound(location)) => {
                tracing::warn!(
                    "Template {} not found ({}), using built-in instruction",
                    kind,
                    location
                );
                Ok(kind.fallback().to_string())
            }
            other => other,
        }
    }
}

/// Always serves the built-in instructions.
pub struct BuiltinTemplates;

impl TemplateProvider for BuiltinTemplates {
    fn load_template(&self, kind: TemplateKind) -> Result<String> {
        Ok(kind.fallback().to_string())
    }
}

/// Replace `{{key}}` placeholders in a template string.
///
/// Substitution is a single left-to-right pass: inserted values are never
/// rescanned, and unknown placeholders are kept as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        let key = &after_open[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

use crate::bundled::{get_bundled, BundledTemplate, BUNDLED_TEMPLATES};
use crate::template::{parse_template_file, parse_template_str, TemplateDocument, TemplateError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extensions recognized as template files, in lookup order.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["yml", "yaml"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TemplateSummary {
    pub name: String,
    pub description: String,
    pub file: String,
    /// Compiled into the binary rather than read from `templates_dir`.
    pub bundled: bool,
}

/// Where a resolved template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Bundled(&'static BundledTemplate),
}

impl TemplateSource {
    pub fn load(&self) -> Result<TemplateDocument, TemplateError> {
        match self {
            TemplateSource::File(path) => parse_template_file(path),
            TemplateSource::Bundled(bundled) => parse_template_str(bundled.source),
        }
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::File(path) => write!(f, "{}", path.display()),
            TemplateSource::Bundled(bundled) => write!(f, "built-in {}", bundled.file),
        }
    }
}

fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e))
}

/// Resolve a template identifier.
///
/// An existing path with a YAML extension wins, then `<templates_dir>/<id>.yml`
/// or `.yaml`, then the bundled template of that name.
pub fn resolve_template(
    identifier: &str,
    templates_dir: &Path,
) -> Result<TemplateSource, TemplateError> {
    let direct = Path::new(identifier);
    if direct.exists() && has_template_extension(direct) {
        return Ok(TemplateSource::File(direct.canonicalize()?));
    }

    for ext in TEMPLATE_EXTENSIONS {
        let candidate = templates_dir.join(format!("{identifier}.{ext}"));
        if candidate.is_file() {
            return Ok(TemplateSource::File(candidate.canonicalize()?));
        }
    }

    get_bundled(identifier)
        .map(TemplateSource::Bundled)
        .ok_or_else(|| TemplateError::TemplateNotFound(identifier.to_owned()))
}

/// Every template in `templates_dir` plus the bundled ones it does not
/// shadow, sorted by file name. Unreadable templates are skipped.
pub fn list_templates(templates_dir: &Path) -> Vec<TemplateSummary> {
    let mut templates = directory_templates(templates_dir);
    for bundled in BUNDLED_TEMPLATES {
        let shadowed = templates.iter().any(|t| {
            Path::new(&t.file)
                .file_stem()
                .is_some_and(|stem| stem == bundled.name)
        });
        if shadowed {
            continue;
        }
        match parse_template_str(bundled.source) {
            Ok(doc) => templates.push(summarize(&doc, bundled.name, bundled.file, true)),
            Err(e) => warn!("skipping built-in template '{}': {e}", bundled.file),
        }
    }
    templates.sort_by(|a, b| a.file.cmp(&b.file));
    templates
}

fn summarize(doc: &TemplateDocument, stem: &str, file: &str, bundled: bool) -> TemplateSummary {
    let field = |key: &str| {
        doc.root()
            .get(key)
            .and_then(crate::interpolate::scalar_to_string)
    };
    TemplateSummary {
        name: field("name").unwrap_or_else(|| stem.to_owned()),
        description: field("description").unwrap_or_default(),
        file: file.to_owned(),
        bundled,
    }
}

fn directory_templates(templates_dir: &Path) -> Vec<TemplateSummary> {
    let Ok(entries) = std::fs::read_dir(templates_dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && has_template_extension(p))
        .collect();
    paths.sort();

    let mut templates = Vec::new();
    for path in paths {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        match parse_template_file(&path) {
            Ok(doc) => templates.push(summarize(&doc, &stem, &file, false)),
            Err(e) => warn!("skipping unreadable template '{file}': {e}"),
        }
    }
    templates
}

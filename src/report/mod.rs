//! Human-readable reports
//!
//! A [`ReportModel`] is projected from the declaration and handed to a
//! [`ReportRenderer`]. The stock renderer is a Jinja-style template
//! evaluated with `minijinja`, where the model is visible as `tro`.

mod model;

pub use model::{
    workflow_dot, LocationStatus, ReportArrangement, ReportLocation, ReportModel, ReportPerformance,
};

use minijinja::{context, AutoEscape, Environment};
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{write_atomic, Document};
use crate::error::LedgerResult;

/// Built-in templates by name.
pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[("default", include_str!("default.html.j2"))];

/// Errors from report rendering
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("'{name}' is neither a built-in template ({}) nor a readable file", .available.join(", "))]
    UnknownTemplate { name: String, available: Vec<String> },

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Turns a report model into text.
pub trait ReportRenderer {
    fn render(&self, model: &ReportModel) -> Result<String, ReportError>;
}

/// minijinja template renderer.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    source: String,
    escape_html: bool,
}

impl TemplateRenderer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            escape_html: false,
        }
    }

    /// A built-in template name, or else a template file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ReportError> {
        if let Some((_, source)) = BUILTIN_TEMPLATES.iter().find(|(name, _)| *name == name_or_path) {
            return Ok(Self::new(*source).with_html_escape(true));
        }
        let path = Path::new(name_or_path);
        if !path.is_file() {
            return Err(ReportError::UnknownTemplate {
                name: name_or_path.to_string(),
                available: BUILTIN_TEMPLATES.iter().map(|(n, _)| n.to_string()).collect(),
            });
        }
        let source = fs::read_to_string(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let html = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("html" | "htm" | "j2" | "jinja2" | "jinja")
        );
        Ok(Self::new(source).with_html_escape(html))
    }

    /// HTML-escape interpolated values.
    pub fn with_html_escape(mut self, escape: bool) -> Self {
        self.escape_html = escape;
        self
    }
}

impl ReportRenderer for TemplateRenderer {
    fn render(&self, model: &ReportModel) -> Result<String, ReportError> {
        let mut env = Environment::new();
        let escape = if self.escape_html {
            AutoEscape::Html
        } else {
            AutoEscape::None
        };
        env.set_auto_escape_callback(move |_| escape.clone());
        Ok(env.render_str(&self.source, context! { tro => model })?)
    }
}

/// Render a report for `document` into `output`.
pub fn generate_report(document: &Document, renderer: &dyn ReportRenderer, output: &Path) -> LedgerResult<()> {
    let model = ReportModel::from_document(document)?;
    let rendered = renderer.render(&model)?;
    write_atomic(output, rendered.as_bytes())?;
    tracing::info!(
        output = %output.display(),
        arrangements = model.arrangements.len(),
        performances = model.trps.len(),
        "Report written"
    );
    Ok(())
}

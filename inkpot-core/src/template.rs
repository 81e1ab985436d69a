use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tera::{Context, Template, Tera};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::filters;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),
    #[error("Error rendering template {name}: {source}")]
    Render { name: String, source: tera::Error },
    #[error("Template {name} failed to load: {reason}")]
    Invalid { name: String, reason: String },
    #[error("Error loading templates: {0}")]
    Load(tera::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TemplateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TemplateError::NotFound(_))
    }
}

/// Renders a named theme template against a context.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &Context) -> Result<String, TemplateError>;

    /// Render a template and write it directly to a file
    fn render_to_file(
        &self,
        template: &str,
        context: &Context,
        output_path: &Path,
    ) -> Result<(), TemplateError> {
        let rendered = self.render(template, context)?;

        // Ensure parent directory exists
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(output_path, rendered)?;
        Ok(())
    }
}

/// Flattens a tera error and its sources into one line.
fn error_chain(e: &tera::Error) -> String {
    let mut reason = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}

/// Parses each template on its own, so one broken file only takes out the
/// templates that extend or import it.
fn parse_templates(
    sources: Vec<(String, String)>,
    broken: &mut BTreeMap<String, String>,
) -> Vec<(String, String, Template)> {
    let mut parsed: Vec<(String, String, Template)> = Vec::new();
    for (name, source) in sources {
        match Template::new(&name, None, &source) {
            Ok(template) => parsed.push((name, source, template)),
            Err(e) => {
                broken.insert(name, error_chain(&e));
            }
        }
    }

    loop {
        let known: HashSet<String> = parsed.iter().map(|(name, _, _)| name.clone()).collect();
        let missing = |template: &Template| {
            template
                .parent
                .iter()
                .chain(template.imported_macro_files.iter().map(|(file, _)| file))
                .find(|dep| !known.contains(*dep))
                .cloned()
        };

        let (usable, dependent): (Vec<_>, Vec<_>) = parsed
            .into_iter()
            .partition(|(_, _, template)| missing(template).is_none());
        if dependent.is_empty() {
            return usable;
        }
        for (name, _, template) in dependent {
            let dep = missing(&template).unwrap_or_default();
            broken.insert(name, format!("depends on missing or broken template {}", dep));
        }
        parsed = usable;
    }
}

pub struct TeraEngine {
    tera: Tera,
    broken: BTreeMap<String, String>,
}

impl TeraEngine {
    /// Loads every template under `templates_dir`. Templates that fail to
    /// read or parse are logged and kept aside; rendering one of them
    /// returns [`TemplateError::Invalid`].
    pub fn new<P: AsRef<Path>>(templates_dir: P) -> Result<Self, TemplateError> {
        let root = templates_dir.as_ref();
        let mut broken = BTreeMap::new();
        let mut sources = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            match std::fs::read_to_string(entry.path()) {
                Ok(source) => sources.push((name, source)),
                Err(e) => {
                    broken.insert(name, e.to_string());
                }
            }
        }

        let parsed = parse_templates(sources, &mut broken);
        for (name, reason) in &broken {
            warn!("Template {} failed to load: {}", name, reason);
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(
            parsed
                .into_iter()
                .map(|(name, source, _)| (name, source))
                .collect::<Vec<_>>(),
        )
        .map_err(TemplateError::Load)?;

        let mut engine = Self::from_tera(tera);
        engine.broken = broken;
        Ok(engine)
    }

    /// Wraps an existing tera instance, registering the site filters.
    pub fn from_tera(mut tera: Tera) -> Self {
        filters::register(&mut tera);
        Self {
            tera,
            broken: BTreeMap::new(),
        }
    }

    /// Templates left out at load time, with the reason.
    pub fn broken_templates(&self) -> &BTreeMap<String, String> {
        &self.broken
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

impl TemplateEngine for TeraEngine {
    fn render(&self, template: &str, context: &Context) -> Result<String, TemplateError> {
        if let Some(reason) = self.broken.get(template) {
            return Err(TemplateError::Invalid {
                name: template.to_string(),
                reason: reason.clone(),
            });
        }
        if !self.has_template(template) {
            return Err(TemplateError::NotFound(template.to_string()));
        }

        self.tera
            .render(template, context)
            .map_err(|source| TemplateError::Render {
                name: template.to_string(),
                source,
            })
    }
}

//! Posts and pages: one file in, one [`ContentItem`] out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{FeatureDefaults, SiteConfig};
use crate::highlight::{Highlighter, highlight_code_blocks};
use crate::markdown::{TocEntry, render_markdown};
use crate::protect::{PendingDirectives, protect, restore_diagrams};

#[derive(Debug, Error)]
pub enum ContentReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("{path} has no usable file name")]
    InvalidPath { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Page,
}

/// Feature switches after frontmatter, path rules and built-in defaults have
/// been merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Features {
    pub comments: bool,
    pub mermaid: bool,
    pub codepen: bool,
    pub toc: bool,
    pub banner: bool,
    pub sidebar: bool,
}

impl Features {
    /// `explicit` beats `rules`, which beats the built-in default for `kind`.
    pub fn resolve(explicit: &FeatureDefaults, rules: &FeatureDefaults, kind: ContentKind) -> Self {
        let merged = rules.overlay(explicit);
        Self {
            comments: merged.comments.unwrap_or(false),
            mermaid: merged.mermaid.unwrap_or(false),
            codepen: merged.codepen.unwrap_or(false),
            toc: merged.toc.unwrap_or(kind == ContentKind::Post),
            banner: merged.banner.unwrap_or(false),
            sidebar: merged.sidebar.unwrap_or(true),
        }
    }
}

/// The recognised frontmatter keys. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<serde_yaml::Value>,
    pub date: Option<serde_yaml::Value>,
    pub comments: Option<bool>,
    pub mermaid: Option<bool>,
    pub codepen: Option<bool>,
    pub toc: Option<bool>,
    pub banner: Option<bool>,
    pub sidebar: Option<bool>,
}

impl FrontMatter {
    fn features(&self) -> FeatureDefaults {
        FeatureDefaults {
            toc: self.toc,
            comments: self.comments,
            mermaid: self.mermaid,
            codepen: self.codepen,
            banner: self.banner,
            sidebar: self.sidebar,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub source: PathBuf,
    pub raw_markdown: String,
    /// Body HTML. Still holds directive tokens until [`crate::expand`] runs.
    pub rendered_html: String,
    pub title: String,
    /// `YYYY-MM-DD` or `YYYY-MM`, kept as text.
    pub date: String,
    pub features: Features,
    pub url: String,
    pub collection: String,
    pub section: String,
    pub toc_entries: Vec<TocEntry>,
    pub pending: PendingDirectives,
}

/// What templates see of a [`ContentItem`].
#[derive(Debug, Serialize)]
pub struct ItemView<'a> {
    pub kind: ContentKind,
    pub title: &'a str,
    pub date: &'a str,
    pub url: &'a str,
    pub content: &'a str,
    pub collection: &'a str,
    pub section: &'a str,
    #[serde(flatten)]
    pub features: Features,
    pub toc_entries: &'a [TocEntry],
}

impl ContentItem {
    /// Template view carrying `content` in place of the stored body.
    pub fn view<'a>(&'a self, content: &'a str) -> ItemView<'a> {
        ItemView {
            kind: self.kind,
            title: &self.title,
            date: &self.date,
            url: &self.url,
            content,
            collection: &self.collection,
            section: &self.section,
            features: self.features,
            toc_entries: &self.toc_entries,
        }
    }

    pub fn stored_view(&self) -> ItemView<'_> {
        self.view(&self.rendered_html)
    }
}

/// Splits a leading `---` delimited YAML block from the body. Files without
/// one are all body.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(header), body);
        }
        offset += line.len();
    }

    (None, content)
}

fn yaml_to_text(value: Option<&serde_yaml::Value>) -> String {
    match value {
        Some(serde_yaml::Value::String(s)) => s.clone(),
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        Some(serde_yaml::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// The markdown → HTML pipeline shared by every content file.
pub struct ContentPipeline<'a> {
    config: &'a SiteConfig,
    highlighter: &'a dyn Highlighter,
}

impl<'a> ContentPipeline<'a> {
    pub fn new(config: &'a SiteConfig, highlighter: &'a dyn Highlighter) -> Self {
        Self {
            config,
            highlighter,
        }
    }

    /// protect → highlight → markdown → restore diagrams.
    pub fn transform(&self, markdown: &str) -> (String, Vec<TocEntry>, PendingDirectives) {
        let protected = protect(markdown);
        let highlighted = highlight_code_blocks(
            &protected.text,
            self.highlighter,
            self.config.highlight.escape_fallback,
        );
        let rendered = render_markdown(&highlighted);
        let html = restore_diagrams(&rendered.html, &protected.diagrams);

        (html, rendered.toc, protected.directives)
    }

    pub fn read(&self, path: &Path, kind: ContentKind) -> Result<ContentItem, ContentReadError> {
        let data = std::fs::read_to_string(path).map_err(|source| ContentReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(path, &data, kind)
    }

    /// Builds an item from file contents. The url, collection and section are
    /// filled in by [`assign_post_route`] or [`assign_page_route`].
    pub fn parse(
        &self,
        path: &Path,
        data: &str,
        kind: ContentKind,
    ) -> Result<ContentItem, ContentReadError> {
        let (header, body) = split_frontmatter(data);
        let front: FrontMatter = match header {
            Some(yaml) if !yaml.trim().is_empty() => {
                serde_yaml::from_str(yaml).map_err(|source| ContentReadError::Frontmatter {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => FrontMatter::default(),
        };

        let rules = self.config.path_defaults(&path.to_string_lossy());
        let features = Features::resolve(&front.features(), &rules, kind);
        let (rendered_html, toc_entries, pending) = self.transform(body);

        Ok(ContentItem {
            kind,
            source: path.to_path_buf(),
            raw_markdown: body.to_string(),
            rendered_html,
            title: yaml_to_text(front.title.as_ref()),
            date: yaml_to_text(front.date.as_ref()),
            features,
            url: String::new(),
            collection: String::new(),
            section: String::new(),
            toc_entries,
            pending,
        })
    }
}

fn file_stem(path: &Path) -> Result<String, ContentReadError> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .ok_or_else(|| ContentReadError::InvalidPath {
            path: path.to_path_buf(),
        })
}

/// `/<collection>/<stem>/`
pub fn assign_post_route(item: &mut ContentItem, collection: &str) -> Result<(), ContentReadError> {
    let stem = file_stem(&item.source)?;
    item.url = format!("/{}/{}/", collection, stem);
    item.collection = collection.to_string();
    Ok(())
}

/// `home` is the site root; every other page is `/<stem>/` and names its own
/// section.
pub fn assign_page_route(item: &mut ContentItem) -> Result<(), ContentReadError> {
    let stem = file_stem(&item.source)?;
    if stem == "home" {
        item.url = "/".into();
    } else {
        item.url = format!("/{}/", stem);
        item.section = stem;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Rule, RuleScope};
    use crate::highlight::SyntectHighlighter;

    fn toc_rule(path: &str) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.rules = vec![Rule {
            scope: RuleScope { path: path.into() },
            features: FeatureDefaults {
                toc: Some(true),
                ..Default::default()
            },
        }];
        config
    }

    #[test]
    fn test_split_frontmatter() {
        let (header, body) = split_frontmatter("---\ntitle: Hi\n---\nBody\n");
        assert_eq!(header, Some("title: Hi\n"));
        assert_eq!(body, "Body\n");

        let (header, body) = split_frontmatter("No header\n---\n");
        assert_eq!(header, None);
        assert_eq!(body, "No header\n---\n");

        let (header, body) = split_frontmatter("---\nunterminated: true\n");
        assert_eq!(header, None);
        assert_eq!(body, "---\nunterminated: true\n");
    }

    #[test]
    fn test_default_features_by_kind() {
        let none = FeatureDefaults::default();
        let post = Features::resolve(&none, &none, ContentKind::Post);
        let page = Features::resolve(&none, &none, ContentKind::Page);

        assert!(post.toc);
        assert!(!page.toc);
        assert!(post.sidebar && page.sidebar);
        assert!(!post.comments && !post.mermaid && !post.codepen && !post.banner);
    }

    #[test]
    fn test_rule_applies_when_frontmatter_silent() {
        let config = toc_rule("sections/");
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let item = pipeline
            .parse(
                Path::new("theme/sections/about.md"),
                "---\ntitle: About\n---\nHi\n",
                ContentKind::Page,
            )
            .unwrap();
        assert!(item.features.toc);
    }

    #[test]
    fn test_explicit_frontmatter_beats_rule() {
        let config = toc_rule("content/code");
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let item = pipeline
            .parse(
                Path::new("content/code/post.md"),
                "---\ntoc: false\n---\nHi\n",
                ContentKind::Post,
            )
            .unwrap();
        assert!(!item.features.toc);
    }

    #[test]
    fn test_frontmatter_values() {
        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let item = pipeline
            .parse(
                Path::new("content/code/hello.md"),
                "---\ntitle: \"Hello\"\ndate: 2025-01-01\nmermaid: true\nsidebar: false\nextra: ignored\n---\n# Hi\n",
                ContentKind::Post,
            )
            .unwrap();

        assert_eq!(item.title, "Hello");
        assert_eq!(item.date, "2025-01-01");
        assert!(item.features.mermaid);
        assert!(!item.features.sidebar);
        assert_eq!(item.raw_markdown, "# Hi\n");
        assert!(item.rendered_html.contains("<h1 id=\"hi\">Hi</h1>"));
    }

    #[test]
    fn test_bad_frontmatter_is_read_error() {
        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let err = pipeline
            .parse(
                Path::new("content/code/bad.md"),
                "---\ntoc: [unclosed\n---\nbody\n",
                ContentKind::Post,
            )
            .unwrap_err();
        assert!(matches!(err, ContentReadError::Frontmatter { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let err = pipeline
            .read(Path::new("/definitely/not/here.md"), ContentKind::Post)
            .unwrap_err();
        assert!(matches!(err, ContentReadError::Io { .. }));
    }

    #[test]
    fn test_diagram_survives_pipeline_verbatim() {
        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let source = "graph TD\n  A[Start] --> B{Is it?}\n  B -->|Yes| C\n";
        let markdown = format!("Intro\n\n```mermaid\n{}```\n\nOutro\n", source);
        let (html, _, _) = pipeline.transform(&markdown);

        assert_eq!(html.matches("<pre><code class=\"language-mermaid\">").count(), 1);
        let expected = format!("<pre><code class=\"language-mermaid\">{}</code></pre>", source);
        assert!(html.contains(&expected));
    }

    #[test]
    fn test_code_block_with_blank_line_stays_whole() {
        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let (html, _, _) = pipeline.transform("```foobar123\nfirst\n\n    second\n```\n\nafter\n");
        assert!(html.contains("language-foobar123"));
        assert!(!html.contains("<p>first"));
        assert!(!html.contains("<pre><code>    second"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn test_routes() {
        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let pipeline = ContentPipeline::new(&config, &highlighter);

        let mut post = pipeline
            .parse(Path::new("content/code/hello.md"), "hi", ContentKind::Post)
            .unwrap();
        assign_post_route(&mut post, "code").unwrap();
        assert_eq!(post.url, "/code/hello/");
        assert_eq!(post.collection, "code");
        assert!(post.section.is_empty());

        let mut home = pipeline
            .parse(Path::new("theme/sections/home.md"), "hi", ContentKind::Page)
            .unwrap();
        assign_page_route(&mut home).unwrap();
        assert_eq!(home.url, "/");
        assert!(home.section.is_empty());

        let mut about = pipeline
            .parse(Path::new("theme/sections/about.md"), "hi", ContentKind::Page)
            .unwrap();
        assign_page_route(&mut about).unwrap();
        assert_eq!(about.url, "/about/");
        assert_eq!(about.section, "about");
    }
}

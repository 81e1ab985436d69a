use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tera::Context;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::assets;
use crate::config::SiteConfig;
use crate::content::{
    ContentItem, ContentKind, ContentPipeline, ContentReadError, ItemView, assign_page_route,
    assign_post_route,
};
use crate::expand::{
    DirectiveExpander, ResolvedBodies, collection_views, list_views, resolve_local, resolved_view,
};
use crate::highlight::SyntectHighlighter;
use crate::store::{CollectionStore, StoreBuilder};
use crate::template::{TeraEngine, TemplateEngine, TemplateError};

pub const FEED_TEMPLATE: &str = "feed.xml";
pub const SEARCH_TEMPLATE: &str = "search.json";

const TEMPLATES_DIR: &str = "templates";
const SECTIONS_DIR: &str = "sections";
const ASSETS_DIR: &str = "assets";
const EXAMPLES_DIR: &str = "examples";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Content directory not readable: {0}")]
    ContentRoot(PathBuf),
    #[error("Template directory not readable: {0}")]
    TemplateRoot(PathBuf),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The six build phases, run strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Clean,
    Collect,
    RenderPosts,
    RenderPages,
    GenerateDerived,
    CopyAssets,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::Clean => "Cleaning output directory",
            BuildPhase::Collect => "Collecting posts and pages",
            BuildPhase::RenderPosts => "Rendering posts",
            BuildPhase::RenderPages => "Rendering pages",
            BuildPhase::GenerateDerived => "Generating feed & search",
            BuildPhase::CopyAssets => "Copying static assets",
        };
        f.write_str(name)
    }
}

/// Something the build left out, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    pub posts: usize,
    pub pages: usize,
    pub skipped: Vec<SkippedItem>,
}

impl BuildReport {
    /// Derived outputs are optional: a theme without the template just
    /// doesn't get that file.
    fn skip_derived(&mut self, path: &Path, error: TemplateError) {
        if error.is_not_found() {
            debug!("No template for {}: {}", path.display(), error);
        } else {
            self.skip(path, error);
        }
    }

    fn skip(&mut self, path: &Path, reason: impl fmt::Display) {
        warn!("Skipping {}: {}", path.display(), reason);
        self.skipped.push(SkippedItem {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}

pub struct SiteBuilder {
    content_dir: PathBuf,
    theme_dir: PathBuf,
    output_dir: PathBuf,
    examples_dir: Option<PathBuf>,
    config: SiteConfig,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            content_dir: PathBuf::from("./content"),
            theme_dir: PathBuf::from("./theme"),
            output_dir: PathBuf::from("./build"),
            examples_dir: None,
            config: SiteConfig::default(),
        }
    }

    pub fn content_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.content_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn theme_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.theme_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    /// Directory copied to `<output>/examples`, backing `[example:N]` viewers.
    pub fn examples_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.examples_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn site_config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    /// Checks both roots and loads the theme templates.
    pub fn build(self) -> Result<Site, BuildError> {
        if !self.content_dir.is_dir() {
            return Err(BuildError::ContentRoot(self.content_dir));
        }

        let templates_dir = self.theme_dir.join(TEMPLATES_DIR);
        if !templates_dir.is_dir() {
            return Err(BuildError::TemplateRoot(templates_dir));
        }
        let engine = TeraEngine::new(&templates_dir)?;

        Ok(Site {
            highlighter: SyntectHighlighter::new(&self.config.highlight.theme),
            engine: Box::new(engine),
            content_dir: self.content_dir,
            theme_dir: self.theme_dir,
            output_dir: self.output_dir,
            examples_dir: self.examples_dir,
            config: self.config,
        })
    }
}

/// Output file for a url: `<output>/<url>/index.html`, or the output root
/// itself for `/`.
pub fn output_path(output_dir: &Path, url: &str) -> PathBuf {
    let trimmed = url.trim_matches('/');
    if trimmed.is_empty() {
        output_dir.join("index.html")
    } else {
        output_dir.join(trimmed).join("index.html")
    }
}

/// `*.md` directly inside `dir`, sorted by file name.
fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file() && e.path().extension().map(|ext| ext == "md").unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}

/// Every post and page, read once. The store is complete before any
/// directive is expanded against it.
pub struct Collected {
    pub store: CollectionStore,
    pub pages: Vec<ContentItem>,
}

pub struct Site {
    highlighter: SyntectHighlighter,
    engine: Box<dyn TemplateEngine>,
    content_dir: PathBuf,
    theme_dir: PathBuf,
    output_dir: PathBuf,
    examples_dir: Option<PathBuf>,
    config: SiteConfig,
}

impl Site {
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs every phase and reports what was produced and skipped.
    pub fn render_all(&self) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();

        self.enter(BuildPhase::Clean);
        assets::clean_output_dir(&self.output_dir)?;

        self.enter(BuildPhase::Collect);
        let collected = self.collect(&mut report);

        self.enter(BuildPhase::RenderPosts);
        // Listings rendered inside posts show bodies with their own shortcodes
        // resolved and nested listing directives dropped.
        let mut bodies: ResolvedBodies = collected
            .store
            .all_posts()
            .into_iter()
            .chain(&collected.pages)
            .map(|item| (item.url.clone(), resolve_local(item)))
            .collect();
        let mut post_bodies = ResolvedBodies::new();
        {
            let base = self.base_context(&collected, &bodies);
            let expander =
                DirectiveExpander::new(&collected.store, self.engine.as_ref(), &self.config, &bodies);
            for (_, posts) in collected.store.collections() {
                for post in posts {
                    if let Some(body) = self.render_item(post, &expander, &base, &mut report) {
                        post_bodies.insert(post.url.clone(), body);
                        report.posts += 1;
                    }
                }
            }
        }

        self.enter(BuildPhase::RenderPages);
        // From here on every consumer sees the fully expanded post bodies
        bodies.extend(post_bodies);
        let base = self.base_context(&collected, &bodies);
        let expander =
            DirectiveExpander::new(&collected.store, self.engine.as_ref(), &self.config, &bodies);
        for page in &collected.pages {
            if self.render_item(page, &expander, &base, &mut report).is_some() {
                report.pages += 1;
            }
        }

        self.enter(BuildPhase::GenerateDerived);
        self.generate_feed(&collected.store, &bodies, &mut report);
        self.generate_search_index(&collected.store, &bodies, &mut report);

        self.enter(BuildPhase::CopyAssets);
        self.copy_static_files(&mut report);

        info!(
            "Build complete! Posts: {}, Pages: {}, Skipped: {}",
            report.posts,
            report.pages,
            report.skipped.len()
        );

        Ok(report)
    }

    fn enter(&self, phase: BuildPhase) {
        info!("{}", phase);
    }

    /// Reads every configured collection and the theme's section pages.
    pub fn collect(&self, report: &mut BuildReport) -> Collected {
        let mut jobs: Vec<(PathBuf, Option<&str>)> = Vec::new();

        for name in &self.config.sections {
            let dir = self.content_dir.join(name);
            if !dir.is_dir() {
                debug!("No directory for collection {}", name);
                continue;
            }
            jobs.extend(markdown_files(&dir).into_iter().map(|p| (p, Some(name.as_str()))));
        }

        let sections_dir = self.theme_dir.join(SECTIONS_DIR);
        if sections_dir.is_dir() {
            jobs.extend(markdown_files(&sections_dir).into_iter().map(|p| (p, None)));
        } else {
            warn!("Sections directory not found: {}", sections_dir.display());
        }

        let pipeline = ContentPipeline::new(&self.config, &self.highlighter);
        let parsed: Vec<(PathBuf, Result<ContentItem, ContentReadError>)> = jobs
            .into_par_iter()
            .map(|(path, collection)| {
                let result = match collection {
                    Some(name) => pipeline.read(&path, ContentKind::Post).and_then(|mut item| {
                        assign_post_route(&mut item, name)?;
                        Ok(item)
                    }),
                    None => pipeline.read(&path, ContentKind::Page).and_then(|mut item| {
                        assign_page_route(&mut item)?;
                        Ok(item)
                    }),
                };
                (path, result)
            })
            .collect();

        let mut store = StoreBuilder::new(self.config.sections.iter().cloned());
        let mut pages = Vec::new();
        for (path, result) in parsed {
            match result {
                Ok(item) if item.kind == ContentKind::Post => store.push(item),
                Ok(item) => pages.push(item),
                Err(e) => report.skip(&path, e),
            }
        }

        let store = store.finish();
        debug!("Collected {} posts and {} pages", store.len(), pages.len());

        Collected { store, pages }
    }

    /// Context shared by every page render; `page` is added per item.
    fn base_context(&self, collected: &Collected, bodies: &ResolvedBodies) -> Context {
        let images = &self.config.assets.images;
        let css = &self.config.templates.css;

        let mut context = Context::new();
        context.insert("site", &self.config);
        context.insert("posts", &collection_views(&collected.store, bodies));
        let pages: Vec<ItemView> = collected
            .pages
            .iter()
            .map(|page| resolved_view(page, bodies))
            .collect();
        context.insert("pages", &pages);
        context.insert(
            "all_posts",
            &list_views(&collected.store.recent(self.config.post_limit), bodies),
        );
        context.insert("use_base_tag", &true);
        context.insert("base_url", &self.config.base_url());
        context.insert("domain", &self.config.domain());
        context.insert("folder", "");
        context.insert("asset", "/assets");
        context.insert("css", &format!("/assets/{}", css));
        context.insert(
            "js",
            &format!("/assets/{}", Path::new(css).with_extension("js").display()),
        );
        context.insert("logo", &format!("/assets/{}", images.logo));
        context.insert("favicon", &format!("/assets/{}", images.favicon));
        context.insert("asset_urls", &self.config.scripts.asset_urls());
        context.insert("now", &chrono::Local::now().to_rfc3339());
        context
    }

    /// Expands and writes one post or page. Returns its final body, or `None`
    /// if it was skipped.
    fn render_item(
        &self,
        item: &ContentItem,
        expander: &DirectiveExpander,
        base: &Context,
        report: &mut BuildReport,
    ) -> Option<String> {
        let body = match expander.expand(item) {
            Ok(body) => body,
            Err(e) => {
                report.skip(&item.source, e);
                return None;
            }
        };

        let mut context = base.clone();
        context.insert("page", &item.view(&body));

        let out = output_path(&self.output_dir, &item.url);
        match self
            .engine
            .render_to_file(&self.config.templates.main, &context, &out)
        {
            Ok(()) => {
                debug!("Rendered {} -> {}", item.source.display(), out.display());
                Some(body)
            }
            Err(e) => {
                report.skip(&item.source, e);
                None
            }
        }
    }

    pub fn generate_feed(
        &self,
        store: &CollectionStore,
        bodies: &ResolvedBodies,
        report: &mut BuildReport,
    ) {
        let mut context = Context::new();
        context.insert("site", &self.config);
        context.insert(
            "posts",
            &list_views(&store.recent(self.config.feed_limit), bodies),
        );
        context.insert("now", &chrono::Local::now().to_rfc2822());

        let out = self.output_dir.join(FEED_TEMPLATE);
        if let Err(e) = self.engine.render_to_file(FEED_TEMPLATE, &context, &out) {
            report.skip_derived(&out, e);
        }
    }

    pub fn generate_search_index(
        &self,
        store: &CollectionStore,
        bodies: &ResolvedBodies,
        report: &mut BuildReport,
    ) {
        let mut context = Context::new();
        context.insert("site", &self.config);
        context.insert("posts", &list_views(&store.all_posts(), bodies));

        let out = self.output_dir.join(SEARCH_TEMPLATE);
        if let Err(e) = self.engine.render_to_file(SEARCH_TEMPLATE, &context, &out) {
            report.skip_derived(&out, e);
        }
    }

    fn copy_static_files(&self, report: &mut BuildReport) {
        let css = self.config.templates.css.as_str();
        let assets_src = self.theme_dir.join(ASSETS_DIR);
        if assets_src.is_dir() {
            let assets_dst = self.output_dir.join(ASSETS_DIR);
            match assets::copy_tree(&assets_src, &assets_dst, &[css]) {
                Ok(count) => debug!("Copied {} asset files", count),
                Err(e) => report.skip(&assets_src, e),
            }
        }

        if let Some(examples_src) = self.examples_dir.as_ref().filter(|p| p.is_dir()) {
            let examples_dst = self.output_dir.join(EXAMPLES_DIR);
            if let Err(e) = assets::copy_tree(examples_src, &examples_dst, &[]) {
                report.skip(examples_src, e);
            }
        }

        if let Err(e) =
            assets::generate_css(self.engine.as_ref(), css, &self.config.assets.fonts, &self.output_dir)
        {
            report.skip_derived(Path::new(css), e);
        }
    }
}

//! Resolves directive tokens left in a page body by [`crate::protect`].

use std::collections::HashMap;

use indexmap::IndexMap;
use tera::Context;

use crate::config::SiteConfig;
use crate::content::{ContentItem, ItemView};
use crate::protect::Directive;
use crate::store::CollectionStore;
use crate::template::{TemplateEngine, TemplateError};

pub const POSTS_TEMPLATE: &str = "posts.html";
pub const CATEGORY_TEMPLATE: &str = "category.html";
pub const ARCHIVE_TEMPLATE: &str = "archive.html";

/// Resolved body HTML by url. Listings show these in place of stored bodies.
pub type ResolvedBodies = HashMap<String, String>;

/// Posts of every collection as templates see them.
pub type CollectionViews<'a> = IndexMap<&'a str, Vec<ItemView<'a>>>;

/// Template view of `item`, using its resolved body when there is one.
pub fn resolved_view<'a>(item: &'a ContentItem, bodies: &'a ResolvedBodies) -> ItemView<'a> {
    match bodies.get(&item.url) {
        Some(body) => item.view(body),
        None => item.stored_view(),
    }
}

pub fn collection_views<'a>(
    store: &'a CollectionStore,
    bodies: &'a ResolvedBodies,
) -> CollectionViews<'a> {
    store
        .collections()
        .map(|(name, posts)| {
            let views = posts.iter().map(|post| resolved_view(post, bodies)).collect();
            (name, views)
        })
        .collect()
}

pub fn list_views<'a>(posts: &[&'a ContentItem], bodies: &'a ResolvedBodies) -> Vec<ItemView<'a>> {
    posts.iter().map(|post| resolved_view(post, bodies)).collect()
}

/// Replaces every token occurrence in one left-to-right pass. An occurrence
/// wrapped in `<p>..</p>` is replaced together with the paragraph, a bare one
/// on its own. Inserted text is never scanned again.
fn replace_tokens(html: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    loop {
        let next = replacements
            .iter()
            .filter_map(|(token, rendered)| rest.find(token).map(|at| (at, *token, rendered)))
            .min_by_key(|(at, token, _)| (*at, std::cmp::Reverse(token.len())));
        let Some((at, token, rendered)) = next else {
            out.push_str(rest);
            return out;
        };

        let mut before = &rest[..at];
        let mut after = &rest[at + token.len()..];
        if let (Some(b), Some(a)) = (before.strip_suffix("<p>"), after.strip_prefix("</p>")) {
            before = b;
            after = a;
        }

        out.push_str(before);
        out.push_str(rendered);
        rest = after;
    }
}

/// The body as it appears inside another page's listing: shortcodes
/// resolved, nested listing directives dropped, unknown tokens kept.
pub fn resolve_local(item: &ContentItem) -> String {
    let replacements: Vec<(&str, String)> = item
        .pending
        .iter()
        .filter_map(|(token, directive)| match directive {
            Directive::Example(id) => Some((token, example_viewer(id))),
            Directive::Posts | Directive::Category | Directive::Archive => {
                Some((token, String::new()))
            }
            Directive::Unrecognized(_) => None,
        })
        .collect();
    replace_tokens(&item.rendered_html, &replacements)
}

/// The placeholder `example:<id>` shortcodes turn into.
pub fn example_viewer(id: &str) -> String {
    format!(
        "<div class=\"example-viewer\" data-example-id=\"{}\"></div>",
        html_escape::encode_double_quoted_attribute(id)
    )
}

/// Section a category listing shows: the page's own section, or the last
/// segment of its url.
pub fn category_name(item: &ContentItem) -> String {
    if !item.section.is_empty() {
        return item.section.clone();
    }
    item.url
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Reads the finished store and renders directive blocks through the theme.
pub struct DirectiveExpander<'a> {
    store: &'a CollectionStore,
    engine: &'a dyn TemplateEngine,
    config: &'a SiteConfig,
    bodies: &'a ResolvedBodies,
}

impl<'a> DirectiveExpander<'a> {
    /// `bodies` supplies the post bodies listings show; posts missing from it
    /// fall back to their stored body.
    pub fn new(
        store: &'a CollectionStore,
        engine: &'a dyn TemplateEngine,
        config: &'a SiteConfig,
        bodies: &'a ResolvedBodies,
    ) -> Self {
        Self {
            store,
            engine,
            config,
            bodies,
        }
    }

    /// Final body HTML for `item`, every known directive token resolved.
    pub fn expand(&self, item: &ContentItem) -> Result<String, TemplateError> {
        let mut replacements = Vec::with_capacity(item.pending.len());

        for (token, directive) in item.pending.iter() {
            match self.render_directive(directive, item)? {
                Some(rendered) => replacements.push((token, rendered)),
                None => {
                    tracing::debug!("leaving unrecognized directive {} in {}", directive, item.url)
                }
            }
        }

        Ok(replace_tokens(&item.rendered_html, &replacements))
    }

    fn render_directive(
        &self,
        directive: &Directive,
        item: &ContentItem,
    ) -> Result<Option<String>, TemplateError> {
        let rendered = match directive {
            Directive::Posts => self.render_posts()?,
            Directive::Category => self.render_category(item)?,
            Directive::Archive => self.render_archive()?,
            Directive::Example(id) => example_viewer(id),
            Directive::Unrecognized(_) => return Ok(None),
        };
        Ok(Some(rendered))
    }

    fn base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", self.config);
        context.insert("posts", &collection_views(self.store, self.bodies));
        context
    }

    fn render_posts(&self) -> Result<String, TemplateError> {
        let mut context = self.base_context();
        context.insert(
            "all_posts",
            &list_views(&self.store.recent(self.config.post_limit), self.bodies),
        );
        self.engine.render(POSTS_TEMPLATE, &context)
    }

    fn render_category(&self, item: &ContentItem) -> Result<String, TemplateError> {
        let mut context = self.base_context();
        let section = category_name(item);
        let mut page = resolved_view(item, self.bodies);
        page.section = &section;
        context.insert("page", &page);
        self.engine.render(CATEGORY_TEMPLATE, &context)
    }

    fn render_archive(&self) -> Result<String, TemplateError> {
        let mut context = self.base_context();
        context.insert("all_posts", &list_views(&self.store.all_posts(), self.bodies));
        self.engine.render(ARCHIVE_TEMPLATE, &context)
    }
}

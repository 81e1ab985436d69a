use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_POST_LIMIT: usize = 10;
pub const DEFAULT_FEED_LIMIT: usize = 10;

/// Site-wide settings shared by every stage of a build.
///
/// Every field has a default, so an empty or partial config file still
/// produces a usable site.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub post_limit: usize,
    pub feed_limit: usize,
    pub search_enabled: bool,
    pub base: BaseConfig,
    pub meta: MetaConfig,
    pub assets: AssetsConfig,
    pub links: BTreeMap<String, String>,
    pub sections: Vec<String>,
    pub rules: Vec<Rule>,
    pub scripts: ScriptsConfig,
    pub highlight: HighlightConfig,
    pub templates: TemplateNames,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            post_limit: DEFAULT_POST_LIMIT,
            feed_limit: DEFAULT_FEED_LIMIT,
            search_enabled: false,
            base: BaseConfig::default(),
            meta: MetaConfig::default(),
            assets: AssetsConfig::default(),
            links: BTreeMap::new(),
            sections: vec!["design".into(), "code".into(), "projects".into()],
            rules: Vec::new(),
            scripts: ScriptsConfig::default(),
            highlight: HighlightConfig::default(),
            templates: TemplateNames::default(),
        }
    }
}

impl SiteConfig {
    /// `https://<domain>[/<folder>]`
    pub fn base_url(&self) -> String {
        if self.base.folder.is_empty() {
            self.domain()
        } else {
            format!("{}/{}", self.domain(), self.base.folder)
        }
    }

    pub fn domain(&self) -> String {
        format!("https://{}", self.base.url)
    }

    /// Feature defaults contributed by every rule whose scope matches `path`.
    ///
    /// Rules are applied in order; a later matching rule overrides only the
    /// features it names.
    pub fn path_defaults(&self, path: &str) -> FeatureDefaults {
        self.rules
            .iter()
            .filter(|rule| !rule.scope.path.is_empty() && path.contains(&rule.scope.path))
            .fold(FeatureDefaults::default(), |acc, rule| acc.overlay(&rule.features))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct BaseConfig {
    pub url: String,
    pub folder: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            url: "localhost".into(),
            folder: String::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct MetaConfig {
    pub title: String,
    pub tagline: String,
    pub author: String,
    pub repository: String,
    pub license: String,
    pub locale: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".into(),
            tagline: "A simple blog".into(),
            author: "Anonymous".into(),
            repository: String::new(),
            license: String::new(),
            locale: "en".into(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AssetsConfig {
    pub images: ImagesConfig,
    pub fonts: Vec<FontConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ImagesConfig {
    pub logo: String,
    pub favicon: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            logo: "inkpot.ico".into(),
            favicon: "inkpot.ico".into(),
        }
    }
}

/// A font face entry. Anything besides `weight` is passed to the stylesheet
/// template untouched.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FontConfig {
    #[serde(default = "default_font_weight")]
    pub weight: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_font_weight() -> String {
    "Regular".into()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Rule {
    pub scope: RuleScope,
    pub features: FeatureDefaults,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RuleScope {
    /// Matched as a substring of the content file's path.
    pub path: String,
}

/// Per-feature overrides; `None` means "no opinion".
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureDefaults {
    pub toc: Option<bool>,
    pub comments: Option<bool>,
    pub mermaid: Option<bool>,
    pub codepen: Option<bool>,
    pub banner: Option<bool>,
    pub sidebar: Option<bool>,
}

impl FeatureDefaults {
    pub fn overlay(self, top: &FeatureDefaults) -> FeatureDefaults {
        FeatureDefaults {
            toc: top.toc.or(self.toc),
            comments: top.comments.or(self.comments),
            mermaid: top.mermaid.or(self.mermaid),
            codepen: top.codepen.or(self.codepen),
            banner: top.banner.or(self.banner),
            sidebar: top.sidebar.or(self.sidebar),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ScriptsConfig {
    pub lunr: String,
    pub mermaid: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            lunr: "2.3.9".into(),
            mermaid: "11.4.1".into(),
        }
    }
}

impl ScriptsConfig {
    pub fn asset_urls(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("lunr", format!("https://cdn.jsdelivr.net/npm/lunr@{}/+esm", self.lunr)),
            (
                "mermaid",
                format!("https://cdn.jsdelivr.net/npm/mermaid@{}/+esm", self.mermaid),
            ),
        ])
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct HighlightConfig {
    /// Name of a syntect default theme.
    pub theme: String,
    /// Escape code that falls back to the unhighlighted shell.
    pub escape_fallback: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".into(),
            escape_fallback: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TemplateNames {
    pub main: String,
    pub css: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            main: "page.html".into(),
            css: "site.css".into(),
        }
    }
}

//! Shields fragile sub-languages from the markdown parser.
//!
//! Include directives, `[example:N]` shortcodes and mermaid fences are swapped
//! for opaque tokens before markdown runs. Mermaid bodies are put back by
//! [`restore_diagrams`] right after parsing; directives wait for the
//! [`crate::expand`] stage because they need the whole post collection.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

pub const POSTS_TOKEN: &str = "INCLUDE_POSTS_PLACEHOLDER";
pub const CATEGORY_TOKEN: &str = "INCLUDE_CATEGORY_PLACEHOLDER";
pub const ARCHIVE_TOKEN: &str = "INCLUDE_ARCHIVE_PLACEHOLDER";

const EXAMPLE_TOKEN_PREFIX: &str = "EXAMPLE_PLACEHOLDER_";
const DIAGRAM_TOKEN_PREFIX: &str = "MERMAID_PLACEHOLDER_";

pub const DIAGRAM_CLASS: &str = "language-mermaid";

static EXAMPLE_SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[example:(\d+)\]").expect("valid shortcode pattern"));

static DIAGRAM_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```mermaid\n(.*?)```").expect("valid diagram pattern"));

/// What a placeholder token stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Posts,
    Category,
    Archive,
    Example(String),
    /// A kind this build does not know how to render. Left in place.
    Unrecognized(String),
}

impl Directive {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "posts" => Directive::Posts,
            "category" => Directive::Category,
            "archive" => Directive::Archive,
            other => match other.strip_prefix("example:") {
                Some(id) => Directive::Example(id.to_string()),
                None => Directive::Unrecognized(other.to_string()),
            },
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Posts => write!(f, "posts"),
            Directive::Category => write!(f, "category"),
            Directive::Archive => write!(f, "archive"),
            Directive::Example(id) => write!(f, "example:{}", id),
            Directive::Unrecognized(kind) => write!(f, "{}", kind),
        }
    }
}

/// Token → directive, in discovery order. The first registration of a token
/// wins; later ones collapse into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDirectives {
    entries: IndexMap<String, Directive>,
}

impl PendingDirectives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `token` was already registered.
    pub fn register(&mut self, token: impl Into<String>, directive: Directive) -> bool {
        let token = token.into();
        if self.entries.contains_key(&token) {
            return false;
        }
        self.entries.insert(token, directive);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Directive)> {
        self.entries.iter().map(|(token, directive)| (token.as_str(), directive))
    }

    pub fn get(&self, token: &str) -> Option<&Directive> {
        self.entries.get(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Markdown with every protected region swapped out, plus what is needed to
/// put them back.
#[derive(Debug, Clone, Default)]
pub struct Protected {
    pub text: String,
    pub directives: PendingDirectives,
    pub diagrams: Vec<String>,
}

/// Runs all three extractions in order: includes, shortcodes, diagrams.
pub fn protect(markdown: &str) -> Protected {
    let mut directives = PendingDirectives::new();
    let text = extract_includes(markdown, &mut directives);
    let text = extract_examples(&text, &mut directives);
    let (text, diagrams) = extract_diagrams(&text);

    Protected {
        text,
        directives,
        diagrams,
    }
}

/// The three include markers, each accepted in trimming and plain form.
const INCLUDE_MARKERS: [(&str, &str, &str); 3] = [
    ("posts", "posts.html", POSTS_TOKEN),
    ("category", "category.html", CATEGORY_TOKEN),
    ("archive", "archive.html", ARCHIVE_TOKEN),
];

pub fn extract_includes(content: &str, directives: &mut PendingDirectives) -> String {
    let mut content = content.to_string();

    for (kind, template, token) in INCLUDE_MARKERS {
        let trimmed = format!("{{%- include {} -%}}", template);
        let plain = format!("{{% include {} %}}", template);

        if content.contains(&trimmed) || content.contains(&plain) {
            directives.register(token, Directive::parse(kind));
            content = content.replace(&trimmed, token).replace(&plain, token);
        }
    }

    content
}

/// Every shortcode occurrence gets its own token, padded with blank lines so
/// it becomes a paragraph of its own.
pub fn extract_examples(content: &str, directives: &mut PendingDirectives) -> String {
    let mut counter = 0usize;

    EXAMPLE_SHORTCODE
        .replace_all(content, |caps: &Captures| {
            let id = &caps[1];
            let token = format!("{}{}_{}", EXAMPLE_TOKEN_PREFIX, counter, id);
            counter += 1;
            directives.register(token.clone(), Directive::Example(id.to_string()));
            format!("\n\n{}\n\n", token)
        })
        .into_owned()
}

/// Pulls out ```` ```mermaid ```` fences. A fence without a closing fence is
/// left as ordinary markdown.
pub fn extract_diagrams(content: &str) -> (String, Vec<String>) {
    let mut diagrams = Vec::new();

    let text = DIAGRAM_BLOCK
        .replace_all(content, |caps: &Captures| {
            diagrams.push(caps[1].to_string());
            format!("\n\n{}{}\n\n", DIAGRAM_TOKEN_PREFIX, diagrams.len() - 1)
        })
        .into_owned();

    (text, diagrams)
}

/// Swaps each `<p>MERMAID_PLACEHOLDER_n</p>` for a code shell holding the raw
/// diagram source.
pub fn restore_diagrams(html: &str, diagrams: &[String]) -> String {
    let mut html = html.to_string();
    for (i, source) in diagrams.iter().enumerate() {
        html = html.replace(
            &format!("<p>{}{}</p>", DIAGRAM_TOKEN_PREFIX, i),
            &format!("<pre><code class=\"{}\">{}</code></pre>", DIAGRAM_CLASS, source),
        );
    }
    html
}

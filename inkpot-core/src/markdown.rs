use std::collections::HashSet;
use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};
use regex::{Captures, Regex};
use serde::Serialize;

pub const INLINE_CODE_CLASS: &str = "language-plaintext highlighter-rouge";

static OPEN_CODE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<code>(</code>)?").expect("valid code tag pattern"));

static ANCHOR_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid separator pattern"));

/// One heading, as listed in a page's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u32,
    pub title: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Markdown extras: tables, footnotes, strikethrough, `{#id}` heading
/// attributes and definition lists.
fn extra_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
}

/// Converts markdown to HTML with heading anchors, then tags inline code.
pub fn render_markdown(content: &str) -> Rendered {
    let mut events: Vec<Event> = Parser::new_ext(content, extra_options()).collect();
    let toc = assign_heading_ids(&mut events);

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());

    Rendered {
        html: add_inline_code_classes(&out),
        toc,
    }
}

/// Gives every heading an id (keeping explicit `{#id}` ones) and returns the
/// resulting table of contents.
fn assign_heading_ids(events: &mut [Event]) -> Vec<TocEntry> {
    let mut toc = Vec::new();
    // Explicit ids are reserved up front so generated ones never reuse them
    let mut seen: HashSet<String> = events
        .iter()
        .filter_map(|event| match event {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();
    let mut i = 0;

    while i < events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = *level as u32;

        // Collect the heading text up to its end tag
        let mut text = String::new();
        let mut j = i + 1;
        while j < events.len() {
            match &events[j] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            j += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            let anchor = match id {
                Some(explicit) => explicit.to_string(),
                None => unique_anchor(heading_anchor(&text), &mut seen),
            };
            *id = Some(anchor.clone().into());
            toc.push(TocEntry {
                level,
                title: text,
                anchor,
            });
        }

        i = j + 1;
    }

    toc
}

/// Appends `_1`, or bumps an existing `_N` suffix, until `anchor` is unused.
fn unique_anchor(mut anchor: String, seen: &mut HashSet<String>) -> String {
    while anchor.is_empty() || seen.contains(&anchor) {
        anchor = match anchor.rsplit_once('_') {
            Some((stem, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                match n.parse::<u64>() {
                    Ok(n) => format!("{}_{}", stem, n + 1),
                    Err(_) => format!("{}_1", anchor),
                }
            }
            _ => format!("{}_1", anchor),
        };
    }
    seen.insert(anchor.clone());
    anchor
}

/// Heading text as an anchor: word characters, whitespace and dashes kept,
/// trimmed, lowercased, and each run of dashes or whitespace turned into
/// one dash. Unlike [`slugify`], underscores survive.
pub fn heading_anchor(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let lowered = kept.trim().to_lowercase();
    ANCHOR_SEPARATORS.replace_all(&lowered, "-").into_owned()
}

/// Lowercase, alphanumerics kept, spaces and dashes collapsed to single
/// dashes.
pub fn slugify(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .collect();

    cleaned
        .split([' ', '-'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Adds the plaintext class to `<code>` tags that hold something. Empty
/// `<code></code>` pairs are left alone.
pub fn add_inline_code_classes(html: &str) -> String {
    OPEN_CODE_TAG
        .replace_all(html, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!("<code class=\"{}\">", INLINE_CODE_CLASS)
            }
        })
        .into_owned()
}

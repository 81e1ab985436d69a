use std::sync::LazyLock;

use regex::{Captures, Regex};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use thiserror::Error;

use crate::config::HighlightConfig;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").expect("valid fence pattern"));

pub const OUTER_CLASS: &str = "highlighter-rouge";
pub const INNER_CLASS: &str = "highlight";

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
    #[error("unknown highlight theme: {0}")]
    UnknownTheme(String),
    #[error("highlighting failed: {0}")]
    Engine(#[from] syntect::Error),
}

/// Turns a code sample into HTML. An empty `lang` means plain text.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, code: &str, lang: &str) -> Result<String, HighlightError>;
}

pub struct SyntectHighlighter {
    theme: String,
}

impl SyntectHighlighter {
    pub fn new<S: Into<String>>(theme: S) -> Self {
        Self { theme: theme.into() }
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new(HighlightConfig::default().theme)
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, lang: &str) -> Result<String, HighlightError> {
        let syntax = if lang.is_empty() {
            Some(SYNTAX_SET.find_syntax_plain_text())
        } else {
            SYNTAX_SET.find_syntax_by_token(lang)
        };
        let syntax = syntax.ok_or_else(|| HighlightError::UnknownLanguage(lang.to_string()))?;

        let theme = THEME_SET
            .themes
            .get(&self.theme)
            .ok_or_else(|| HighlightError::UnknownTheme(self.theme.clone()))?;

        Ok(highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme)?)
    }
}

/// Rewrites every fenced block in raw markdown into finished HTML, so the
/// markdown parser never sees the code itself.
pub fn highlight_code_blocks(
    content: &str,
    highlighter: &dyn Highlighter,
    escape_fallback: bool,
) -> String {
    CODE_BLOCK
        .replace_all(content, |caps: &Captures| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let code = &caps[2];

            let html = match highlighter.highlight(code, lang) {
                Ok(highlighted) => format!(
                    "<div class=\"{}\"><div class=\"{}\">{}</div></div>",
                    OUTER_CLASS, INNER_CLASS, highlighted
                ),
                Err(e) => {
                    tracing::debug!("falling back to plain code block: {}", e);
                    fallback_block(code, lang, escape_fallback)
                }
            };

            keep_html_block_open(&html)
        })
        .into_owned()
}

fn fallback_block(code: &str, lang: &str, escape: bool) -> String {
    let lang = if lang.is_empty() { "text" } else { lang };
    let body = if escape {
        html_escape::encode_text(code).into_owned()
    } else {
        code.to_string()
    };

    format!(
        "<div class=\"{}\"><div class=\"{}\"><pre><code class=\"language-{}\">{}</code></pre></div></div>",
        OUTER_CLASS, INNER_CLASS, lang, body
    )
}

/// A blank line ends a CommonMark HTML block, which would drop the rest of
/// the code back into markdown. Blank lines get an empty span instead.
fn keep_html_block_open(html: &str) -> String {
    html.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                format!("<span></span>{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_language_is_wrapped() {
        let highlighter = SyntectHighlighter::default();
        let out = highlight_code_blocks("```rust\nfn main() {}\n```\n", &highlighter, true);

        assert!(out.starts_with("<div class=\"highlighter-rouge\"><div class=\"highlight\"><pre"));
        assert!(out.contains("main"));
        assert!(!out.contains("```"));
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let highlighter = SyntectHighlighter::default();
        let out = highlight_code_blocks("```foobar123\nlet x = 1;\n```\n", &highlighter, true);

        assert!(out.contains("language-foobar123"));
        assert!(out.contains("let x = 1;"));
    }

    #[test]
    fn test_fallback_escapes_by_default() {
        let highlighter = SyntectHighlighter::default();
        let escaped = highlight_code_blocks("```foobar123\n<b>hi</b>\n```", &highlighter, true);
        assert!(escaped.contains("&lt;b&gt;hi&lt;/b&gt;"));

        let raw = highlight_code_blocks("```foobar123\n<b>hi</b>\n```", &highlighter, false);
        assert!(raw.contains("<code class=\"language-foobar123\"><b>hi</b>"));
    }

    #[test]
    fn test_languages_without_syntax_use_fallback() {
        let highlighter = SyntectHighlighter::default();
        for lang in ["toml", "nix"] {
            let fence = format!("```{}\nkey = \"value\"\n```", lang);
            let out = highlight_code_blocks(&fence, &highlighter, true);
            assert!(out.contains(&format!("<pre><code class=\"language-{}\">", lang)), "{}", out);
            assert!(out.contains("key = &quot;value&quot;") || out.contains("key = \"value\""));
        }
    }

    #[test]
    fn test_direct_unknown_language_error() {
        let highlighter = SyntectHighlighter::default();
        let err = highlighter.highlight("x", "foobar123").unwrap_err();
        assert!(matches!(err, HighlightError::UnknownLanguage(lang) if lang == "foobar123"));
    }

    #[test]
    fn test_untagged_fence_is_plain_text() {
        let highlighter = SyntectHighlighter::default();
        let out = highlight_code_blocks("```\nplain words\n```", &highlighter, true);
        assert!(out.contains("plain words"));
        assert!(out.contains(OUTER_CLASS));
    }

    #[test]
    fn test_blank_lines_do_not_survive() {
        let html = keep_html_block_open("<pre>a\n\n  \nb</pre>");
        assert_eq!(html, "<pre>a\n<span></span>\n<span></span>  \nb</pre>");
        assert!(!html.split('\n').any(|line| line.trim().is_empty()));
    }

    #[test]
    fn test_text_outside_fences_untouched() {
        let highlighter = SyntectHighlighter::default();
        let text = "no code here\n\njust `inline`\n";
        assert_eq!(highlight_code_blocks(text, &highlighter, true), text);
    }
}

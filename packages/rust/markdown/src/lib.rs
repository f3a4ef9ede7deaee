//! Markdown-to-HTML conversion with a lossless fallback.
//!
//! Conversion is an injectable capability: [`HtmlConverter`] has a real
//! CommonMark implementation and an [`Unavailable`] one. Callers go through
//! [`to_html_or_fallback`], which never fails: any converter error degrades to
//! an escaped `<pre>` block.

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, html};
use tracing::debug;

use docforge_shared::{ConverterKind, DocForgeError, Result};

// ---------------------------------------------------------------------------
// Converter capability
// ---------------------------------------------------------------------------

/// Converts Markdown text to an HTML fragment.
pub trait HtmlConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Convert `markdown` to HTML.
    fn convert(&self, markdown: &str) -> Result<String>;
}

/// Converter that is never available; every call takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl HtmlConverter for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn convert(&self, _markdown: &str) -> Result<String> {
        Err(DocForgeError::Conversion(
            "no Markdown converter configured".into(),
        ))
    }
}

/// CommonMark converter backed by `pulldown-cmark`, with tables and
/// strikethrough enabled.
///
/// Headings get an `id` computed by [`heading_anchor`] from their source
/// text, markup included, so the links written by the document TOC resolve
/// inside the rendered HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl HtmlConverter for CommonMark {
    fn name(&self) -> &'static str {
        "commonmark"
    }

    fn convert(&self, markdown: &str) -> Result<String> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut events: Vec<Event<'_>> = Vec::new();
        let mut heading: Option<(HeadingLevel, String, Vec<Event<'_>>)> = None;

        for (event, range) in Parser::new_ext(markdown, options).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading(level, None, _)) if heading.is_none() => {
                    let text = heading_source_text(&markdown[range]);
                    heading = Some((level, text, Vec::new()));
                }
                Event::End(Tag::Heading(..)) if heading.is_some() => {
                    if let Some((level, text, inner)) = heading.take() {
                        events.push(Event::Html(CowStr::from(heading_html(level, &text, inner))));
                    }
                }
                event => match heading.as_mut() {
                    Some((_, _, inner)) => inner.push(event),
                    None => events.push(event),
                },
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        Ok(out)
    }
}

/// Heading text as written, markup included: `"# 1 *Fast* path #"` gives
/// `"1 *Fast* path"`. Setext underlines are dropped.
fn heading_source_text(source: &str) -> String {
    let source = source.trim();
    if let Some(rest) = source.strip_prefix('#') {
        let text = rest.trim_start_matches('#').trim();
        let unclosed = text.trim_end_matches('#');
        if unclosed.is_empty() || unclosed.ends_with([' ', '\t']) {
            return unclosed.trim_end().to_string();
        }
        return text.to_string();
    }

    let mut lines: Vec<&str> = source.lines().map(str::trim).collect();
    let is_underline = |line: &&str| {
        !line.is_empty() && (line.chars().all(|c| c == '=') || line.chars().all(|c| c == '-'))
    };
    if lines.len() > 1 && lines.last().is_some_and(is_underline) {
        lines.pop();
    }
    lines.join(" ")
}

/// Render a heading whose anchor is derived from its source `text`.
fn heading_html(level: HeadingLevel, text: &str, inner: Vec<Event<'_>>) -> String {
    let tag = heading_tag(level);
    let mut out = format!("<{tag} id=\"{}\">", escape_attr(&heading_anchor(text)));
    html::push_html(&mut out, inner.into_iter());
    out.push_str(&format!("</{tag}>\n"));
    out
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Build the converter selected in configuration.
pub fn converter_for(kind: ConverterKind) -> Box<dyn HtmlConverter> {
    match kind {
        ConverterKind::Commonmark => Box::new(CommonMark),
        ConverterKind::None => Box::new(Unavailable),
    }
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

/// Navigation anchor for a numbered heading such as `"1.2 Getting Started"`.
///
/// Lowercases, turns each space into `-` and removes every `.`. Nothing else
/// is stripped and repeated hyphens are kept, so `"2.1 A  B"` gives `"21-a--b"`.
/// Lowercasing is Unicode-aware (`ß` stays `ß`, `İ` expands to two chars).
pub fn heading_anchor(heading_text: &str) -> String {
    heading_text
        .to_lowercase()
        .replace(' ', "-")
        .replace('.', "")
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Escape `text` and wrap it in `<pre>`.
///
/// `&` is escaped as well as `<` and `>` so the original text is recoverable
/// byte for byte from the output.
pub fn fallback_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<pre>{escaped}</pre>")
}

/// Convert with `converter`, absorbing any failure into [`fallback_html`].
pub fn to_html_or_fallback(converter: &dyn HtmlConverter, text: &str) -> String {
    match converter.convert(text) {
        Ok(html) => html,
        Err(e) => {
            debug!(converter = converter.name(), error = %e, "using <pre> fallback");
            fallback_html(text)
        }
    }
}

/// Wrap an HTML fragment in a minimal standalone UTF-8 page.
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_attr(title)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Content extraction: reduces raw HTML to what the oracle needs to see.
//!
//! Four pure reductions over the same lenient html5ever parse:
//! - [`plain_text`]: visible text, whitespace-collapsed
//! - [`structured_text`]: visible text with markdown-ish heading/list/emphasis markers
//! - [`interactive_elements`]: forms, controls, links and short instructions, one section each
//! - [`pruned_html`]: HTML reduced to an allow-list of structural/interactive tags
//!
//! None of these fail: empty or garbage input yields an empty string.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

/// Tags whose text is never visible.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Tags stripped before structured extraction (media, embeds, metadata).
const MEDIA_TAGS: &[&str] = &[
    "meta", "img", "svg", "icon", "link", "code", "pre", "iframe", "object", "embed", "canvas",
    "map", "area", "base", "source", "track", "param", "picture", "audio", "video", "noscript",
];

/// Tags kept by [`pruned_html`].
const PRUNE_ALLOWED_TAGS: &[&str] = &[
    "a", "button", "form", "input", "label", "div", "span", "p", "ul", "ol", "li", "table", "tr",
    "td", "th", "tbody", "thead", "tfoot", "section", "article", "header", "footer", "h1", "h2",
    "h3", "h4", "h5", "h6", "b", "strong", "i", "em",
];

const VOID_TAGS: &[&str] = &["input", "br", "hr", "img", "meta", "link"];

/// Instruction blocks longer than this are layout containers, not instructions.
const INSTRUCTION_MAX_CHARS: usize = 300;

/// Full visible text of the document body, whitespace-collapsed.
///
/// Angle brackets never appear in the output, even when the source text
/// contained escaped ones.
pub fn plain_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    collect_visible_text(body_or_root(&document), &mut parts);
    let text = parts.join(" ").replace(['<', '>'], " ");
    collapse_whitespace(&text)
}

/// Visible text with heading, list and emphasis markers.
///
/// Scripts, styles and media elements are dropped. Each block ends up on its
/// own line; runs of blank lines and spaces are collapsed.
pub fn structured_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let mut out = String::new();
    write_structured(document.root_element(), &mut out);
    minimize_lines(&out)
}

/// Forms, buttons, inputs, textareas, selects, links and short text blocks,
/// serialized as `--- KIND ---` sections for action planning.
pub fn interactive_elements(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let mut sections = Sections::default();
    collect_sections(document.root_element(), &mut sections);

    let mut seen = HashSet::new();
    let combined: Vec<String> = sections
        .in_order()
        .filter(|s| seen.insert(s.clone()))
        .collect();
    minimize_lines(&combined.join("\n\n"))
}

/// Body HTML with only allow-listed tags kept.
///
/// Disallowed elements are replaced by their filtered children rather than
/// dropped, so text and nested links survive. Scripts and styles are the
/// exception: their contents are not page content.
pub fn pruned_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let mut out = String::from("<div>");
    for child in body_or_root(&document).children() {
        if let Some(element) = ElementRef::wrap(child) {
            write_pruned(element, &mut out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(&escape_text(text));
        }
    }
    out.push_str("</div>");
    out
}

// ── Shared helpers ──────────────────────────────────────────────────

fn body_or_root(document: &Html) -> ElementRef<'_> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "body")
        .unwrap_or_else(|| document.root_element())
}

fn collect_visible_text(element: ElementRef<'_>, parts: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if INVISIBLE_TAGS.contains(&child_element.value().name()) {
                continue;
            }
            collect_visible_text(child_element, parts);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
}

/// Text content of an element, ignoring invisible descendants.
fn element_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_visible_text(element, &mut parts);
    collapse_whitespace(&parts.join(" "))
}

/// Collapse every whitespace run (including newlines) to one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse spaces within lines and drop blank lines.
fn minimize_lines(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Structured text ─────────────────────────────────────────────────

fn write_structured(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();
    if INVISIBLE_TAGS.contains(&tag) || MEDIA_TAGS.contains(&tag) {
        return;
    }

    let mut inner = String::new();
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_structured(child_element, &mut inner);
        } else if let Some(text) = child.value().as_text() {
            inner.push_str(text);
        }
    }
    if inner.trim().is_empty() {
        return;
    }

    match tag {
        "h1" => out.push_str(&format!("\n# {}\n", inner.trim())),
        "h2" => out.push_str(&format!("\n## {}\n", inner.trim())),
        "h3" => out.push_str(&format!("\n### {}\n", inner.trim())),
        "b" | "strong" => out.push_str(&format!("**{}**", inner.trim())),
        "i" | "em" => out.push_str(&format!("*{}*", inner.trim())),
        "li" => out.push_str(&format!("\n- {}\n", inner.trim())),
        "p" | "div" | "section" | "article" | "tr" | "br" => {
            out.push_str(&format!("\n{}\n", inner))
        }
        _ => out.push_str(&inner),
    }
}

// ── Interactive sections ────────────────────────────────────────────

#[derive(Default)]
struct Sections {
    forms: Vec<String>,
    buttons: Vec<String>,
    inputs: Vec<String>,
    textareas: Vec<String>,
    selects: Vec<String>,
    links: Vec<String>,
    instructions: Vec<String>,
}

impl Sections {
    fn in_order(self) -> impl Iterator<Item = String> {
        self.forms
            .into_iter()
            .chain(self.buttons)
            .chain(self.inputs)
            .chain(self.textareas)
            .chain(self.selects)
            .chain(self.links)
            .chain(self.instructions)
    }
}

fn collect_sections(element: ElementRef<'_>, sections: &mut Sections) {
    let value = element.value();
    let tag = value.name();
    if INVISIBLE_TAGS.contains(&tag) {
        return;
    }

    match tag {
        "form" => {
            let text = element_text(element);
            sections.forms.push(format!("--- FORM ---\n{text}"));
        }
        "button" => {
            let text = element_text(element);
            if !text.is_empty() {
                sections.buttons.push(format!("--- BUTTON ---\n{text}"));
            }
        }
        "input" => {
            let kind = value.attr("type").filter(|t| !t.is_empty()).unwrap_or("text");
            sections.inputs.push(format!(
                "--- INPUT ---\ntype: {kind}\nname: {}\nvalue: {}",
                value.attr("name").unwrap_or(""),
                value.attr("value").unwrap_or(""),
            ));
        }
        "textarea" => {
            sections.textareas.push(format!(
                "--- TEXTAREA ---\nname: {}\nvalue: {}",
                value.attr("name").unwrap_or(""),
                element_text(element),
            ));
        }
        "select" => {
            let options: Vec<String> = element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "option")
                .map(element_text)
                .collect();
            sections.selects.push(format!(
                "--- SELECT ---\nname: {}\noptions: {}",
                value.attr("name").unwrap_or(""),
                options.join(", "),
            ));
        }
        "a" => {
            let href = value.attr("href").unwrap_or("").trim();
            let text = element_text(element);
            if !href.is_empty() || !text.is_empty() {
                let mut section = String::from("--- LINK ---\n");
                if !text.is_empty() {
                    section.push_str(&text);
                    section.push('\n');
                }
                section.push_str(href);
                sections.links.push(section);
            }
        }
        "p" | "span" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let text = element_text(element);
            if !text.is_empty() && text.chars().count() <= INSTRUCTION_MAX_CHARS {
                sections.instructions.push(format!("--- INSTRUCTION ---\n{text}"));
            }
        }
        _ => {}
    }

    for child in element.children().filter_map(ElementRef::wrap) {
        collect_sections(child, sections);
    }
}

// ── Pruned HTML ─────────────────────────────────────────────────────

fn write_pruned(element: ElementRef<'_>, out: &mut String) {
    let value = element.value();
    let tag = value.name();
    if matches!(tag, "script" | "style" | "head" | "template") {
        return;
    }

    let allowed = PRUNE_ALLOWED_TAGS.contains(&tag);
    if allowed {
        out.push('<');
        out.push_str(tag);
        for (name, attr_value) in value.attrs() {
            out.push_str(&format!(" {}=\"{}\"", name, escape_attr(attr_value)));
        }
        out.push('>');
        if VOID_TAGS.contains(&tag) {
            return;
        }
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_pruned(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(&escape_text(text));
        }
    }

    if allowed {
        out.push_str(&format!("</{tag}>"));
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSUB_PAGE: &str = r#"
        <html>
          <head><title>Prefs</title><style>.x { color: red }</style></head>
          <body>
            <h1>Email preferences</h1>
            <p>Click the button below to <b>unsubscribe</b>.</p>
            <script>var tracking = "<secret>";</script>
            <form action="/unsub" method="post">
              <input type="hidden" name="token" value="abc123">
              <input name="email" value="me@example.com">
              <select name="reason"><option>Too many</option><option>Not relevant</option></select>
              <button type="submit">Unsubscribe</button>
            </form>
            <a href="https://example.com/help">Help</a>
            <img src="logo.png">
          </body>
        </html>"#;

    // ── plain_text ──────────────────────────────────────────────────

    #[test]
    fn plain_text_collapses_whitespace() {
        assert_eq!(plain_text("<p>  Hello \n\n  World  </p>"), "Hello World");
    }

    #[test]
    fn plain_text_skips_scripts_and_styles() {
        let text = plain_text(UNSUB_PAGE);
        assert!(text.contains("Email preferences"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Prefs"));
    }

    #[test]
    fn plain_text_never_contains_angle_brackets() {
        for html in [
            UNSUB_PAGE,
            "<p>1 &lt; 2 &gt; 0</p>",
            "<div><unclosed <b>bold",
            "just > some < text",
            "<<<>>>",
        ] {
            let text = plain_text(html);
            assert!(!text.contains('<') && !text.contains('>'), "{html} -> {text}");
            assert!(!text.contains("  "), "double space in {text}");
        }
    }

    #[test]
    fn plain_text_empty_input() {
        assert_eq!(plain_text(""), "");
        assert_eq!(plain_text("   \n"), "");
    }

    #[test]
    fn plain_text_is_idempotent_on_plain_input() {
        let once = plain_text(UNSUB_PAGE);
        assert_eq!(plain_text(&once), once);
    }

    // ── structured_text ─────────────────────────────────────────────

    #[test]
    fn structured_text_keeps_markers() {
        let text = structured_text(
            "<h1>Title</h1><h2>Sub</h2><ul><li>One</li><li>Two</li></ul><p><em>soft</em> and <strong>loud</strong></p>",
        );
        assert!(text.contains("# Title"));
        assert!(text.contains("## Sub"));
        assert!(text.contains("- One"));
        assert!(text.contains("- Two"));
        assert!(text.contains("*soft*"));
        assert!(text.contains("**loud**"));
    }

    #[test]
    fn structured_text_drops_media_and_scripts() {
        let text = structured_text(
            "<p>Hi</p><svg><text>icon</text></svg><script>alert(1)</script><pre>code</pre>",
        );
        assert_eq!(text, "Hi");
    }

    #[test]
    fn structured_text_tolerates_malformed_markup() {
        let text = structured_text("<div><p>open <b>bold</div></p></b>");
        assert!(text.contains("open"));
        assert!(text.contains("bold"));
    }

    // ── interactive_elements ────────────────────────────────────────

    #[test]
    fn interactive_elements_lists_controls() {
        let text = interactive_elements(UNSUB_PAGE);
        assert!(text.contains("--- FORM ---"));
        assert!(text.contains("--- BUTTON ---\nUnsubscribe"));
        assert!(text.contains("type: hidden\nname: token\nvalue: abc123"));
        assert!(text.contains("type: text\nname: email"));
        assert!(text.contains("options: Too many, Not relevant"));
        assert!(text.contains("--- LINK ---\nHelp\nhttps://example.com/help"));
        assert!(text.contains("--- INSTRUCTION ---\nEmail preferences"));
    }

    #[test]
    fn interactive_elements_orders_forms_before_links() {
        let text = interactive_elements(UNSUB_PAGE);
        let form = text.find("--- FORM ---").unwrap();
        let link = text.find("--- LINK ---").unwrap();
        assert!(form < link);
    }

    #[test]
    fn interactive_elements_deduplicates() {
        let text = interactive_elements("<a href='/x'>Go</a><a href='/x'>Go</a>");
        assert_eq!(text.matches("--- LINK ---").count(), 1);
    }

    #[test]
    fn interactive_elements_skips_long_blocks() {
        let long = "word ".repeat(200);
        let text = interactive_elements(&format!("<div>{long}</div><p>Short one</p>"));
        assert!(text.contains("Short one"));
        assert!(!text.contains("word word word"));
    }

    // ── pruned_html ─────────────────────────────────────────────────

    #[test]
    fn pruned_html_keeps_allowed_and_unwraps_others() {
        let html = pruned_html(
            r#"<body><center><a href="https://x.test/u?id=1&amp;t=2">Unsubscribe</a></center><img src="a.png"></body>"#,
        );
        assert_eq!(
            html,
            r#"<div><a href="https://x.test/u?id=1&amp;t=2">Unsubscribe</a></div>"#
        );
    }

    #[test]
    fn pruned_html_never_drops_text_of_disallowed_wrappers() {
        let html = pruned_html("<body><font>Keep me <span>and me</span></font></body>");
        assert!(html.contains("Keep me"));
        assert!(html.contains("<span>and me</span>"));
        assert!(!html.contains("<font"));
    }

    #[test]
    fn pruned_html_drops_script_text() {
        let html = pruned_html("<body><p>Hello</p><script>var a = 1;</script></body>");
        assert_eq!(html, "<div><p>Hello</p></div>");
    }

    #[test]
    fn pruned_html_void_input() {
        let html = pruned_html(r#"<form><input name="e" value="a"></form>"#);
        assert!(html.contains(r#"<input name="e" value="a">"#) || html.contains(r#"<input value="a" name="e">"#));
        assert!(!html.contains("</input>"));
    }

    #[test]
    fn all_reductions_handle_empty_input() {
        assert_eq!(structured_text(""), "");
        assert_eq!(interactive_elements(""), "");
        assert_eq!(pruned_html(""), "");
    }
}

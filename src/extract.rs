use std::sync::LazyLock;
use std::time::Duration;

use html_parser::{Dom, Element, Node};
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;

pub const PDF_PLACEHOLDER: &str =
    "This is a PDF document. PDF extraction requires more complex handling.";

/// Elements whose content is never visible text.
static HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<template\b.*?</template\s*>",
    )
    .expect("hidden element pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("title pattern is valid")
});

/// Start or end tag; quoted attribute values may contain `>`.
static ELEMENT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([A-Za-z][A-Za-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("element tag pattern is valid")
});

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Start tags that end an open `<p>`.
const P_CLOSERS: [&str; 26] = [
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "main", "nav", "ol", "p", "pre", "section",
];

/// Elements a `<p>` cannot be closed through.
const P_SCOPE: [&str; 19] = [
    "article", "aside", "blockquote", "body", "button", "dd", "div", "figure", "footer",
    "form", "header", "html", "li", "main", "nav", "section", "table", "td", "th",
];

/// Elements with optional end tags: the element, the start tags that close
/// it, and the ancestors that stop the search.
const OPTIONAL_END: [(&str, &[&str], &[&str]); 8] = [
    ("p", &P_CLOSERS, &P_SCOPE),
    ("li", &["li"], &["ol", "ul", "menu"]),
    ("dt", &["dt", "dd"], &["dl"]),
    ("dd", &["dt", "dd"], &["dl"]),
    ("option", &["option", "optgroup"], &["select", "datalist"]),
    ("td", &["td", "th", "tr"], &["table"]),
    ("th", &["td", "th", "tr"], &["table"]),
    ("tr", &["tr"], &["table"]),
];

const TEXT_ELEMENTS: [&str; 7] = ["p", "h1", "h2", "h3", "h4", "h5", "h6"];

const BLOCK_ELEMENTS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "header", "hr", "li", "main", "nav", "ol", "pre", "section",
    "table", "tr", "ul", "title",
];

/// Text and attribution pulled out of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub content: String,
    pub source_info: String,
    pub is_pdf: bool,
}

impl PageContent {
    fn pdf(url: &Url) -> Self {
        let title = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or("document.pdf")
            .to_string();
        Self {
            source_info: title.clone(),
            title,
            content: PDF_PLACEHOLDER.to_string(),
            is_pdf: true,
        }
    }
}

/// Fetches pages over HTTP and extracts their content.
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<PageContent> {
        let url = Url::parse(url)?;
        if is_pdf_url(&url) {
            return Ok(PageContent::pdf(&url));
        }

        debug!("fetching {}", url);
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;

        let is_pdf = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with("application/pdf"));
        if is_pdf {
            return Ok(PageContent::pdf(&url));
        }

        let html = response.text().await?;
        Ok(extract_page(&html, &url))
    }
}

fn is_pdf_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Extract title, main text and source attribution from an HTML document.
///
/// Main text comes from `<article>` when present, otherwise from the
/// paragraphs and headings of `<main>` (or `<body>`), otherwise from all text
/// of that container.
pub fn extract_page(html: &str, url: &Url) -> PageContent {
    let visible = close_implied_tags(&HIDDEN.replace_all(html, " "));
    match Dom::parse(&visible) {
        Ok(dom) => from_dom(&dom.children, url),
        Err(e) => {
            warn!("could not parse {} as HTML, stripping tags instead: {}", url, e);
            from_markup(&visible, url)
        }
    }
}

/// Write out the end tags HTML lets authors omit (`<p>`, `<li>`, table cells
/// and the like), drop end tags that close nothing, and close whatever is
/// still open at the end of the document.
fn close_implied_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut open: Vec<String> = Vec::new();
    let mut last = 0;

    for caps in ELEMENT_TAG.captures_iter(html) {
        let Some(tag) = caps.get(0) else { continue };
        out.push_str(&html[last..tag.start()]);
        last = tag.end();

        let name = &caps[2];
        let lower = name.to_ascii_lowercase();
        if &caps[1] == "/" {
            if let Some(at) = open.iter().rposition(|n| n.eq_ignore_ascii_case(&lower)) {
                close_from(&mut open, at, &mut out);
            }
            continue;
        }

        for (element, closers, scope) in OPTIONAL_END {
            if !closers.contains(&lower.as_str()) {
                continue;
            }
            let found = open.iter().rposition(|n| {
                let n = n.to_ascii_lowercase();
                n == element || scope.contains(&n.as_str())
            });
            if let Some(at) = found.filter(|&at| open[at].eq_ignore_ascii_case(element)) {
                close_from(&mut open, at, &mut out);
            }
        }

        out.push_str(tag.as_str());
        let self_closing = caps[3].trim_end().ends_with('/');
        if !self_closing && !VOID_ELEMENTS.contains(&lower.as_str()) {
            open.push(name.to_string());
        }
    }

    out.push_str(&html[last..]);
    close_from(&mut open, 0, &mut out);
    out
}

/// Close `open[at..]`, innermost first.
fn close_from(open: &mut Vec<String>, at: usize, out: &mut String) {
    for name in open.drain(at..).rev() {
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn from_dom(nodes: &[Node], url: &Url) -> PageContent {
    let title = find_first(nodes, &|el| is(el, "title"))
        .map(|el| single_line(&inner_text(&el.children)))
        .unwrap_or_default();

    let content = match find_first(nodes, &|el| is(el, "article")) {
        Some(article) => inner_text(&article.children),
        None => {
            let container = find_first(nodes, &|el| is(el, "main"))
                .or_else(|| find_first(nodes, &|el| is(el, "body")))
                .map_or(nodes, |el| el.children.as_slice());

            let mut elements = Vec::new();
            find_all(container, &|el| TEXT_ELEMENTS.iter().any(|n| is(el, n)), &mut elements);
            let joined = elements
                .iter()
                .map(|el| inner_text(&el.children))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");

            if joined.is_empty() {
                inner_text(container)
            } else {
                joined
            }
        }
    };

    PageContent {
        title,
        content,
        source_info: source_info(nodes, url),
        is_pdf: false,
    }
}

fn from_markup(html: &str, url: &Url) -> PageContent {
    let title = TITLE
        .captures(html)
        .map(|caps| single_line(&html_escape::decode_html_entities(&caps[1])))
        .unwrap_or_default();
    let body = TITLE.replace(html, " ");
    let text = TAG.replace_all(&body, "\n");

    let content = html_escape::decode_html_entities(&text)
        .lines()
        .map(single_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    PageContent {
        title,
        content,
        source_info: host_source(url),
        is_pdf: false,
    }
}

/// Author or byline elements, then `og:site_name`, then the host name.
fn source_info(nodes: &[Node], url: &Url) -> String {
    let mut authors = Vec::new();
    find_all(nodes, &is_author, &mut authors);
    let names: Vec<String> = authors
        .iter()
        .map(|el| single_line(&inner_text(&el.children)))
        .filter(|name| !name.is_empty())
        .collect();
    if !names.is_empty() {
        return names.join(", ");
    }

    let site_name = find_first(nodes, &|el| {
        is(el, "meta") && attr(el, "property") == Some("og:site_name")
    })
    .and_then(|el| attr(el, "content"))
    .map(|name| single_line(&html_escape::decode_html_entities(name)))
    .filter(|name| !name.is_empty());

    site_name.unwrap_or_else(|| host_source(url))
}

fn host_source(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

fn is_author(el: &Element) -> bool {
    let has_class = |name: &str| {
        el.classes.iter().any(|c| c == name)
            || attr(el, "class").is_some_and(|v| v.split_whitespace().any(|c| c == name))
    };
    attr(el, "rel") == Some("author")
        || attr(el, "itemprop") == Some("author")
        || has_class("author")
        || has_class("byline")
}

fn is(el: &Element, name: &str) -> bool {
    el.name.eq_ignore_ascii_case(name)
}

fn attr<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attributes.get(name).and_then(|v| v.as_deref())
}

fn find_first<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    nodes.iter().find_map(|node| match node {
        Node::Element(el) if pred(el) => Some(el),
        Node::Element(el) => find_first(&el.children, pred),
        _ => None,
    })
}

/// Matching elements in document order; matches are not searched further.
fn find_all<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                out.push(el);
            } else {
                find_all(&el.children, pred, out);
            }
        }
    }
}

/// Rendered text of a node list, one line per block element.
fn inner_text(nodes: &[Node]) -> String {
    let mut raw = String::new();
    push_text(nodes, &mut raw);
    normalize_lines(&raw)
}

fn push_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => {
                let decoded = html_escape::decode_html_entities(text);
                out.extend(decoded.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
            }
            Node::Element(el) => {
                let name = el.name.to_ascii_lowercase();
                let breaks = if name == "br" {
                    out.push('\n');
                    continue;
                } else if TEXT_ELEMENTS.contains(&name.as_str()) {
                    2
                } else if BLOCK_ELEMENTS.contains(&name.as_str()) {
                    1
                } else {
                    0
                };
                line_breaks(out, breaks);
                push_text(&el.children, out);
                line_breaks(out, breaks);
            }
            Node::Comment(_) => {}
        }
    }
}

/// End `out` with at least `count` newlines, ignoring trailing blanks.
fn line_breaks(out: &mut String, count: usize) {
    if count == 0 {
        return;
    }
    let kept = out.trim_end_matches(|c| c == ' ' || c == '\t').len();
    out.truncate(kept);
    if out.is_empty() {
        return;
    }
    let existing = out.len() - out.trim_end_matches('\n').len();
    for _ in existing..count {
        out.push('\n');
    }
}

/// Collapse whitespace within lines, keep at most one blank line in a row,
/// and drop leading and trailing blank lines.
fn normalize_lines(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = single_line(line);
        if line.is_empty() && lines.last().is_none_or(|last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests;

use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{BrainError, Result};

const FETCH_TIMEOUT_SECONDS: u64 = 20;
const USER_AGENT: &str = concat!("second-brain/", env!("CARGO_PKG_VERSION"));

const MAIN_CONTENT_SELECTOR: &str =
    "article, main, [role=main], .content, .main-content, #content, #main";

/// Elements whose text never counts as page content
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "nav", "header", "footer", "aside",
    "button", "form", "svg",
];

const SKIPPED_CLASSES: &[&str] = &["advertisement", "ads", "sidebar", "menu", "navigation"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

/// Readable content of a web page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Fetch `url` and extract its readable text. Blocking.
#[inline]
pub fn fetch_page(url: &str) -> Result<ExtractedPage> {
    let parsed =
        Url::parse(url).map_err(|e| BrainError::Network(format!("invalid URL {url}: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(BrainError::Network(format!(
            "unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(FETCH_TIMEOUT_SECONDS)))
        .build()
        .into();

    debug!("Fetching {}", parsed);
    let html = agent
        .get(parsed.as_str())
        .header("User-Agent", USER_AGENT)
        .call()
        .and_then(|mut resp| resp.body_mut().read_to_string())
        .map_err(|e| BrainError::Network(format!("Failed to fetch {url}: {e}")))?;

    html_to_page(&html)
}

/// Extract the title and readable text from an HTML document.
///
/// The first `article`/`main`-like element is preferred over `body`. Text is
/// returned one block per line with whitespace collapsed.
#[inline]
pub fn html_to_page(html: &str) -> Result<ExtractedPage> {
    let document = Html::parse_document(html);

    let title = extract_title(&document)?;

    let main_selector = selector(MAIN_CONTENT_SELECTOR)?;
    let body_selector = selector("body")?;
    let root = document
        .select(&main_selector)
        .next()
        .or_else(|| document.select(&body_selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);
    let text = normalize_lines(&raw);

    debug!(
        "Extracted {} chars of text (title: {:?})",
        text.len(),
        title
    );
    Ok(ExtractedPage { title, text })
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| BrainError::Other(anyhow::anyhow!("invalid selector {css}: {e}")))
}

fn extract_title(document: &Html) -> Result<Option<String>> {
    for css in ["title", "h1"] {
        let found = document
            .select(&selector(css)?)
            .map(|el| el.text().collect::<String>())
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|t| !t.is_empty());
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name)
        || element
            .value()
            .classes()
            .any(|class| SKIPPED_CLASSES.contains(&class))
    {
        return;
    }

    let is_block = BLOCK_TAGS.contains(&name);
    if is_block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.replace('\n', " ")),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
    if is_block {
        out.push('\n');
    }
}

fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

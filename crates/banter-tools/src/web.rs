//! Web tool for fetching pages as readable text.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use banter_core::{Error, PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters};

/// Tags whose content is never useful to a model reading a page.
const SKIP_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside", "noscript"];

/// Longest page text returned to the model before truncation.
const MAX_PAGE_CHARS: usize = 20_000;

pub struct FetchPageTool {
    client: Client,
}

impl Default for FetchPageTool {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchPageTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("banter/0.1.0")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct FetchPageArgs {
    url: String,
    #[serde(default)]
    selector: Option<String>,
}

#[async_trait]
impl Tool for FetchPageTool {
    fn name(&self) -> &str {
        "fetch_page"
    }

    fn description(&self) -> &str {
        "Fetch a webpage and extract its text content. Optionally filter by CSS selector."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new()
                .add_property("url", PropertySchema::string("URL of the webpage to fetch"), true)
                .add_property(
                    "selector",
                    PropertySchema::string(
                        "Optional CSS selector to extract specific content (e.g., 'main', 'article')",
                    ),
                    false,
                ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, Error> {
        let args: FetchPageArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool("fetch_page", format!("Invalid arguments: {}", e)))?;

        tracing::debug!(url = %args.url, selector = ?args.selector, "fetching page");
        let response = self.client.get(&args.url).send().await.map_err(|e| {
            Error::tool("fetch_page", format!("Failed to fetch '{}': {}", args.url, e))
        })?;

        if !response.status().is_success() {
            return Err(Error::tool(
                "fetch_page",
                format!("HTTP error {}: {}", response.status(), args.url),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::tool("fetch_page", format!("Failed to read response: {}", e)))?;

        let text = extract_page_text(&html, args.selector.as_deref())?;
        if text.is_empty() {
            return Ok(ToolOutput::success("(no text content found on page)"));
        }

        if text.len() > MAX_PAGE_CHARS {
            let mut end = MAX_PAGE_CHARS;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            return Ok(ToolOutput::success(format!(
                "{}\n\n... (truncated, {} total characters)",
                &text[..end],
                text.len()
            )));
        }

        Ok(ToolOutput::success(text))
    }
}

/// Pulls readable text out of an HTML document.
///
/// With a selector, only matching elements contribute. Without one, the
/// common content containers are tried first, then the whole body.
fn extract_page_text(html: &str, selector: Option<&str>) -> Result<String, Error> {
    let document = Html::parse_document(html);

    let text = match selector {
        Some(raw) => {
            let selector = parse_selector(raw)?;
            join_blocks(document.select(&selector))
        }
        None => {
            let readable = parse_selector("main, article, #content, .content")?;
            let mut text = join_blocks(document.select(&readable));
            if text.is_empty() {
                let body = parse_selector("body")?;
                text = join_blocks(document.select(&body));
            }
            text
        }
    };

    Ok(clean_text(&text))
}

fn parse_selector(raw: &str) -> Result<Selector, Error> {
    Selector::parse(raw).map_err(|_| Error::tool("fetch_page", format!("Invalid selector: {}", raw)))
}

fn join_blocks<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    elements
        .map(|el| {
            let mut text = String::new();
            collect_text(el, &mut text);
            text
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Walks the element's subtree, skipping the subtrees of non-content tags
/// entirely so their text never leaks into the output.
fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if !SKIP_TAGS.contains(&el.value().name()) {
                collect_text(el, out);
            }
        } else if let Some(t) = child.value().as_text() {
            let trimmed = t.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
        }
    }
}

/// Collapses runs of whitespace within lines and runs of blank lines between
/// them, keeping at most one blank line as a paragraph break.
fn clean_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run < 2 && !lines.is_empty() {
                lines.push(String::new());
            }
        } else {
            blank_run = 0;
            lines.push(collapsed);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

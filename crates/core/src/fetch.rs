//! Page retrieval.
//!
//! Pages are rendered by a headless Chromium when one is configured, so
//! script-built blogs still produce their article markup. A render that
//! comes back implausibly short (bot walls, blank shells) is replaced by a
//! plain HTTP GET whose parsed DOM is re-serialized for extraction.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use reqwest::Client;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::parse::Document;
use crate::{Blog2PodError, Result};

/// Selector for numbered pagination links on multi-page posts.
pub const PAGINATION_SELECTOR: &str = ".page-numbers a";

/// HTTP and render settings for fetching pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds, also bounding the browser process.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
    /// Headless Chromium executable. `None` skips rendering.
    pub browser: Option<PathBuf>,
    /// Time the page gets to run scripts before the DOM is captured.
    pub settle_delay: Duration,
    /// Rendered pages shorter than this are fetched again over plain HTTP.
    pub min_content_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; blog2pod/0.1; +https://github.com/stormlightlabs/blog2pod)".to_string(),
            browser: None,
            settle_delay: Duration::from_secs(3),
            min_content_chars: 100,
        }
    }
}

/// Raw HTML plus the URL it came from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub url: String,
    pub html: String,
    /// False when the HTML came from the plain HTTP path.
    pub rendered: bool,
}

impl SourceDocument {
    /// Parses the HTML with the page URL as base.
    pub fn parse(&self) -> Document {
        Document::parse_with_url(&self.html, &self.url)
    }
}

/// A fetched page and the further pages of the same post.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub document: SourceDocument,
    pub pagination: Vec<String>,
}

/// Fetches HTML content from a URL with a plain GET.
///
/// Non-success status codes are errors.
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| Blog2PodError::InvalidUrl(e.to_string()))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(Blog2PodError::HttpError)?;

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            if e.is_timeout() { Blog2PodError::Timeout { timeout: config.timeout } } else { Blog2PodError::HttpError(e) }
        })?;

    Ok(response.text().await?)
}

/// Plain HTTP fetch followed by a parse and re-serialization of the DOM.
pub async fn fetch_and_reserialize(url: &str, config: &FetchConfig) -> Result<String> {
    let html = fetch_url(url, config).await?;
    Ok(Document::parse(&html).serialize())
}

/// Renders a page in headless Chromium and returns the serialized DOM.
///
/// The child process is killed if it outlives the timeout or the future is
/// dropped.
pub async fn render_url(browser: &Path, url: &str, config: &FetchConfig) -> Result<String> {
    let budget_ms = config.settle_delay.as_millis().to_string();
    let child = Command::new(browser)
        .args([
            "--headless",
            "--no-sandbox",
            "--disable-gpu",
            "--hide-scrollbars",
            "--mute-audio",
        ])
        .arg(format!("--user-agent={}", config.user_agent))
        .arg(format!("--virtual-time-budget={}", budget_ms))
        .arg("--dump-dom")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| fetch_error(url, format!("could not start {}: {}", browser.display(), e)))?;

    let limit = Duration::from_secs(config.timeout) + config.settle_delay;
    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| fetch_error(url, format!("browser did not finish within {}s", limit.as_secs())))?
        .map_err(|e| fetch_error(url, e.to_string()))?;

    if !output.status.success() {
        warn!(url, status = %output.status, "browser exited unsuccessfully");
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Retrieves a page, rendering it when possible and falling back to HTTP.
///
/// # Errors
///
/// Every network or render failure becomes [`Blog2PodError::FetchError`]
/// carrying the URL.
pub async fn fetch_page(url: &str, config: &FetchConfig) -> Result<FetchedPage> {
    let rendered = match &config.browser {
        Some(browser) => {
            let html = render_url(browser, url, config).await?;
            debug!(url, chars = html.chars().count(), "rendered page");
            Some(html)
        }
        None => None,
    };

    let document = match rendered {
        Some(html) if html.chars().count() >= config.min_content_chars => {
            info!(url, "captured rendered page");
            SourceDocument { url: url.to_string(), html, rendered: true }
        }
        other => {
            if other.is_some() {
                info!(url, min = config.min_content_chars, "rendered page too short; fetching over HTTP");
            }
            let html = fetch_and_reserialize(url, config)
                .await
                .map_err(|e| fetch_error(url, e.to_string()))?;
            SourceDocument { url: url.to_string(), html, rendered: false }
        }
    };

    let pagination = pagination_links(&document.parse());
    Ok(FetchedPage { document, pagination })
}

/// Same-site links from the page-number navigation, in page order.
///
/// A link after the first one whose URL contains `/2/` is dropped: themes
/// that emit it duplicate page one there, so following it would narrate the
/// opening page twice.
pub fn pagination_links(doc: &Document) -> Vec<String> {
    let Some(base) = doc.base_url() else {
        return Vec::new();
    };
    let Ok(anchors) = doc.select(PAGINATION_SELECTOR) else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for (index, anchor) in anchors.iter().enumerate() {
        let Some(href) = anchor.attr("href") else { continue };
        let Ok(resolved) = base.join(href.trim()) else { continue };
        if resolved.host_str() != base.host_str() {
            continue;
        }
        let resolved = resolved.to_string();
        if index > 0 && resolved.contains("/2/") {
            continue;
        }
        if !links.contains(&resolved) {
            links.push(resolved);
        }
    }
    links
}

fn fetch_error(url: &str, reason: String) -> Blog2PodError {
    Blog2PodError::FetchError { url: url.to_string(), reason }
}

//! Error types for blog2pod operations.
//!
//! This module defines the main error type [`Blog2PodError`] which represents
//! every failure a podcast run can hit, from fetching the page to tagging the
//! finished MP3.
//!
//! # Example
//!
//! ```rust
//! use blog2pod_core::{Blog2PodError, Result};
//!
//! fn require_body(text: &str, url: &str) -> Result<()> {
//!     if text.is_empty() {
//!         return Err(Blog2PodError::ExtractionFailed { url: url.to_string() });
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for the podcast pipeline.
///
/// Stages with a degraded mode (artwork, a single speech chunk, the cleaning
/// rewrite) produce these errors only to log them; fetch, extraction and
/// assembly errors end the run and reach the user through
/// [`Blog2PodError::user_message`].
#[derive(Error, Debug)]
pub enum Blog2PodError {
    /// HTTP request errors from reqwest.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// The command argument is not an `http://` or `https://` URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network or render failure while retrieving the page.
    #[error("Failed to fetch {url}: {reason}")]
    FetchError { url: String, reason: String },

    /// HTML parsing errors, usually an invalid CSS selector.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// No heuristic matched and the generic scan found no text.
    #[error("No article content could be extracted from {url}")]
    ExtractionFailed { url: String },

    /// The language-model rewrite failed.
    #[error("Cleaning failed: {0}")]
    CleaningFailed(String),

    /// The speech deployment rejected a request or returned no audio.
    #[error("Speech service error: {0}")]
    SpeechFailed(String),

    /// Text-to-speech failed for one chunk.
    #[error("Speech synthesis failed for chunk {index}: {reason}")]
    SynthesisChunkError { index: usize, reason: String },

    /// Concatenation, export or tagging failed. Nothing is relocated.
    #[error("Audio assembly failed: {0}")]
    AssemblyError(String),

    /// Header image could not be downloaded or processed.
    #[error("Artwork unavailable: {0}")]
    ImageError(String),

    /// Missing or malformed settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Filesystem errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Blog2PodError {
    /// Text shown to the person who issued the command.
    ///
    /// Fetch and extraction problems collapse into the single "failed to
    /// scrape" message; everything else is reported verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Blog2PodError::InvalidUrl(_) => crate::command::INVALID_URL_MESSAGE.to_string(),
            Blog2PodError::FetchError { url, .. } | Blog2PodError::ExtractionFailed { url } => {
                format!("Failed to scrape article: {}", url)
            }
            other => format!("Error: {}", other),
        }
    }
}

/// Result type alias for Blog2PodError.
pub type Result<T> = std::result::Result<T, Blog2PodError>;

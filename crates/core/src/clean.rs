//! Text normalization and the optional language-model cleaning pass.
//!
//! Text from a recognised template is trusted as-is. Text from the generic
//! scan usually drags navigation, share buttons and comment forms along, so
//! it is sent to a chat deployment with an instruction to keep only the
//! article. The model may still paraphrase; fidelity is best-effort.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::extract::ExtractedArticle;
use crate::{Blog2PodError, Result};

/// Title used when the page has none.
pub const UNTITLED: &str = "Untitled Article";

const CLEANING_INSTRUCTION: &str = "You are given the title and the raw text scraped from a blog article page. \
Remove everything that is not part of the article itself, such as navigation, menus, share prompts, \
cookie notices, comment sections, author bios and related-post lists. Return the remaining article text \
exactly as written, without summarising, rewording or adding commentary.";

/// Chat deployment settings for the cleaning pass.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub service: ServiceConfig,
    pub temperature: f32,
}

impl ChatConfig {
    pub fn new(service: ServiceConfig) -> Self {
        Self { service, temperature: 0.0 }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for the chat-completions deployment.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let http = config.service.http_client()?;
        Ok(Self { http, config })
    }

    /// Asks the model to strip non-article content from `text`.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, or a reply without
    /// content is reported as [`Blog2PodError::CleaningFailed`].
    pub async fn rewrite_article(&self, title: &str, text: &str) -> Result<String> {
        let user = format!("Title: {}\n\n{}", title, text);
        let body = ChatRequest {
            messages: vec![
                ChatMessage { role: "system", content: CLEANING_INSTRUCTION },
                ChatMessage { role: "user", content: &user },
            ],
            temperature: self.config.temperature,
        };

        let url = self.config.service.operation_url("chat/completions");
        debug!(target: "chat_client", chars = text.len(), "requesting article cleanup");

        let response = self
            .http
            .post(&url)
            .header("api-key", &self.config.service.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Blog2PodError::CleaningFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Blog2PodError::CleaningFailed(format!("status={} body={}", status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Blog2PodError::CleaningFailed(format!("unreadable reply: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Blog2PodError::CleaningFailed("reply had no content".to_string()))
    }
}

/// Article text ready for narration.
#[derive(Debug, Clone)]
pub struct NormalizedArticle {
    pub title: String,
    /// Whitespace-normalized narration text, never empty.
    pub clean_text: String,
    pub source_url: String,
    pub header_image_url: Option<String>,
    /// Square JPEG cover, filled in when the header image could be prepared.
    pub artwork: Option<Vec<u8>>,
}

/// Collapses every whitespace run into a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns an extracted article into narration text.
///
/// When the article needs cleaning and a chat client is available, the
/// model rewrite replaces the raw text. If that call fails, the raw text is
/// kept and the failure is logged.
pub async fn clean_article(
    article: ExtractedArticle, source_url: &str, chat: Option<&ChatClient>,
) -> NormalizedArticle {
    let title = article
        .title
        .as_deref()
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let raw = normalize_whitespace(&article.body_text);
    let clean_text = match (article.needs_cleaning, chat) {
        (true, Some(client)) => match client.rewrite_article(&title, &article.body_text).await {
            Ok(rewritten) => {
                let rewritten = normalize_whitespace(&rewritten);
                debug!(before = raw.len(), after = rewritten.len(), "article cleaned");
                rewritten
            }
            Err(e) => {
                warn!(url = source_url, error = %e, "cleaning failed; narrating raw text");
                raw
            }
        },
        _ => raw,
    };

    NormalizedArticle {
        title,
        clean_text,
        source_url: source_url.to_string(),
        header_image_url: article.header_image_url,
        artwork: None,
    }
}

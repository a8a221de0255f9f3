//! One URL in, one podcast out.
//!
//! [`Blog2Pod`] owns the service clients and runs the stages for a single
//! request: fetch, extract, follow pagination, clean, then synthesize speech
//! while the cover art downloads, and finally assemble the file. Network work
//! stays on the async runtime. Synthesis runs on its own task and assembly on
//! the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::artwork::fetch_artwork;
use crate::assemble::{PodcastFile, assemble};
use crate::clean::{ChatClient, NormalizedArticle, clean_article};
use crate::command::validate_url;
use crate::config::Blog2PodConfig;
use crate::extract::{ExtractedArticle, extract_article};
use crate::fetch::fetch_page;
use crate::speech::{SpeechClient, synthesize};
use crate::{Blog2PodError, Result};

/// The podcast pipeline with its configured clients.
///
/// Cheap to share behind an [`Arc`]; every call to [`Blog2Pod::run`] is
/// independent.
#[derive(Debug, Clone)]
pub struct Blog2Pod {
    config: Blog2PodConfig,
    speech: Arc<SpeechClient>,
    chat: Option<Arc<ChatClient>>,
    http: Client,
}

impl Blog2Pod {
    pub fn new(config: Blog2PodConfig) -> Result<Self> {
        let speech = Arc::new(SpeechClient::new(config.speech.clone())?);
        let chat = config.chat.clone().map(ChatClient::new).transpose()?.map(Arc::new);
        let http = Client::builder()
            .timeout(Duration::from_secs(config.fetch.timeout))
            .user_agent(config.fetch.user_agent.as_str())
            .build()?;
        Ok(Self { config, speech, chat, http })
    }

    /// Fetches and extracts the article, ready for narration.
    ///
    /// The narration text opens with the title. Further pages of a paginated
    /// post are appended in order; a page that fails is skipped.
    pub async fn prepare(&self, url: &str) -> Result<NormalizedArticle> {
        let parsed = validate_url(url)?;
        // Replies and the ID3 comment carry the URL exactly as it was given.
        let source_url = url.trim();
        info!(url = source_url, "preparing article");

        let (mut article, pagination) = self.extract_page(source_url).await?;

        if self.config.pipeline.follow_pagination {
            let is_source = |link: &String| link.as_str() == source_url || link.as_str() == parsed.as_str();
            for page_url in pagination.iter().filter(|&link| !is_source(link)) {
                match self.extract_page(page_url).await {
                    Ok((page, _)) => {
                        debug!(url = %page_url, chars = page.body_text.len(), "appending page");
                        let title = page.title.unwrap_or_default();
                        article.body_text = format!("{}\n{}\n{}", article.body_text, title, page.body_text);
                        article.needs_cleaning |= page.needs_cleaning;
                    }
                    Err(e) => warn!(url = %page_url, error = %e, "skipping page"),
                }
            }
        }

        let mut normalized = clean_article(article, source_url, self.chat.as_deref()).await;
        normalized.clean_text = format!("{} {}", normalized.title, normalized.clean_text);
        Ok(normalized)
    }

    /// Produces the podcast for `url` in the completed-output directory.
    pub async fn run(&self, url: &str) -> Result<PodcastFile> {
        let mut article = match self.prepare(url).await {
            Ok(article) => article,
            Err(e) => {
                error!(url, error = %e, "could not prepare article");
                return Err(e);
            }
        };

        let workdir = self.scratch_dir()?;
        debug!(path = %workdir.path().display(), "created scratch directory");

        let speech = Arc::clone(&self.speech);
        let http = self.http.clone();
        let text = article.clean_text.clone();
        let image_url = article.header_image_url.clone();
        let chunk_dir = workdir.path().to_path_buf();

        let (report, artwork) = tokio::spawn(async move {
            let cover = async {
                let url = image_url?;
                match fetch_artwork(&http, &url).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!(url = %url, error = %e, "continuing without artwork");
                        None
                    }
                }
            };
            tokio::join!(synthesize(&speech, &text, &chunk_dir), cover)
        })
        .await
        .map_err(|e| Blog2PodError::AssemblyError(format!("synthesis task failed: {}", e)))?;

        article.artwork = artwork;
        let completed_dir = self.config.pipeline.completed_dir.clone();
        let podcast = tokio::task::spawn_blocking(move || assemble(&report, &article, workdir.path(), &completed_dir))
            .await
            .map_err(|e| Blog2PodError::AssemblyError(format!("assembly task failed: {}", e)))??;

        info!(path = %podcast.path.display(), skipped = podcast.skipped_chunks, "podcast ready");
        Ok(podcast)
    }

    async fn extract_page(&self, url: &str) -> Result<(ExtractedArticle, Vec<String>)> {
        let page = fetch_page(url, &self.config.fetch).await?;
        let article = extract_article(&page.document.parse())?;
        debug!(
            url,
            rendered = page.document.rendered,
            heuristic = article.matched.map(|h| h.name()),
            "extracted page"
        );
        Ok((article, page.pagination))
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("blog2pod-");
        match &self.config.pipeline.work_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                Ok(builder.tempdir_in(parent)?)
            }
            None => Ok(builder.tempdir()?),
        }
    }
}

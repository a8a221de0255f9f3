//! Chunked text-to-speech.
//!
//! The speech endpoint caps the input size, so narration text is cut into
//! fixed-size slices by character count. Slices can end mid-word; that keeps
//! chunking trivially lossless and deterministic. Each slice is synthesized
//! on its own and written to the run's scratch directory. A failed slice is
//! logged and skipped, and the run goes on with the rest.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::{Blog2PodError, Result};

/// Maximum characters per speech request.
pub const DEFAULT_CHUNK_SIZE: usize = 4000;

/// Speech deployment settings.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub service: ServiceConfig,
    pub model: String,
    pub voice: String,
    /// Characters per request.
    pub chunk_size: usize,
    /// Pause between consecutive requests.
    pub inter_call_delay: Duration,
}

impl SpeechConfig {
    /// `tts-1-hd` with the `shimmer` voice, [`DEFAULT_CHUNK_SIZE`] and no delay.
    pub fn new(service: ServiceConfig) -> Self {
        Self {
            service,
            model: "tts-1-hd".to_string(),
            voice: "shimmer".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            inter_call_delay: Duration::ZERO,
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

/// Client for the speech deployment.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: Client,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let http = config.service.http_client()?;
        Ok(Self { http, config })
    }

    /// Synthesizes one piece of text and returns the MP3 bytes.
    pub async fn speak(&self, input: &str) -> Result<Vec<u8>> {
        let body = SpeechRequest { model: &self.config.model, voice: &self.config.voice, input };
        let response = self
            .http
            .post(self.config.service.operation_url("audio/speech"))
            .header("api-key", &self.config.service.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Blog2PodError::SpeechFailed(format!("status={} body={}", status, text)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(Blog2PodError::SpeechFailed("response contained no audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

/// One synthesized slice on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Position of the slice in the text; defines concatenation order.
    pub index: usize,
    pub path: PathBuf,
}

/// A slice that could not be synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of synthesizing a whole article.
#[derive(Debug, Clone, Default)]
pub struct SynthesisReport {
    /// Successful chunks, ascending by index.
    pub chunks: Vec<AudioChunk>,
    pub failures: Vec<ChunkFailure>,
    /// Number of slices the text was cut into.
    pub total: usize,
}

impl SynthesisReport {
    /// Number of slices missing from the audio.
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// Splits `text` into consecutive slices of at most `max_chars` characters.
///
/// Concatenating the slices gives back `text`. An empty text yields no
/// slices.
///
/// # Panics
///
/// Panics if `max_chars` is zero.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    assert!(max_chars > 0, "chunk size must be positive");

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// File name of the intermediate file for chunk `index`.
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{:04}.mp3", index)
}

/// Synthesizes `text` slice by slice into `workdir`.
///
/// Slices are processed strictly in order. Failures are recorded in the
/// report instead of aborting.
pub async fn synthesize(client: &SpeechClient, text: &str, workdir: &Path) -> SynthesisReport {
    let slices = chunk_text(text, client.config.chunk_size);
    let mut report = SynthesisReport { total: slices.len(), ..Default::default() };
    info!(chunks = slices.len(), chars = text.chars().count(), "synthesizing speech");

    for (index, slice) in slices.into_iter().enumerate() {
        if index > 0 && !client.config.inter_call_delay.is_zero() {
            tokio::time::sleep(client.config.inter_call_delay).await;
        }

        match synthesize_chunk(client, index, slice, workdir).await {
            Ok(chunk) => {
                debug!(index, path = %chunk.path.display(), "chunk synthesized");
                report.chunks.push(chunk);
            }
            Err(e) => {
                let failure = Blog2PodError::SynthesisChunkError { index, reason: e.to_string() };
                warn!(error = %failure, "skipping chunk");
                report.failures.push(ChunkFailure { index, reason: e.to_string() });
            }
        }
    }

    report
}

async fn synthesize_chunk(client: &SpeechClient, index: usize, slice: &str, workdir: &Path) -> Result<AudioChunk> {
    let audio = client.speak(slice).await?;
    let path = workdir.join(chunk_file_name(index));
    tokio::fs::write(&path, &audio).await?;
    Ok(AudioChunk { index, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn speech_client(server: &MockServer, chunk_size: usize) -> SpeechClient {
        let service = ServiceConfig {
            endpoint: server.uri(),
            api_key: "key".to_string(),
            deployment: "tts".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            timeout: 5,
        };
        SpeechClient::new(SpeechConfig { chunk_size, ..SpeechConfig::new(service) }).unwrap()
    }

    #[rstest]
    #[case(0, 4)]
    #[case(1, 4)]
    #[case(4, 4)]
    #[case(5, 4)]
    #[case(8, 4)]
    #[case(9001, 4000)]
    fn test_chunk_count_and_lossless(#[case] len: usize, #[case] size: usize) {
        let text: String = "abcdefghij".chars().cycle().take(len).collect();
        let chunks = chunk_text(&text, size);

        assert_eq!(chunks.len(), len.div_ceil(size));
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= size));
    }

    #[test]
    fn test_chunking_counts_characters_not_bytes() {
        let text = "héllo wörld ✓✓";
        let chunks = chunk_text(text, 3);

        assert_eq!(chunks, vec!["hél", "lo ", "wör", "ld ", "✓✓"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunk_file_names_sort_by_index() {
        assert_eq!(chunk_file_name(7), "chunk_0007.mp3");
        assert!(chunk_file_name(9) < chunk_file_name(10));
    }

    #[tokio::test]
    async fn test_speak_posts_model_voice_and_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/tts/audio/speech"))
            .and(header("api-key", "key"))
            .and(body_partial_json(serde_json::json!({"model": "tts-1-hd", "voice": "shimmer", "input": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let audio = speech_client(&server, 10).speak("hi").await.unwrap();
        assert_eq!(audio, b"ID3audio");
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped_and_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"input": "bbbb"})))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .mount(&server)
            .await;

        let workdir = tempfile::tempdir().unwrap();
        let report = synthesize(&speech_client(&server, 4), "aaaabbbbccccdddd", workdir.path()).await;

        assert_eq!(report.total, 4);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 2, 3]);
        assert!(report.chunks.iter().all(|c| c.path.exists()));
        assert!(!workdir.path().join(chunk_file_name(1)).exists());
    }

    #[tokio::test]
    async fn test_empty_audio_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        assert!(speech_client(&server, 10).speak("hi").await.is_err());
    }
}

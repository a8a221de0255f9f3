//! Settings for a podcast run.
//!
//! Everything is read from the environment once at startup. Binaries load a
//! `.env` file first and may override individual values from their own flags.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `AZURE_ENDPOINT` | Azure OpenAI resource endpoint | required |
//! | `AZUREOPENAI_API_KEY` | API key for both deployments | required |
//! | `TTS_DEPLOYMENT` | speech deployment name | required |
//! | `TTS_MODEL` / `TTS_VOICE` | speech model and voice | `tts-1-hd` / `shimmer` |
//! | `TTS_API_VERSION` | speech API version | `2024-02-15-preview` |
//! | `CHAT_DEPLOYMENT` | chat deployment; enables cleaning | unset |
//! | `CHAT_API_VERSION` | chat API version | `2024-02-15-preview` |
//! | `BLOG2POD_COMPLETED_DIR` | finished podcasts | `completed` |
//! | `BLOG2POD_CHUNK_SIZE` | characters per speech request | `4000` |
//! | `BLOG2POD_CHUNK_DELAY_MS` | pause between speech requests | `0` |
//! | `CHROMIUM_PATH` | headless browser; enables rendering | unset |
//! | `BLOG2POD_RENDER_DELAY_MS` | render settle delay | `3000` |
//! | `BLOG2POD_TIMEOUT_SECS` | page fetch timeout | `30` |
//! | `BLOG2POD_SERVICE_TIMEOUT_SECS` | chat/speech request timeout | `120` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;

use crate::clean::ChatConfig;
use crate::fetch::FetchConfig;
use crate::speech::SpeechConfig;
use crate::{Blog2PodError, Result};

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// One Azure OpenAI deployment.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServiceConfig {
    /// Full URL for an operation on this deployment, e.g. `audio/speech`.
    pub fn operation_url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            operation,
            self.api_version
        )
    }

    /// HTTP client bound to this deployment's timeout.
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .build()
            .map_err(Blog2PodError::HttpError)
    }
}

/// Pipeline-level settings that are not tied to one service.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where finished podcasts are moved to.
    pub completed_dir: PathBuf,
    /// Follow page-number links on multi-page posts.
    pub follow_pagination: bool,
    /// Parent of the per-run scratch directories. System temp dir when `None`.
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { completed_dir: PathBuf::from("completed"), follow_pagination: true, work_dir: None }
    }
}

/// Everything a [`crate::Blog2Pod`] needs.
#[derive(Debug, Clone)]
pub struct Blog2PodConfig {
    pub fetch: FetchConfig,
    pub speech: SpeechConfig,
    /// `None` disables the language-model cleaning pass.
    pub chat: Option<ChatConfig>,
    pub pipeline: PipelineConfig,
}

impl Blog2PodConfig {
    /// Reads the settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| Blog2PodError::ConfigError(format!("{} is not set", key)));

        let endpoint = require("AZURE_ENDPOINT")?;
        let api_key = require("AZUREOPENAI_API_KEY")?;
        let service_timeout = parse_or(get("BLOG2POD_SERVICE_TIMEOUT_SECS"), "BLOG2POD_SERVICE_TIMEOUT_SECS", 120)?;

        let defaults = SpeechConfig::new(ServiceConfig {
            endpoint: endpoint.clone(),
            api_key: api_key.clone(),
            deployment: require("TTS_DEPLOYMENT")?,
            api_version: get("TTS_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            timeout: service_timeout,
        });
        let speech = SpeechConfig {
            model: get("TTS_MODEL").unwrap_or_else(|| defaults.model.clone()),
            voice: get("TTS_VOICE").unwrap_or_else(|| defaults.voice.clone()),
            chunk_size: parse_or(get("BLOG2POD_CHUNK_SIZE"), "BLOG2POD_CHUNK_SIZE", defaults.chunk_size)?,
            inter_call_delay: Duration::from_millis(parse_or(
                get("BLOG2POD_CHUNK_DELAY_MS"),
                "BLOG2POD_CHUNK_DELAY_MS",
                defaults.inter_call_delay.as_millis() as u64,
            )?),
            ..defaults
        };
        if speech.chunk_size == 0 {
            return Err(Blog2PodError::ConfigError("BLOG2POD_CHUNK_SIZE must be positive".to_string()));
        }

        let chat = get("CHAT_DEPLOYMENT").map(|deployment| {
            ChatConfig::new(ServiceConfig {
                endpoint,
                api_key,
                deployment,
                api_version: get("CHAT_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                timeout: service_timeout,
            })
        });

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            timeout: parse_or(get("BLOG2POD_TIMEOUT_SECS"), "BLOG2POD_TIMEOUT_SECS", fetch_defaults.timeout)?,
            browser: get("CHROMIUM_PATH").map(PathBuf::from),
            settle_delay: Duration::from_millis(parse_or(
                get("BLOG2POD_RENDER_DELAY_MS"),
                "BLOG2POD_RENDER_DELAY_MS",
                fetch_defaults.settle_delay.as_millis() as u64,
            )?),
            ..fetch_defaults
        };

        let pipeline = PipelineConfig {
            completed_dir: get("BLOG2POD_COMPLETED_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PipelineConfig::default().completed_dir),
            ..Default::default()
        };

        Ok(Self { fetch, speech, chat, pipeline })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| Blog2PodError::ConfigError(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("AZURE_ENDPOINT", "https://res.openai.azure.com/"),
        ("AZUREOPENAI_API_KEY", "secret"),
        ("TTS_DEPLOYMENT", "tts"),
    ];

    #[test]
    fn test_defaults_from_minimal_env() {
        let config = Blog2PodConfig::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(config.speech.model, "tts-1-hd");
        assert_eq!(config.speech.voice, "shimmer");
        assert_eq!(config.speech.chunk_size, 4000);
        assert!(config.chat.is_none());
        assert!(config.fetch.browser.is_none());
        assert_eq!(config.pipeline.completed_dir, PathBuf::from("completed"));
    }

    #[test]
    fn test_operation_url() {
        let config = Blog2PodConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(
            config.speech.service.operation_url("audio/speech"),
            "https://res.openai.azure.com/openai/deployments/tts/audio/speech?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("CHAT_DEPLOYMENT", "gpt"),
            ("TTS_VOICE", "alloy"),
            ("BLOG2POD_CHUNK_SIZE", "1000"),
            ("BLOG2POD_CHUNK_DELAY_MS", "1000"),
            ("CHROMIUM_PATH", "/usr/bin/chromium"),
            ("BLOG2POD_COMPLETED_DIR", "/srv/podcasts"),
        ]);
        let config = Blog2PodConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.speech.voice, "alloy");
        assert_eq!(config.speech.chunk_size, 1000);
        assert_eq!(config.speech.inter_call_delay, Duration::from_secs(1));
        assert_eq!(config.chat.unwrap().service.deployment, "gpt");
        assert_eq!(config.fetch.browser, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(config.pipeline.completed_dir, PathBuf::from("/srv/podcasts"));
    }

    #[test]
    fn test_missing_required_value() {
        let err = Blog2PodConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("TTS_DEPLOYMENT"));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BLOG2POD_CHUNK_SIZE", "lots"));
        let err = Blog2PodConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, Blog2PodError::ConfigError(msg) if msg.contains("lots")));
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = Blog2PodConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}

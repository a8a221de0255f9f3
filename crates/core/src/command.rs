//! The `!blog2pod <url>` command convention and the replies sent back.

use std::fmt;

use url::Url;

use crate::assemble::PodcastFile;
use crate::{Blog2PodError, Result};

/// Prefix that marks a message as a podcast request.
pub const COMMAND_PREFIX: &str = "!blog2pod";

pub const INVALID_URL_MESSAGE: &str = "Invalid URL format. Please provide a valid URL.";

/// Checks that `input` is an absolute `http://` or `https://` URL.
///
/// # Errors
///
/// [`Blog2PodError::InvalidUrl`] for anything else.
pub fn validate_url(input: &str) -> Result<Url> {
    let input = input.trim();
    if !(input.starts_with("http://") || input.starts_with("https://")) {
        return Err(Blog2PodError::InvalidUrl(input.to_string()));
    }
    let url = Url::parse(input).map_err(|e| Blog2PodError::InvalidUrl(format!("{}: {}", input, e)))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Blog2PodError::InvalidUrl(input.to_string()));
    }
    Ok(url)
}

/// Extracts the argument of a `!blog2pod` message.
///
/// The words after the prefix are joined with single spaces. Returns `None`
/// for any other message.
pub fn parse_command(message: &str) -> Option<String> {
    let rest = message.strip_prefix(COMMAND_PREFIX)?;
    if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
        return None;
    }
    Some(rest.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// A user-visible response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Acknowledged,
    Success { title: String, url: String, skipped_chunks: usize },
    Failure(String),
}

impl Reply {
    pub fn success(podcast: &PodcastFile) -> Self {
        Reply::Success {
            title: podcast.title.clone(),
            url: podcast.comment.clone(),
            skipped_chunks: podcast.skipped_chunks,
        }
    }

    pub fn failure(error: &Blog2PodError) -> Self {
        Reply::Failure(error.user_message())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Acknowledged => write!(f, "Link received. Processing..."),
            Reply::Success { title, url, skipped_chunks } => {
                write!(f, "Your podcast was created successfully!\n{}\nOriginal Link: {}", title, url)?;
                match skipped_chunks {
                    0 => Ok(()),
                    1 => write!(f, "\nNote: 1 section could not be narrated and was skipped."),
                    n => write!(f, "\nNote: {} sections could not be narrated and were skipped.", n),
                }
            }
            Reply::Failure(message) => write!(f, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case("https://blog.example.com/post")]
    #[case("http://localhost:8080/a?b=c")]
    #[case("  https://example.com  ")]
    fn test_validate_url_accepts(#[case] input: &str) {
        assert!(validate_url(input).is_ok());
    }

    #[rstest]
    #[case("ftp://x")]
    #[case("example.com")]
    #[case("https://")]
    #[case("")]
    #[case("javascript:alert(1)")]
    fn test_validate_url_rejects(#[case] input: &str) {
        assert!(matches!(validate_url(input), Err(Blog2PodError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_url_reply() {
        let err = validate_url("ftp://x").unwrap_err();
        assert_eq!(Reply::failure(&err).to_string(), INVALID_URL_MESSAGE);
    }

    #[rstest]
    #[case("!blog2pod https://a.test/post", Some("https://a.test/post"))]
    #[case("!blog2pod   https://a.test/x   extra ", Some("https://a.test/x extra"))]
    #[case("!blog2pod", Some(""))]
    #[case("!blog2podcast https://a.test", None)]
    #[case("hello !blog2pod https://a.test", None)]
    fn test_parse_command(#[case] message: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_command(message).as_deref(), expected);
    }

    #[test]
    fn test_success_reply_mentions_skipped_chunks() {
        let podcast = PodcastFile {
            path: PathBuf::from("completed/Post.mp3"),
            title: "Post".to_string(),
            comment: "https://a.test/post".to_string(),
            has_artwork: false,
            skipped_chunks: 2,
        };
        let text = Reply::success(&podcast).to_string();

        assert!(text.starts_with("Your podcast was created successfully!"));
        assert!(text.contains("Original Link: https://a.test/post"));
        assert!(text.contains("2 sections could not be narrated"));
    }

    #[test]
    fn test_acknowledgement() {
        assert_eq!(Reply::Acknowledged.to_string(), "Link received. Processing...");
    }
}

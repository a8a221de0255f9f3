pub mod artwork;
pub mod assemble;
pub mod clean;
pub mod command;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod metadata;
pub mod parse;
pub mod pipeline;
pub mod speech;

pub use artwork::{fetch_artwork, resolve_header_image, square_crop_box};
pub use assemble::{PodcastFile, assemble, concat_chunks, podcast_file_name, strip_id3, tag_podcast};
pub use clean::{ChatClient, ChatConfig, NormalizedArticle, clean_article, normalize_whitespace};
pub use command::{Reply, parse_command, validate_url};
pub use config::{Blog2PodConfig, PipelineConfig, ServiceConfig};
pub use error::{Blog2PodError, Result};
pub use extract::{ExtractedArticle, Extraction, Heuristic, extract_article, generic_text, run_heuristics};
pub use fetch::{FetchConfig, FetchedPage, SourceDocument, fetch_page, fetch_url, render_url};
pub use parse::{Document, Element};
pub use pipeline::Blog2Pod;
pub use speech::{AudioChunk, ChunkFailure, SpeechClient, SpeechConfig, SynthesisReport, chunk_text, synthesize};

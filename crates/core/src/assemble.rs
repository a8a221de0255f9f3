//! Joins synthesized chunks into the finished podcast file.
//!
//! Chunks are concatenated as raw MPEG frames. Every response from the speech
//! service is a standalone MP3 that may carry its own ID3 tags, so those are
//! cut away first; otherwise players would stop or glitch at each chunk
//! boundary. A leading Xing, Info or VBRI frame only describes its own chunk
//! and would make players misread the joined file's length, so it goes too.
//! The joined stream is tagged and moved to the output directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use id3::frame::{Comment, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use tracing::{debug, info, warn};

use crate::clean::NormalizedArticle;
use crate::speech::{AudioChunk, SynthesisReport};
use crate::{Blog2PodError, Result};

const ID3V2_HEADER_LEN: usize = 10;
const ID3V1_TAG_LEN: usize = 128;
const MAX_FILE_STEM_CHARS: usize = 120;

/// The finished, tagged podcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastFile {
    pub path: PathBuf,
    pub title: String,
    /// Source article URL, stored as the ID3 comment.
    pub comment: String,
    pub has_artwork: bool,
    /// Chunks missing from the audio.
    pub skipped_chunks: usize,
}

/// Returns the MPEG payload of one MP3 file without ID3v2 or ID3v1 tags.
pub fn strip_id3(data: &[u8]) -> &[u8] {
    let mut start = 0;
    if data.len() >= ID3V2_HEADER_LEN && data.starts_with(b"ID3") {
        let size = data[6..10]
            .iter()
            .fold(0usize, |acc, &b| (acc << 7) | usize::from(b & 0x7f));
        let footer = if data[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };
        start = (ID3V2_HEADER_LEN + size + footer).min(data.len());
    }

    let mut end = data.len();
    if end - start >= ID3V1_TAG_LEN && data[end - ID3V1_TAG_LEN..].starts_with(b"TAG") {
        end -= ID3V1_TAG_LEN;
    }
    &data[start..end]
}

/// Length of the first MPEG Layer III frame when it is a Xing, Info or VBRI
/// header frame rather than audio.
pub fn info_frame_len(data: &[u8]) -> Option<usize> {
    const MPEG1_KBPS: [usize; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
    const MPEG2_KBPS: [usize; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

    let header = data.get(..4)?;
    if header[0] != 0xff || header[1] & 0xe0 != 0xe0 || (header[1] >> 1) & 0x03 != 0x01 {
        return None;
    }
    let version = (header[1] >> 3) & 0x03;
    let mpeg1 = match version {
        3 => true,
        0 | 2 => false,
        _ => return None,
    };
    let bitrates = if mpeg1 { &MPEG1_KBPS } else { &MPEG2_KBPS };
    let kbps = *bitrates.get(usize::from(header[2] >> 4))?;
    let rates: [usize; 3] = match version {
        3 => [44100, 48000, 32000],
        2 => [22050, 24000, 16000],
        _ => [11025, 12000, 8000],
    };
    let sample_rate = *rates.get(usize::from((header[2] >> 2) & 0x03))?;
    if kbps == 0 {
        return None;
    }
    let padding = usize::from((header[2] >> 1) & 0x01);
    let frame_len = (if mpeg1 { 144 } else { 72 }) * kbps * 1000 / sample_rate + padding;

    let mono = header[3] >> 6 == 0x03;
    let side_info = match (mpeg1, mono) {
        (true, false) => 32,
        (true, true) | (false, false) => 17,
        (false, true) => 9,
    };
    let marker_at = |offset: usize, marker: &[u8]| data.get(offset..offset + 4) == Some(marker);
    let is_info = marker_at(4 + side_info, b"Xing") || marker_at(4 + side_info, b"Info") || marker_at(36, b"VBRI");
    (is_info && frame_len <= data.len()).then_some(frame_len)
}

/// Reads the chunk files in index order and joins their audio.
pub fn concat_chunks(chunks: &[AudioChunk]) -> Result<Vec<u8>> {
    let mut ordered: Vec<&AudioChunk> = chunks.iter().collect();
    ordered.sort_by_key(|chunk| chunk.index);

    let mut out = Vec::new();
    for chunk in ordered {
        let data = fs::read(&chunk.path)
            .map_err(|e| Blog2PodError::AssemblyError(format!("reading {}: {}", chunk.path.display(), e)))?;
        let audio = strip_id3(&data);
        out.extend_from_slice(&audio[info_frame_len(audio).unwrap_or(0)..]);
    }
    Ok(out)
}

/// Writes an ID3v2.4 tag with title, source URL comment and optional cover.
pub fn tag_podcast(path: &Path, title: &str, source_url: &str, artwork: Option<&[u8]>) -> Result<()> {
    let mut tag = Tag::new();
    tag.set_title(title);
    tag.add_frame(Comment { lang: "eng".to_string(), description: String::new(), text: source_url.to_string() });
    if let Some(data) = artwork {
        tag.add_frame(Picture {
            mime_type: "image/jpeg".to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data: data.to_vec(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| Blog2PodError::AssemblyError(format!("tagging {}: {}", path.display(), e)))
}

/// File name for a podcast titled `title`.
///
/// Path separators and characters that are reserved on common filesystems
/// become `_`.
pub fn podcast_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_control() || r#"/\:*?"<>|"#.contains(c) { '_' } else { c })
        .take(MAX_FILE_STEM_CHARS)
        .collect();
    let stem = stem.trim().trim_matches('.').trim();
    format!("{}.mp3", if stem.is_empty() { "podcast" } else { stem })
}

/// Moves `staging` into `completed_dir` as `file_name`.
///
/// An existing file is never overwritten; a ` (2)`, ` (3)`, ... suffix is
/// added instead. Each name is claimed atomically, with a hard link or an
/// exclusive create, so concurrent runs with the same title get distinct
/// files. The exclusive create plus copy covers filesystems without hard
/// links and moves across devices.
pub fn relocate(staging: &Path, completed_dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(completed_dir)?;

    for dest in candidate_paths(completed_dir, file_name) {
        let claimed = match fs::hard_link(staging, &dest) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
            Err(e) => {
                debug!(error = %e, "hard link failed; copying instead");
                copy_exclusive(staging, &dest)?
            }
        };
        if claimed {
            if let Err(e) = fs::remove_file(staging) {
                warn!(path = %staging.display(), error = %e, "could not remove staging file");
            }
            return Ok(dest);
        }
    }
    Err(Blog2PodError::AssemblyError(format!("no free file name for {}", file_name)))
}

/// Copies `src` to `dest` only if `dest` does not exist yet.
fn copy_exclusive(src: &Path, dest: &Path) -> Result<bool> {
    let mut out = match OpenOptions::new().write(true).create_new(true).open(dest) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let copied = File::open(src).and_then(|mut input| io::copy(&mut input, &mut out));
    if let Err(e) = copied {
        drop(out);
        let _ = fs::remove_file(dest);
        return Err(e.into());
    }
    Ok(true)
}

fn candidate_paths<'a>(dir: &'a Path, file_name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
    std::iter::once(dir.join(file_name)).chain((2..).map(move |n| {
        if ext.is_empty() { dir.join(format!("{} ({})", stem, n)) } else { dir.join(format!("{} ({}).{}", stem, n, ext)) }
    }))
}

/// Builds, tags and relocates the podcast for `article`.
///
/// The staging file lives in `workdir`. Chunk files are removed once the
/// podcast is in place.
///
/// # Errors
///
/// [`Blog2PodError::AssemblyError`] when no chunk was synthesized or the
/// file could not be written, tagged or moved. Nothing reaches
/// `completed_dir` in that case.
pub fn assemble(
    report: &SynthesisReport, article: &NormalizedArticle, workdir: &Path, completed_dir: &Path,
) -> Result<PodcastFile> {
    if report.chunks.is_empty() {
        return Err(Blog2PodError::AssemblyError(format!(
            "no audio chunks were synthesized ({} of {} failed)",
            report.skipped(),
            report.total
        )));
    }

    let audio = concat_chunks(&report.chunks)?;
    let staging = workdir.join("podcast.mp3");
    fs::write(&staging, &audio).map_err(|e| Blog2PodError::AssemblyError(format!("writing audio: {}", e)))?;
    tag_podcast(&staging, &article.title, &article.source_url, article.artwork.as_deref())?;

    let path = relocate(&staging, completed_dir, &podcast_file_name(&article.title))
        .map_err(|e| Blog2PodError::AssemblyError(format!("moving podcast: {}", e)))?;

    for chunk in &report.chunks {
        if let Err(e) = fs::remove_file(&chunk.path) {
            warn!(path = %chunk.path.display(), error = %e, "could not remove chunk file");
        }
    }

    info!(path = %path.display(), bytes = audio.len(), skipped = report.skipped(), "podcast assembled");
    Ok(PodcastFile {
        path,
        title: article.title.clone(),
        comment: article.source_url.clone(),
        has_artwork: article.artwork.is_some(),
        skipped_chunks: report.skipped(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::ChunkFailure;
    use rstest::rstest;

    fn with_id3v2(payload: &[u8], tag_body: usize) -> Vec<u8> {
        let mut data = b"ID3\x04\x00\x00".to_vec();
        data.extend([0, 0, (tag_body >> 7) as u8 & 0x7f, tag_body as u8 & 0x7f]);
        data.extend(std::iter::repeat_n(0u8, tag_body));
        data.extend_from_slice(payload);
        data
    }

    fn with_id3v1(payload: &[u8]) -> Vec<u8> {
        let mut data = payload.to_vec();
        data.extend_from_slice(b"TAG");
        data.extend(std::iter::repeat_n(b' ', ID3V1_TAG_LEN - 3));
        data
    }

    fn article(title: &str) -> NormalizedArticle {
        NormalizedArticle {
            title: title.to_string(),
            clean_text: "text".to_string(),
            source_url: "https://blog.example.com/post".to_string(),
            header_image_url: None,
            artwork: None,
        }
    }

    fn write_chunks(dir: &Path, payloads: &[(usize, Vec<u8>)]) -> Vec<AudioChunk> {
        payloads
            .iter()
            .map(|(index, data)| {
                let path = dir.join(crate::speech::chunk_file_name(*index));
                fs::write(&path, data).unwrap();
                AudioChunk { index: *index, path }
            })
            .collect()
    }

    #[test]
    fn test_strip_id3_removes_both_tag_kinds() {
        assert_eq!(strip_id3(&with_id3v2(b"frames", 200)), b"frames");
        assert_eq!(strip_id3(&with_id3v1(b"frames")), b"frames");
        assert_eq!(strip_id3(&with_id3v1(&with_id3v2(b"frames", 3))), b"frames");
        assert_eq!(strip_id3(b"plain"), b"plain");
    }

    #[test]
    fn test_strip_id3_with_footer_and_truncated_tag() {
        let mut data = with_id3v2(b"", 4);
        data[5] = 0x10;
        data.extend_from_slice(b"3DI\x04\x00\x10\x00\x00\x00\x04audio");
        assert_eq!(strip_id3(&data), b"audio");

        assert_eq!(strip_id3(b"ID3\x04\x00\x00\x00\x00\x7f\x7fshort"), b"");
    }

    #[test]
    fn test_concat_orders_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = write_chunks(
            dir.path(),
            &[(3, with_id3v2(b"D", 5)), (0, b"A".to_vec()), (2, with_id3v1(b"C"))],
        );
        assert_eq!(concat_chunks(&chunks).unwrap(), b"ACD");
    }

    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo: 417 bytes.
    fn mpeg_frame(marker: Option<&[u8]>) -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xff, 0xfb, 0x90, 0x64]);
        if let Some(marker) = marker {
            frame[36..40].copy_from_slice(marker);
        }
        frame
    }

    #[rstest]
    #[case(Some(b"Xing".as_slice()), Some(417))]
    #[case(Some(b"Info".as_slice()), Some(417))]
    #[case(None, None)]
    fn test_info_frame_len(#[case] marker: Option<&[u8]>, #[case] expected: Option<usize>) {
        assert_eq!(info_frame_len(&mpeg_frame(marker)), expected);
    }

    #[test]
    fn test_concat_drops_info_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = mpeg_frame(Some(b"Info".as_slice()));
        first.extend_from_slice(b"A");
        let mut second = with_id3v2(&mpeg_frame(Some(b"Xing".as_slice())), 4);
        second.extend_from_slice(b"B");
        let chunks = write_chunks(dir.path(), &[(0, first), (1, second)]);

        assert_eq!(concat_chunks(&chunks).unwrap(), b"AB");
        assert_eq!(info_frame_len(b"FRAMES"), None);
    }

    #[rstest]
    #[case("My Post", "My Post.mp3")]
    #[case("a/b: c?", "a_b_ c_.mp3")]
    #[case("  ...  ", "podcast.mp3")]
    #[case("Line\nbreak", "Line_break.mp3")]
    fn test_podcast_file_name(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(podcast_file_name(title), expected);
    }

    #[test]
    fn test_concurrent_relocations_get_distinct_names() {
        let work = tempfile::tempdir().unwrap();
        let completed = work.path().join("completed");

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let staging = work.path().join(format!("staging-{}.mp3", i));
                fs::write(&staging, [i]).unwrap();
                let completed = completed.clone();
                std::thread::spawn(move || relocate(&staging, &completed, "Post.mp3").unwrap())
            })
            .collect();
        let mut dests: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        dests.sort();
        dests.dedup();

        assert_eq!(dests.len(), 8);
        let mut contents: Vec<u8> = dests.iter().flat_map(|d| fs::read(d).unwrap()).collect();
        contents.sort();
        assert_eq!(contents, (0..8u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_relocate_never_overwrites() {
        let work = tempfile::tempdir().unwrap();
        let completed = work.path().join("completed");

        let first = work.path().join("one.mp3");
        fs::write(&first, b"1").unwrap();
        let a = relocate(&first, &completed, "Post.mp3").unwrap();

        let second = work.path().join("two.mp3");
        fs::write(&second, b"2").unwrap();
        let b = relocate(&second, &completed, "Post.mp3").unwrap();

        assert_eq!(a, completed.join("Post.mp3"));
        assert_eq!(b, completed.join("Post (2).mp3"));
        assert_eq!(fs::read(&a).unwrap(), b"1");
        assert_eq!(fs::read(&b).unwrap(), b"2");
        assert!(!first.exists() && !second.exists());
    }

    #[test]
    fn test_assemble_tags_and_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let completed = tempfile::tempdir().unwrap();
        let chunks = write_chunks(work.path(), &[(0, b"AAAA".to_vec()), (2, b"CCCC".to_vec()), (3, b"DDDD".to_vec())]);
        let report = SynthesisReport {
            chunks: chunks.clone(),
            failures: vec![ChunkFailure { index: 1, reason: "status=500".to_string() }],
            total: 4,
        };

        let mut article = article("Degraded Post");
        article.artwork = Some(vec![0xff, 0xd8, 0xff, 0xd9]);
        let podcast = assemble(&report, &article, work.path(), completed.path()).unwrap();

        assert_eq!(podcast.path, completed.path().join("Degraded Post.mp3"));
        assert_eq!(podcast.skipped_chunks, 1);
        assert!(podcast.has_artwork);
        assert!(chunks.iter().all(|c| !c.path.exists()));

        let tag = Tag::read_from_path(&podcast.path).unwrap();
        assert_eq!(tag.title(), Some("Degraded Post"));
        assert_eq!(tag.comments().next().map(|c| c.text.as_str()), Some("https://blog.example.com/post"));
        let cover = tag.pictures().next().unwrap();
        assert_eq!(cover.picture_type, PictureType::CoverFront);
        assert_eq!(cover.data, vec![0xff, 0xd8, 0xff, 0xd9]);

        let bytes = fs::read(&podcast.path).unwrap();
        assert!(bytes.ends_with(b"AAAACCCCDDDD"));
    }

    #[test]
    fn test_assemble_without_chunks_fails_and_moves_nothing() {
        let work = tempfile::tempdir().unwrap();
        let completed = work.path().join("completed");
        let report = SynthesisReport {
            chunks: vec![],
            failures: vec![ChunkFailure { index: 0, reason: "down".to_string() }],
            total: 1,
        };

        let err = assemble(&report, &article("Nothing"), work.path(), &completed).unwrap_err();
        assert!(matches!(err, Blog2PodError::AssemblyError(_)));
        assert!(!completed.exists());
    }
}

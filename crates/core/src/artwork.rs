//! Header image discovery and podcast cover preparation.
//!
//! URL resolution always runs as part of extraction. Downloading and
//! re-encoding need the `artwork` feature; without it [`fetch_artwork`]
//! reports an [`Blog2PodError::ImageError`] and the podcast is produced
//! without a cover.

use tracing::debug;
use url::Url;

use crate::parse::Document;
use crate::{Blog2PodError, Result};

/// Images must be wider or taller than this to count as a header image.
pub const MIN_HEADER_IMAGE_PX: u32 = 200;

/// Finds a representative header image for the page.
///
/// Prefers the Open Graph `og:image` tag, then the first `<img>` whose
/// declared width or height exceeds [`MIN_HEADER_IMAGE_PX`]. Relative and
/// protocol-relative sources are resolved against the page URL.
pub fn resolve_header_image(doc: &Document) -> Option<String> {
    if let Some(og) = doc.meta_content("og:image")
        && let Some(url) = absolutize(doc.base_url(), &og)
    {
        return Some(url);
    }

    let images = doc.select("img[src]").ok()?;
    images.iter().find_map(|img| {
        let large = [img.attr("width"), img.attr("height")]
            .into_iter()
            .flatten()
            .filter_map(parse_dimension)
            .any(|px| px > MIN_HEADER_IMAGE_PX);
        if large { absolutize(doc.base_url(), img.attr("src")?) } else { None }
    })
}

/// Parses `"640"` or `"640px"`.
fn parse_dimension(value: &str) -> Option<u32> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}

fn absolutize(base: Option<&Url>, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    match Url::parse(src) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base?.join(src).ok().map(|url| url.to_string()),
    }
}

/// Centered square crop box for a `width` x `height` image.
///
/// Returns `(x, y, side)` where `side` is the smaller dimension.
pub fn square_crop_box(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Downloads the header image and turns it into square JPEG cover art.
#[cfg(feature = "artwork")]
pub async fn fetch_artwork(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Blog2PodError::ImageError(format!("{}: {}", url, e)))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Blog2PodError::ImageError(format!("{}: {}", url, e)))?;
    debug!(url, bytes = bytes.len(), "downloaded header image");

    tokio::task::spawn_blocking(move || to_square_jpeg(&bytes))
        .await
        .map_err(|e| Blog2PodError::ImageError(e.to_string()))?
}

#[cfg(not(feature = "artwork"))]
pub async fn fetch_artwork(_client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    debug!(url, "artwork feature disabled");
    Err(Blog2PodError::ImageError("artwork support is not compiled in".to_string()))
}

/// Crops an image to its centered square.
#[cfg(feature = "artwork")]
pub fn crop_to_square(img: &image::DynamicImage) -> image::DynamicImage {
    let (x, y, side) = square_crop_box(img.width(), img.height());
    img.crop_imm(x, y, side, side)
}

/// Decodes any supported image, crops it square and re-encodes it as JPEG.
#[cfg(feature = "artwork")]
pub fn to_square_jpeg(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(|e| Blog2PodError::ImageError(e.to_string()))?;
    let square = image::DynamicImage::ImageRgb8(crop_to_square(&img).to_rgb8());

    let mut out = std::io::Cursor::new(Vec::new());
    square
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .map_err(|e| Blog2PodError::ImageError(e.to_string()))?;
    Ok(out.into_inner())
}

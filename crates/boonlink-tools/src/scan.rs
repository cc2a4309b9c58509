//! QR payload extraction from image URLs.
//!
//! The scanner fetches the image bytes, decodes them to a luma grid, and
//! runs the QR recognizer over it. A `mock://` URL short-circuits all of
//! that and carries the payload verbatim — tests and demo chats use it to
//! avoid shipping PNGs around.

use std::time::Duration;

use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Images larger than this are refused outright.
const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// Scheme for pre-built payloads.
pub const MOCK_SCHEME: &str = "mock://";

/// Resolve an image URL to the QR payload string it encodes.
pub async fn extract_payload(image_url: &str) -> Result<String, String> {
    if let Some(payload) = image_url.strip_prefix(MOCK_SCHEME) {
        if payload.is_empty() {
            return Err("mock:// URL carries no payload".to_string());
        }
        return Ok(payload.to_string());
    }

    let parsed = Url::parse(image_url).map_err(|e| format!("imageUrl is not absolute: {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("unsupported URL scheme: {}", parsed.scheme()));
    }

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| format!("http client: {e}"))?;
    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| format!("image fetch failed: {e}"))?
        .error_for_status()
        .map_err(|e| format!("image fetch failed: {e}"))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("image read failed: {e}"))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(format!("image too large: {} bytes", bytes.len()));
    }

    decode_qr(&bytes)
}

/// Decode QR content from raw image bytes.
pub fn decode_qr(bytes: &[u8]) -> Result<String, String> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| format!("not a decodable image: {e}"))?
        .to_luma8();

    let mut prepared = rqrr::PreparedImage::prepare(image);
    let grids = prepared.detect_grids();
    if grids.is_empty() {
        return Err("no QR code found in image".to_string());
    }

    let (_, content) = grids[0]
        .decode()
        .map_err(|e| format!("QR decode failed: {e}"))?;
    Ok(content)
}

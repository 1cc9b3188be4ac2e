use base64::{engine::general_purpose, Engine as _};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use crate::error::PipelineError;
use crate::utils::http::get_http_client;
use crate::utils::logging::truncate_for_log;

const FALLBACK_IMAGE_MIME: &str = "image/jpeg";
const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageFile {
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

fn gemini_supports_image_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

fn is_opaque_mime(mime_type: &str) -> bool {
    mime_type.is_empty() || mime_type == "application/octet-stream" || mime_type == "binary/octet-stream"
}

/// Picks the media type sent upstream: a supported declared or sniffed type
/// first, then any image type, then `image/jpeg` when nothing is known.
/// A declared non-image type that sniffing cannot contradict is rejected.
pub fn resolve_image_mime(declared: Option<&str>, bytes: &[u8]) -> Result<String, PipelineError> {
    let declared = declared.map(normalize_image_mime_type);
    let sniffed = detect_mime_type(bytes).map(|value| normalize_image_mime_type(&value));
    let candidates: Vec<&String> = declared.iter().chain(sniffed.iter()).collect();

    if let Some(supported) = candidates
        .iter()
        .find(|candidate| gemini_supports_image_mime(candidate))
    {
        return Ok((*supported).clone());
    }
    if let Some(image) = candidates
        .iter()
        .find(|candidate| candidate.starts_with("image/"))
    {
        return Ok((*image).clone());
    }

    match declared.as_deref() {
        Some(value) if !is_opaque_mime(value) => Err(PipelineError::MissingInput(format!(
            "Image source did not return an image (content type {value})"
        ))),
        _ => Ok(FALLBACK_IMAGE_MIME.to_string()),
    }
}

fn decode_data_url(source: &str) -> Result<ImageFile, PipelineError> {
    let rest = source.strip_prefix("data:").unwrap_or(source);
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(PipelineError::MissingInput(
            "Malformed data URL: missing ',' separator".to_string(),
        ));
    };

    let mut header_parts = header.split(';');
    let declared = header_parts
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if !header_parts.any(|part| part.trim().eq_ignore_ascii_case("base64")) {
        return Err(PipelineError::MissingInput(
            "Only base64 encoded data URLs are supported".to_string(),
        ));
    }

    let cleaned: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|err| PipelineError::MissingInput(format!("Invalid base64 image data: {err}")))?;
    if bytes.is_empty() {
        return Err(PipelineError::MissingInput(
            "Uploaded image is empty".to_string(),
        ));
    }

    let mime_type = resolve_image_mime(declared, &bytes)?;
    Ok(ImageFile { bytes, mime_type })
}

async fn download_image(url: &Url) -> Result<ImageFile, PipelineError> {
    let client = get_http_client();
    let response = client.get(url.as_str()).send().await.map_err(|err| {
        warn!(
            "Failed to fetch image {url}: {err} (timeout={}, connect={})",
            err.is_timeout(),
            err.is_connect()
        );
        PipelineError::MissingInput(format!("Failed to fetch image: {err}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(
            "Image download failed for {url} with status {}: {}",
            status,
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return Err(PipelineError::MissingInput(format!(
            "Failed to fetch image: status {status}"
        )));
    }

    let declared = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let bytes = response
        .bytes()
        .await
        .map_err(|err| PipelineError::MissingInput(format!("Failed to read image bytes: {err}")))?
        .to_vec();
    if bytes.is_empty() {
        return Err(PipelineError::MissingInput(
            "Image source returned an empty body".to_string(),
        ));
    }

    let mime_type = resolve_image_mime(declared.as_deref(), &bytes)?;
    debug!(
        "Fetched image {url}: {} bytes, declared={:?}, resolved={}",
        bytes.len(),
        declared,
        mime_type
    );
    Ok(ImageFile { bytes, mime_type })
}

/// Turns an `http(s)` URL or a base64 `data:` URL into image bytes.
pub async fn load_image(source: &str) -> Result<ImageFile, PipelineError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(PipelineError::MissingInput("imageUrl is required".to_string()));
    }

    if source
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return decode_data_url(source);
    }

    let url = Url::parse(source)
        .map_err(|err| PipelineError::MissingInput(format!("Invalid imageUrl: {err}")))?;
    match url.scheme() {
        "http" | "https" => download_image(&url).await,
        other => Err(PipelineError::MissingInput(format!(
            "Unsupported imageUrl scheme: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_support::{spawn_stub, JPEG_BYTES, PNG_BYTES};
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;

    fn data_url(mime: &str, bytes: &[u8]) -> String {
        format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
    }

    #[tokio::test]
    async fn decodes_uploaded_data_url() {
        let image = load_image(&data_url("image/png", PNG_BYTES)).await.unwrap();
        assert_eq!(image.bytes, PNG_BYTES);
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.to_base64(), general_purpose::STANDARD.encode(PNG_BYTES));
    }

    #[tokio::test]
    async fn data_url_with_jpg_alias_is_normalized() {
        let image = load_image(&data_url("image/jpg", JPEG_BYTES)).await.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn rejects_blank_and_unsupported_sources() {
        for source in ["", "   ", "ftp://example.com/a.png", "not a url", "data:image/png,abc"] {
            let err = load_image(source).await.unwrap_err();
            assert_eq!(err.kind(), "MissingInput", "source {source:?}");
        }
    }

    #[test]
    fn sniffed_type_wins_over_opaque_header() {
        let mime = resolve_image_mime(Some("application/octet-stream"), PNG_BYTES).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn unknown_bytes_without_header_fall_back_to_jpeg() {
        let mime = resolve_image_mime(None, b"not really an image").unwrap();
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn html_page_is_not_an_image() {
        let err = resolve_image_mime(Some("text/html"), b"<html></html>").unwrap_err();
        assert_eq!(err.kind(), "MissingInput");
    }

    #[tokio::test]
    async fn downloads_image_with_content_type() {
        let router = Router::new()
            .route(
                "/still.jpg",
                get(|| async { ([(header::CONTENT_TYPE, "image/jpeg; charset=binary")], JPEG_BYTES) }),
            )
            .route("/missing.jpg", get(|| async { StatusCode::NOT_FOUND }))
            .route("/empty.jpg", get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], "") }));
        let base = spawn_stub(router).await;

        let image = load_image(&format!("{base}/still.jpg")).await.unwrap();
        assert_eq!(image.bytes, JPEG_BYTES);
        assert_eq!(image.mime_type, "image/jpeg");

        let missing = load_image(&format!("{base}/missing.jpg")).await.unwrap_err();
        assert_eq!(missing.kind(), "MissingInput");

        let empty = load_image(&format!("{base}/empty.jpg")).await.unwrap_err();
        assert_eq!(empty.kind(), "MissingInput");
    }
}

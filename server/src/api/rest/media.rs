//! Media streaming
//!
//! Serves files below a source with single byte-range support, so video and
//! audio elements can seek, and weak-validator ETags so thumbnails and manga
//! pages are cached by the browser.

use crate::api::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::io::SeekFrom;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_stream::Stream;

use super::error::{validate_path, AppError};

/// Read size per streamed chunk
const CHUNK_SIZE: usize = 256 * 1024;

// ============================================================================
// ROUTES
// ============================================================================

pub fn media_routes() -> Router<AppState> {
    Router::new().route("/media/:key/*path", get(stream_media))
}

// ============================================================================
// RANGES
// ============================================================================

/// Inclusive byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a `Range` header against a file of `len` bytes.
///
/// Unsupported or malformed headers (other units, multiple ranges) yield
/// `Ok(None)` and the whole file is served. A well-formed range that starts
/// past the end is an error.
pub fn parse_range(value: &str, len: u64) -> Result<Option<ByteRange>, AppError> {
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if ranges.contains(',') {
        return Ok(None);
    }
    let Some((start, end)) = ranges.trim().split_once('-') else {
        return Ok(None);
    };

    let range = match (start.trim(), end.trim()) {
        ("", "") => return Ok(None),
        ("", suffix) => {
            let Ok(suffix) = suffix.parse::<u64>() else {
                return Ok(None);
            };
            if suffix == 0 || len == 0 {
                return Err(AppError::RangeNotSatisfiable(len));
            }
            ByteRange {
                start: len.saturating_sub(suffix),
                end: len - 1,
            }
        }
        (start, end) => {
            let Ok(start) = start.parse::<u64>() else {
                return Ok(None);
            };
            let end = if end.is_empty() {
                None
            } else {
                match end.parse::<u64>() {
                    Ok(e) => Some(e),
                    Err(_) => return Ok(None),
                }
            };
            if end.is_some_and(|e| e < start) {
                return Ok(None);
            }
            if start >= len {
                return Err(AppError::RangeNotSatisfiable(len));
            }
            ByteRange {
                start,
                end: end.map_or(len - 1, |e| e.min(len - 1)),
            }
        }
    };

    Ok(Some(range))
}

/// Weak validator derived from path, size and modification time
pub fn entity_tag(rel_path: &str, len: u64, modified: Option<SystemTime>) -> String {
    let nanos = modified
        .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let hash = blake3::hash(format!("{}:{}:{}", rel_path, len, nanos).as_bytes());
    format!("W/\"{}\"", &hash.to_hex()[..16])
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn stream_media(
    State(state): State<AppState>,
    Path((key, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let source = state.sources.get(&key)?;
    let rel = validate_path(&path)?;
    if rel.is_empty() {
        return Err(AppError::BadRequest("File path is required".into()));
    }

    // Canonicalize both sides so symlinks cannot lead out of the source
    let root = tokio::fs::canonicalize(&source.path).await?;
    let file_path = tokio::fs::canonicalize(source.resolve(&rel)?).await?;
    if !file_path.starts_with(&root) {
        tracing::warn!(source = %key, path = %rel, "refusing path outside source");
        return Err(AppError::NotFound("File not found".into()));
    }

    let metadata = tokio::fs::metadata(&file_path).await?;
    if !metadata.is_file() {
        return Err(AppError::NotFound("File not found".into()));
    }
    let len = metadata.len();
    let etag = entity_tag(&rel, len, metadata.modified().ok());

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if if_none_match.is_some_and(|v| v.split(',').any(|t| t.trim() == etag || t.trim() == "*")) {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, &etag)
            .body(Body::empty())
            .map_err(|e| AppError::Internal(e.to_string()));
    }

    let range = match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(value) => parse_range(value, len)?,
        None => None,
    };

    let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
    let file = tokio::fs::File::open(&file_path).await?;

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ETAG, &etag)
        .header(header::CACHE_CONTROL, "private, max-age=3600");

    let response = match range {
        Some(range) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, len),
            )
            .header(header::CONTENT_LENGTH, range.len())
            .body(file_body(file, range.start, range.len())),
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, len)
            .body(file_body(file, 0, len)),
    };

    response.map_err(|e| AppError::Internal(e.to_string()))
}

fn file_body(file: tokio::fs::File, start: u64, length: u64) -> Body {
    body_from_stream(read_range(file, start, length))
}

fn body_from_stream<S>(stream: S) -> Body
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    Body::from_stream(stream)
}

fn read_range(
    mut file: tokio::fs::File,
    start: u64,
    length: u64,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::try_stream! {
        file.seek(SeekFrom::Start(start)).await?;
        let mut remaining = length;
        let mut buf = vec![0u8; CHUNK_SIZE];
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            remaining -= n as u64;
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    }
}

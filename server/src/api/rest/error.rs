//! Error handling for REST API
//!
//! Provides the `AppError` type used across all REST endpoints and the path
//! helpers shared by the media and library routes.

use crate::library::LibraryError;
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    /// Carries the full length of the requested file
    RangeNotSatisfiable(u64),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::RangeNotSatisfiable(len) => {
                let body = serde_json::json!({ "error": "Requested range not satisfiable" });
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{}", len))],
                    Json(body),
                )
                    .into_response();
            }
            AppError::Internal(msg) => {
                // SECURITY: Log full details server-side, return generic message to client
                tracing::error!(details = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // SECURITY: Log the full error server-side but return generic message to client
        tracing::error!("Internal error: {}", err);
        AppError::Internal("An internal error occurred".to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AppError::Internal("An internal error occurred".to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return AppError::NotFound("File not found".into());
        }
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::UnknownSource(key) => {
                AppError::BadRequest(format!("Unknown source key: {}", key))
            }
            e @ LibraryError::WrongKind { .. } => AppError::BadRequest(e.to_string()),
            LibraryError::InvalidPath(_) => AppError::BadRequest("Invalid path".into()),
            LibraryError::NotFound(what) => AppError::NotFound(format!("Not found: {}", what)),
            LibraryError::Io(e) => e.into(),
            LibraryError::Db(e) => e.into(),
        }
    }
}

// ============================================================================
// PATH VALIDATION
// ============================================================================

/// Validate and normalize a client supplied relative path. The value has
/// already been decoded by the extractor and is checked as is.
/// Returns the path without leading/trailing or duplicate slashes; the empty
/// string stands for the namespace top level.
pub fn validate_path(path: &str) -> Result<String, AppError> {
    // Reject null bytes (could truncate path in C-based systems)
    if path.contains('\0') {
        return Err(AppError::BadRequest("Path contains invalid null byte".into()));
    }

    if path.contains('\\') {
        return Err(AppError::BadRequest("Path contains invalid backslash".into()));
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(AppError::BadRequest("Path contains invalid control characters".into()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(AppError::BadRequest(
                    "Path contains invalid traversal sequence '..'".into(),
                ))
            }
            s => segments.push(s),
        }
    }

    Ok(segments.join("/"))
}

/// Percent-encode one path segment for use in a URL
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Build the streaming URL of a file: `/media/{key}/{segments...}`
pub fn media_url(source_key: &str, parts: &[&str]) -> String {
    let mut url = format!("/media/{}", encode_segment(source_key));
    for part in parts {
        for segment in part.split('/').filter(|s| !s.is_empty()) {
            url.push('/');
            url.push_str(&encode_segment(segment));
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate_path("foo").unwrap(), "foo");
        assert_eq!(validate_path("/foo/bar (2019).mkv").unwrap(), "foo/bar (2019).mkv");
        assert_eq!(validate_path("").unwrap(), "");
        assert_eq!(validate_path("進撃の巨人/第1巻").unwrap(), "進撃の巨人/第1巻");
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("/foo/../bar").is_err());
    }

    #[test]
    fn test_percent_sequences_are_literal() {
        assert_eq!(validate_path("Mix 100%25.mkv").unwrap(), "Mix 100%25.mkv");
        assert_eq!(validate_path("a/%2e%2e/b").unwrap(), "a/%2e%2e/b");
    }

    #[test]
    fn test_rejects_null_bytes() {
        assert!(validate_path("/foo\0bar").is_err());
    }

    #[test]
    fn test_normalizes_slashes() {
        assert_eq!(validate_path("//foo///bar/").unwrap(), "foo/bar");
        assert_eq!(validate_path("./foo/./bar").unwrap(), "foo/bar");
    }

    #[test]
    fn test_rejects_backslash() {
        assert!(validate_path("/foo\\bar").is_err());
    }

    #[test]
    fn test_media_url() {
        assert_eq!(
            media_url("ROOT_A", &["Seinen", "Monster/Vol 1/01.jpg"]),
            "/media/ROOT_A/Seinen/Monster/Vol%201/01.jpg"
        );
        assert_eq!(media_url("M_X", &["", "a#b.mp3"]), "/media/M_X/a%23b.mp3");
    }
}

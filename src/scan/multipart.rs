//! File part extraction from multipart bodies.
//!
//! # Responsibilities
//! - Resolve the boundary from the request's `Content-Type`
//! - Walk parts in order and return the first one named `file`
//! - Leave the chosen part unread so it can be streamed onward
//!
//! Parts before the match are skipped by the parser without being collected.
//! Anything after the match is never read.

use bytes::Bytes;
use futures_util::Stream;

use crate::scan::error::{BoxError, ScanError};

/// Form field name carrying the upload.
pub const FILE_FIELD: &str = "file";
/// Filename reported when the part does not declare one.
pub const UNKNOWN_FILENAME: &str = "unknown";

/// The upload part of a multipart body, not yet read.
pub struct FilePart {
    /// Declared filename, or [`UNKNOWN_FILENAME`].
    pub filename: String,
    /// Lazily read content of the part.
    pub content: multer::Field<'static>,
    // Keeps the parser state alive for as long as the part is streamed.
    _multipart: multer::Multipart<'static>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Read the multipart boundary out of a `Content-Type` header value.
///
/// Any `multipart/*` subtype is accepted.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, ScanError> {
    let media: mime::Mime = content_type
        .parse()
        .map_err(|e| ScanError::InvalidContentType(format!("unparseable Content-Type: {e}")))?;

    if media.type_() != mime::MULTIPART {
        return Err(ScanError::InvalidContentType(format!(
            "Content-Type `{}` is not multipart",
            media.essence_str()
        )));
    }

    match media.get_param(mime::BOUNDARY) {
        Some(boundary) if !boundary.as_str().is_empty() => Ok(boundary.as_str().to_string()),
        _ => Err(ScanError::InvalidContentType("missing multipart boundary".to_string())),
    }
}

/// Find the `file` part in a multipart byte stream.
pub async fn extract<S, O, E>(payload: S, boundary: impl Into<String>) -> Result<FilePart, ScanError>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<BoxError> + 'static,
{
    let mut multipart = multer::Multipart::new(payload, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ScanError::from_multipart)?
    {
        if field.name() != Some(FILE_FIELD) {
            tracing::trace!(field = ?field.name(), "Skipping multipart part");
            continue;
        }

        let filename = field
            .file_name()
            .and_then(base_name)
            .unwrap_or(UNKNOWN_FILENAME)
            .to_string();

        return Ok(FilePart {
            filename,
            content: field,
            _multipart: multipart,
        });
    }

    Err(ScanError::NoFilePart)
}

/// Strip any client-side directory components from a declared filename.
fn base_name(declared: &str) -> Option<&str> {
    declared
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
}

//! Upload preparation: compression plus the metadata record the external
//! data store expects.
//!
//! The actual storage write and auth belong to the hosted backend and are
//! out of scope; this module produces the bytes to send and a fully
//! populated [`Photo`] record for them.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

use crate::compress::{process_upload, ProcessedUpload};
use crate::models::{storage_filename, Photo};

/// Errors a host may want to match on before handing bytes to the backend.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload is empty")]
    EmptyFile,
    #[error("original filename {0:?} has no extension")]
    MissingExtension(String),
}

/// A prepared upload: the (possibly compressed) bytes and their metadata record.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub photo: Photo,
    pub bytes: Vec<u8>,
    /// Whether compression changed the bytes; hosts use this to tell guests
    /// their large photo was optimized.
    pub compressed: bool,
}

/// Run a guest's file through compression and build its metadata record.
///
/// Compression failures are not errors here: the policy is to fall back to
/// the original bytes and let the upload proceed.
pub fn prepare_upload(
    original_name: &str,
    bytes: Vec<u8>,
    declared_mime: &str,
    uploaded_by: &str,
) -> Result<PreparedUpload, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::EmptyFile);
    }

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let filename = storage_filename(original_name, now_ms)
        .ok_or_else(|| UploadError::MissingExtension(original_name.to_string()))?;

    let original_size = bytes.len();
    let ProcessedUpload { bytes, mime_type, compressed, .. } =
        process_upload(bytes, declared_mime);

    info!(
        %filename,
        original_size,
        stored_size = bytes.len(),
        compressed,
        "Prepared upload"
    );

    let photo = Photo {
        storage_path: format!("uploads/{}", filename),
        filename,
        uploaded_by: uploaded_by.to_string(),
        file_size: bytes.len() as u64,
        mime_type,
        uploaded_at_ms: now_ms,
    };

    Ok(PreparedUpload { photo, bytes, compressed })
}

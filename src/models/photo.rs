use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

/// Sequence counter folded into storage filenames so two uploads landing in
/// the same millisecond still get distinct names.
static NAME_SEQ: AtomicU64 = AtomicU64::new(0);

/// Metadata record for one uploaded guest photo.
///
/// This mirrors the row the external data store keeps per photo; the
/// renderers only ever consume lists of these (after filtering) plus a
/// resolved [`PhotoSource`] per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    /// Generated storage filename, e.g. `1693400000000-a1b2c3d4.jpg`.
    pub filename: String,
    /// Path within the storage bucket, e.g. `uploads/<filename>`.
    pub storage_path: String,
    /// Identifier of the uploading guest.
    pub uploaded_by: String,
    /// Size of the stored file in bytes (after compression, if any).
    pub file_size: u64,
    /// Declared MIME type of the stored file.
    pub mime_type: String,
    /// Upload timestamp in milliseconds since the epoch.
    pub uploaded_at_ms: i64,
}

impl Photo {
    /// Whether this record should participate in rendering.
    ///
    /// Storage listings can contain placeholder objects and junk paths; a
    /// photo is renderable only if its storage path is non-empty after
    /// trimming, does not reference the empty-folder placeholder, is longer
    /// than five characters, does not start with a dot, and has an extension.
    pub fn is_renderable(&self) -> bool {
        let path = self.storage_path.trim();
        !path.is_empty()
            && !path.contains(".emptyFolderPlaceholder")
            && path.len() > 5
            && !path.starts_with('.')
            && path.contains('.')
    }
}

/// Filter a photo list down to the records worth rendering.
pub fn renderable_photos(photos: &[Photo]) -> Vec<&Photo> {
    photos.iter().filter(|p| p.is_renderable()).collect()
}

/// Build a unique storage filename for an upload.
///
/// Scheme: `{millis}-{suffix}.{ext}` where the suffix is an xxh3 hash of the
/// original name, the timestamp, and a process-local sequence number. The
/// extension is taken from the original name unchanged.
pub fn storage_filename(original_name: &str, now_ms: i64) -> Option<String> {
    let ext = original_name.rsplit('.').next().filter(|e| {
        !e.is_empty() && e.len() < original_name.len() && !e.contains('/')
    })?;
    let seq = NAME_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut input = Vec::with_capacity(original_name.len() + 16);
    input.extend_from_slice(original_name.as_bytes());
    input.extend_from_slice(&now_ms.to_le_bytes());
    input.extend_from_slice(&seq.to_le_bytes());
    let suffix = xxh3_64(&input);
    Some(format!("{}-{:08x}.{}", now_ms, suffix as u32, ext))
}

/// A decodable image source handed to the renderers.
///
/// Renderers never know how a source was obtained (local file, resolved
/// storage object, or inline bytes); they only decode it.
#[derive(Debug, Clone)]
pub enum PhotoSource {
    /// An image file on disk.
    Path(PathBuf),
    /// Already-fetched encoded bytes with their declared MIME type.
    Bytes { data: Arc<Vec<u8>>, mime_type: String },
}

impl PhotoSource {
    /// Stable identity for caching decoded results across render passes.
    pub fn cache_key(&self) -> u64 {
        match self {
            PhotoSource::Path(p) => xxh3_64(p.to_string_lossy().as_bytes()),
            PhotoSource::Bytes { data, .. } => xxh3_64(data),
        }
    }
}

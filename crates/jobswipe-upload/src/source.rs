//! Local file sources

use crate::{FileKind, Result, UploadError};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use jobswipe_storage::encode_path;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const READ_CHUNK: usize = 64 * 1024;

/// Where payloads come from
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Size of the resource if it can be known without reading it
    async fn size_hint(&self, uri: &str) -> Option<u64>;

    /// Read the whole resource, giving up with `Cancelled` once `cancel` fires
    async fn fetch(&self, uri: &str, cancel: &CancellationToken) -> Result<Bytes>;
}

/// Reads plain paths and `file://` URIs from the local filesystem
#[derive(Clone, Debug, Default)]
pub struct LocalFileSource;

impl LocalFileSource {
    /// Create a new source
    pub fn new() -> Self {
        Self
    }

    /// Resolve a URI to a path. Only `file://` URIs are percent-decoded;
    /// plain paths are taken as-is.
    pub fn resolve(uri: &str) -> PathBuf {
        match uri.strip_prefix("file://") {
            Some(raw) => match urlencoding::decode(raw) {
                Ok(decoded) => PathBuf::from(decoded.into_owned()),
                Err(_) => PathBuf::from(raw),
            },
            None => PathBuf::from(uri),
        }
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn size_hint(&self, uri: &str) -> Option<u64> {
        tokio::fs::metadata(Self::resolve(uri)).await.ok().map(|m| m.len())
    }

    async fn fetch(&self, uri: &str, cancel: &CancellationToken) -> Result<Bytes> {
        let path = Self::resolve(uri);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| UploadError::NetworkFetch(format!("{}: {}", path.display(), e)))?;

        let mut buf = BytesMut::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                read = file.read(&mut chunk) => read,
            };
            let n = read.map_err(|e| UploadError::NetworkFetch(format!("{}: {}", path.display(), e)))?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        debug!(bytes = buf.len(), path = %path.display(), "Read local file");
        Ok(buf.freeze())
    }
}

/// A file chosen by the user, as a picker reports it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickedFile {
    /// Local URI
    pub uri: String,
    /// Display name
    pub name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Declared size
    pub size_bytes: u64,
}

impl PickedFile {
    /// Describe a local file
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::NetworkFetch(format!("{}: {}", path.display(), e)))?;
        if !meta.is_file() {
            return Err(UploadError::NetworkFetch(format!("{} is not a file", path.display())));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        Ok(Self {
            uri: format!("file://{}", encode_path(&path.to_string_lossy())),
            mime_type: mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string(),
            name,
            size_bytes: meta.len(),
        })
    }

    /// The check a picking screen runs before submitting to the engine
    pub fn check_selection(&self, kind: FileKind) -> Result<()> {
        if self.size_bytes == 0 {
            return Err(UploadError::EmptyFile);
        }
        let limit = kind.selection_limit();
        if self.size_bytes > limit {
            return Err(UploadError::FileTooLarge {
                size: self.size_bytes,
                limit,
            });
        }
        if kind.is_document() && self.mime_type != "application/pdf" {
            return Err(UploadError::InvalidRequest(format!(
                "{} must be a PDF, got {}",
                self.name, self.mime_type
            )));
        }
        if !kind.is_document() && !self.mime_type.starts_with("image/") {
            return Err(UploadError::InvalidRequest(format!(
                "{} must be an image, got {}",
                self.name, self.mime_type
            )));
        }
        Ok(())
    }
}

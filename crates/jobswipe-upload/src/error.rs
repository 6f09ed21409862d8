//! Upload error taxonomy

use jobswipe_storage::StorageError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload errors.
///
/// Display strings are meant to be shown to the end user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Nobody is signed in
    #[error("No active session. Please sign in and try again.")]
    NoSession,

    /// Target bucket does not exist
    #[error("Storage bucket \"{0}\" does not exist.")]
    BucketNotFound(String),

    /// Storage policy rejected the call
    #[error("Permission denied by storage: {0}")]
    PermissionDenied(String),

    /// Storage service unreachable, or the session vanished mid-upload
    #[error("Unable to reach the storage service: {0}")]
    Connectivity(String),

    /// Reading the file took longer than the per-attempt budget
    #[error("Upload timed out after {seconds} seconds.")]
    Timeout { seconds: u64 },

    /// File has no content
    #[error("The selected file is empty.")]
    EmptyFile,

    /// File exceeds the size ceiling
    #[error("The selected file is too large ({size} bytes, limit {limit} bytes).")]
    FileTooLarge { size: u64, limit: u64 },

    /// Local resource could not be read into a payload
    #[error("Could not read the selected file: {0}")]
    NetworkFetch(String),

    /// Write rejected for a reason other than permissions
    #[error("Upload failed: {0}")]
    StorageWrite(String),

    /// Caller cancelled the upload
    #[error("Upload cancelled.")]
    Cancelled,

    /// Request is malformed
    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),
}

impl UploadError {
    /// Whether retrying can never succeed.
    ///
    /// `PermissionDenied` is fatal only when `fail_fast_on_permission_denied`
    /// is set; otherwise it consumes retry slots like a transient failure.
    pub fn is_fatal(&self, fail_fast_on_permission_denied: bool) -> bool {
        match self {
            Self::NoSession
            | Self::BucketNotFound(_)
            | Self::EmptyFile
            | Self::FileTooLarge { .. }
            | Self::Cancelled
            | Self::InvalidRequest(_) => true,
            Self::PermissionDenied(_) => fail_fast_on_permission_denied,
            Self::Connectivity(_)
            | Self::Timeout { .. }
            | Self::NetworkFetch(_)
            | Self::StorageWrite(_) => false,
        }
    }

    /// Map a failed storage call (bucket check or write)
    pub fn from_storage(err: StorageError) -> Self {
        match err {
            StorageError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            StorageError::BucketNotFound(bucket) => Self::BucketNotFound(bucket),
            e if e.is_unreachable() => Self::Connectivity(e.to_string()),
            e => Self::StorageWrite(e.to_string()),
        }
    }

    /// Map a failed connectivity probe
    pub fn from_probe(err: StorageError) -> Self {
        Self::Connectivity(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(UploadError::NoSession.is_fatal(false));
        assert!(UploadError::EmptyFile.is_fatal(false));
        assert!(UploadError::FileTooLarge { size: 2, limit: 1 }.is_fatal(false));
        assert!(UploadError::BucketNotFound("resumes".into()).is_fatal(false));

        assert!(!UploadError::Connectivity("down".into()).is_fatal(true));
        assert!(!UploadError::Timeout { seconds: 60 }.is_fatal(true));
        assert!(!UploadError::StorageWrite("500".into()).is_fatal(true));

        let denied = UploadError::PermissionDenied("policy".into());
        assert!(denied.is_fatal(true));
        assert!(!denied.is_fatal(false));
    }

    #[test]
    fn test_storage_mapping() {
        let err = UploadError::from_storage(StorageError::PermissionDenied("rls".into()));
        assert_eq!(err, UploadError::PermissionDenied("rls".into()));

        let err = UploadError::from_storage(StorageError::Connection("refused".into()));
        assert!(matches!(err, UploadError::Connectivity(_)));

        let err = UploadError::from_storage(StorageError::Api {
            status: 413,
            error: "Payload too large".into(),
            message: "The object exceeded the maximum allowed size".into(),
        });
        assert!(matches!(err, UploadError::StorageWrite(_)));
    }

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(
            UploadError::FileTooLarge { size: 11_534_336, limit: 10_485_760 }.to_string(),
            "The selected file is too large (11534336 bytes, limit 10485760 bytes)."
        );
        assert_eq!(UploadError::Timeout { seconds: 60 }.to_string(), "Upload timed out after 60 seconds.");
    }
}

//! # JobSwipe Upload
//!
//! Moves a locally selected file (resume, ID scans, profile picture) into
//! the user's folder of the matching storage bucket.
//!
//! ## Features
//!
//! - **Bounded retries**: at most five attempts with exponential backoff and jitter
//! - **Preflight**: connectivity probe and bucket check before every write
//! - **Size guard**: empty or oversized payloads fail before any network call
//! - **Cancellation**: every step and backoff wait honours a `CancellationToken`
//!
//! ## Example
//!
//! ```rust,ignore
//! use jobswipe_upload::{FileKind, LocalFileSource, UploadEngine};
//!
//! let engine = UploadEngine::new(storage, sessions, Arc::new(LocalFileSource::new()));
//! let path = FileKind::Resume.destination_path(&user_id, "resume.pdf", Utc::now());
//! let outcome = engine.upload("file:///cache/resume.pdf", &path, FileKind::Resume).await?;
//! println!("Uploaded to {}", outcome.public_url);
//! ```

mod engine;
mod error;
mod kind;
mod policy;
mod source;

pub use engine::{
    AttemptOutcome, StateObserver, UploadAttempt, UploadEngine, UploadOutcome, UploadRequest, UploadState,
};
pub use error::{Result, UploadError};
pub use kind::{sanitize_file_name, FileKind};
pub use policy::{UploadPolicy, MAX_UPLOAD_SIZE};
pub use source::{FileSource, LocalFileSource, PickedFile};

pub use tokio_util::sync::CancellationToken;

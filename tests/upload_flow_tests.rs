//! End-to-end tests for the upload engine
//!
//! The engine runs against `MemoryStorage`, a `SessionStore` and real local
//! files, covering the guarantees callers rely on.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use jobswipe_storage::{
    BucketInfo, ListOptions, MemoryStorage, ObjectEntry, ObjectStorage, Session, SessionStore, StorageError,
    UploadOptions,
};
use jobswipe_upload::{
    CancellationToken, FileKind, FileSource, LocalFileSource, PickedFile, UploadEngine, UploadError,
    UploadPolicy, UploadRequest, MAX_UPLOAD_SIZE,
};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const USER: &str = "7f0c2a9e-user";

/// Counts every call that reaches the backend
struct CountingStorage {
    inner: MemoryStorage,
    calls: AtomicU32,
    writes: AtomicU32,
    probe_down: bool,
}

impl CountingStorage {
    fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            calls: AtomicU32::new(0),
            writes: AtomicU32::new(0),
            probe_down: false,
        }
    }

    fn offline(inner: MemoryStorage) -> Self {
        Self {
            probe_down: true,
            ..Self::new(inner)
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for CountingStorage {
    async fn list_buckets(&self, session: &Session) -> jobswipe_storage::Result<Vec<BucketInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_buckets(session).await
    }

    async fn list_objects(
        &self,
        session: &Session,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> jobswipe_storage::Result<Vec<ObjectEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_objects(session, bucket, prefix, options).await
    }

    async fn probe(&self, session: &Session, bucket: &str, path: &str) -> jobswipe_storage::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_down {
            return Err(StorageError::Connection("network unreachable".to_string()));
        }
        self.inner.probe(session, bucket, path).await
    }

    async fn upload(
        &self,
        session: &Session,
        bucket: &str,
        path: &str,
        payload: Bytes,
        options: UploadOptions,
    ) -> jobswipe_storage::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upload(session, bucket, path, payload, options).await
    }

    async fn remove(&self, session: &Session, bucket: &str, paths: &[String]) -> jobswipe_storage::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(session, bucket, paths).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }
}

/// Fixed payload, so paused-clock tests never wait on the filesystem
struct FixedSource(Bytes);

#[async_trait]
impl FileSource for FixedSource {
    async fn size_hint(&self, _uri: &str) -> Option<u64> {
        Some(self.0.len() as u64)
    }

    async fn fetch(&self, _uri: &str, _cancel: &CancellationToken) -> jobswipe_upload::Result<Bytes> {
        Ok(self.0.clone())
    }
}

fn signed_in() -> Arc<SessionStore> {
    Arc::new(SessionStore::with_session(Session::new(USER, "access-token")))
}

fn write_file(dir: &Path, name: &str, size: usize) -> String {
    let path = dir.join(name);
    std::fs::write(&path, vec![0x25u8; size]).unwrap();
    format!("file://{}", path.display())
}

#[tokio::test]
async fn test_resume_uploads_on_first_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let uri = write_file(dir.path(), "resume.pdf", 1024 * 1024);

    let memory = MemoryStorage::with_buckets(["resumes"]);
    let storage = Arc::new(CountingStorage::new(memory.clone()));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(LocalFileSource::new()));

    let destination = FileKind::Resume.destination_path(USER, "resume.pdf", Utc::now());
    let started = std::time::Instant::now();
    let outcome = engine.upload(&uri, &destination, FileKind::Resume).await.unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.bucket, "resumes");
    assert_eq!(outcome.final_path, destination);
    assert!(outcome.final_path.starts_with(&format!("{}/resume/", USER)));
    assert!(outcome.final_path.ends_with("_resume.pdf"));
    assert!(started.elapsed() < Duration::from_secs(1));

    let stored = memory.object("resumes", &destination).unwrap();
    assert_eq!(stored.data.len(), 1024 * 1024);
    assert_eq!(stored.content_type, "application/pdf");
}

#[tokio::test]
async fn test_oversized_image_never_reaches_network() {
    let dir = tempfile::tempdir().unwrap();
    let uri = write_file(dir.path(), "selfie.png", 11 * 1024 * 1024);

    let storage = Arc::new(CountingStorage::new(MemoryStorage::with_buckets(["profile_picture"])));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(LocalFileSource::new()));

    let destination = FileKind::Avatar.destination_path(USER, "selfie.png", Utc::now());
    let err = engine.upload(&uri, &destination, FileKind::Avatar).await.unwrap_err();

    assert_eq!(
        err,
        UploadError::FileTooLarge {
            size: 11 * 1024 * 1024,
            limit: MAX_UPLOAD_SIZE
        }
    );
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn test_empty_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let uri = write_file(dir.path(), "blank.pdf", 0);

    let storage = Arc::new(CountingStorage::new(MemoryStorage::with_buckets(["resumes"])));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(LocalFileSource::new()));

    let err = engine
        .upload(&uri, &format!("{}/resume/1_blank.pdf", USER), FileKind::Resume)
        .await
        .unwrap_err();
    assert_eq!(err, UploadError::EmptyFile);
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_session_fails_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let uri = write_file(dir.path(), "front.jpg", 2048);

    let storage = Arc::new(CountingStorage::new(MemoryStorage::with_buckets(["front_valid_id"])));
    let engine = UploadEngine::new(storage.clone(), Arc::new(SessionStore::new()), Arc::new(LocalFileSource::new()));

    let err = engine
        .upload(&uri, &format!("{}/front_id/1_front.jpg", USER), FileKind::FrontId)
        .await
        .unwrap_err();
    assert_eq!(err, UploadError::NoSession);
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn test_repeated_upload_overwrites_single_object() {
    let dir = tempfile::tempdir().unwrap();
    let uri = write_file(dir.path(), "badge.png", 4096);

    let memory = MemoryStorage::with_buckets(["employer_id"]);
    let engine = UploadEngine::new(Arc::new(memory.clone()), signed_in(), Arc::new(LocalFileSource::new()));
    let destination = FileKind::EmployerId.destination_path(USER, "badge.png", Utc::now());

    engine.upload(&uri, &destination, FileKind::EmployerId).await.unwrap();
    std::fs::write(uri.trim_start_matches("file://"), vec![1u8; 100]).unwrap();
    engine.upload(&uri, &destination, FileKind::EmployerId).await.unwrap();

    assert_eq!(memory.object_count("employer_id"), 1);
    assert_eq!(memory.object("employer_id", &destination).unwrap().data.len(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_uses_exactly_five_attempts() {
    let storage = Arc::new(CountingStorage::offline(MemoryStorage::with_buckets(["resumes"])));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(FixedSource(Bytes::from_static(b"%PDF"))));

    let started = tokio::time::Instant::now();
    let err = engine
        .upload("file:///cache/cv.pdf", &format!("{}/resume/1_cv.pdf", USER), FileKind::Resume)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Connectivity(_)));
    assert_eq!(storage.calls(), 5);
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);

    // Four waits of 2s, 4s, 8s, 16s plus under 1s jitter each
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30));
    assert!(elapsed < Duration::from_secs(34));
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_retried_in_compat_mode() {
    let memory = MemoryStorage::with_buckets(["back_valid_Id"]);
    memory.restrict("back_valid_Id");
    let storage = Arc::new(CountingStorage::new(memory));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(FixedSource(Bytes::from_static(b"jpeg"))))
        .with_policy(UploadPolicy::default().retry_permission_denied());

    let started = tokio::time::Instant::now();
    let err = engine
        .upload("file:///cache/back.jpg", &format!("{}/back_id/1_back.jpg", USER), FileKind::BackId)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::PermissionDenied(_)));
    assert!(err.to_string().starts_with("Permission denied"));
    // probe + bucket check per attempt
    assert_eq!(storage.calls(), 10);
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_fails_fast_by_default() {
    let memory = MemoryStorage::with_buckets(["back_valid_Id"]);
    memory.restrict("back_valid_Id");
    let storage = Arc::new(CountingStorage::new(memory));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(FixedSource(Bytes::from_static(b"jpeg"))));

    let started = tokio::time::Instant::now();
    let err = engine
        .upload("file:///cache/back.jpg", &format!("{}/back_id/1_back.jpg", USER), FileKind::BackId)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::PermissionDenied(_)));
    assert_eq!(storage.calls(), 2);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_id_pair_uploads_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let front = PickedFile::from_path(dir.path().join("front.jpg")).await;
    assert!(front.is_err());

    write_file(dir.path(), "front.jpg", 1500);
    write_file(dir.path(), "back.jpg", 2500);
    let front = PickedFile::from_path(dir.path().join("front.jpg")).await.unwrap();
    let back = PickedFile::from_path(dir.path().join("back.jpg")).await.unwrap();
    front.check_selection(FileKind::FrontId).unwrap();
    back.check_selection(FileKind::BackId).unwrap();

    let memory = MemoryStorage::with_buckets(["front_valid_id", "back_valid_Id"]);
    let engine = UploadEngine::new(Arc::new(memory.clone()), signed_in(), Arc::new(LocalFileSource::new()));
    let now = Utc::now();
    let requests = vec![
        UploadRequest::new(front.uri.clone(), FileKind::FrontId.destination_path(USER, &front.name, now), FileKind::FrontId),
        UploadRequest::new(back.uri.clone(), FileKind::BackId.destination_path(USER, &back.name, now), FileKind::BackId),
    ];

    let outcomes = engine.upload_all(&requests, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].bucket, "front_valid_id");
    assert_eq!(outcomes[1].bucket, "back_valid_Id");
    assert_eq!(memory.object("front_valid_id", &outcomes[0].final_path).unwrap().data.len(), 1500);
    assert_eq!(memory.object("back_valid_Id", &outcomes[1].final_path).unwrap().data.len(), 2500);
    assert_eq!(memory.object("back_valid_Id", &outcomes[1].final_path).unwrap().content_type, "image/jpeg");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let uri = write_file(dir.path(), "me.png", 512);

    let storage = Arc::new(CountingStorage::new(MemoryStorage::with_buckets(["profile_picture"])));
    let engine = UploadEngine::new(storage.clone(), signed_in(), Arc::new(LocalFileSource::new()));
    let request = UploadRequest::new(uri, format!("{}/avatar/1_me.png", USER), FileKind::Avatar);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine.upload_request(&request, &cancel).await.unwrap_err();
    assert_eq!(err, UploadError::Cancelled);
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
}

//! Upload engine: bounded retries around probe, bucket check, fetch, validate, write

use crate::{FileKind, FileSource, Result, UploadError, UploadPolicy, MAX_UPLOAD_SIZE};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use jobswipe_storage::{ListOptions, ObjectStorage, Session, SessionProvider, UploadOptions};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Callback invoked on every state transition with the current attempt number
pub type StateObserver = Arc<dyn Fn(UploadState, u32) + Send + Sync>;

/// States of a single upload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    ProbingConnectivity,
    VerifyingBucket,
    FetchingPayload,
    Validating,
    Writing,
    Succeeded,
    FailedTransient,
    FailedFatal,
}

impl UploadState {
    /// Whether the upload has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedFatal)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ProbingConnectivity => "probing_connectivity",
            Self::VerifyingBucket => "verifying_bucket",
            Self::FetchingPayload => "fetching_payload",
            Self::Validating => "validating",
            Self::Writing => "writing",
            Self::Succeeded => "succeeded",
            Self::FailedTransient => "failed_transient",
            Self::FailedFatal => "failed_fatal",
        };
        f.write_str(name)
    }
}

/// One file to transfer. Immutable once handed to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local resource to read
    pub local_uri: String,
    /// Object path inside the bucket, under the user's id
    pub destination_path: String,
    /// Content type sent with the write
    pub declared_mime_type: String,
    /// Largest payload accepted for this request
    pub size_limit_bytes: u64,
    /// Target bucket
    pub bucket_name: String,
    /// Size reported by the picker, if any
    pub size_hint: Option<u64>,
}

impl UploadRequest {
    /// Build a request whose bucket and content type follow `kind`
    pub fn new(local_uri: impl Into<String>, destination_path: impl Into<String>, kind: FileKind) -> Self {
        let local_uri = local_uri.into();
        let destination_path = destination_path.into();
        Self {
            declared_mime_type: kind.content_type(&destination_path),
            bucket_name: kind.bucket().to_string(),
            size_limit_bytes: MAX_UPLOAD_SIZE,
            size_hint: None,
            local_uri,
            destination_path,
        }
    }

    /// Tighten the size ceiling
    pub fn with_size_limit(mut self, bytes: u64) -> Self {
        self.size_limit_bytes = bytes;
        self
    }

    /// Record the size reported by the picker
    pub fn with_size_hint(mut self, bytes: u64) -> Self {
        self.size_hint = Some(bytes);
        self
    }
}

/// How a single attempt ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientFailure(String),
    FatalFailure(String),
}

/// Record of one attempt, kept only for the duration of the call
#[derive(Clone, Debug)]
pub struct UploadAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,
    /// When the attempt started
    pub started_at: DateTime<Utc>,
    /// How long it ran
    pub elapsed: Duration,
    /// How it ended
    pub outcome: AttemptOutcome,
}

/// Successful upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Bucket written to
    pub bucket: String,
    /// Path of the written object
    pub final_path: String,
    /// Public URL of the written object
    pub public_url: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Upload engine
pub struct UploadEngine {
    storage: Arc<dyn ObjectStorage>,
    sessions: Arc<dyn SessionProvider>,
    source: Arc<dyn FileSource>,
    policy: UploadPolicy,
    observer: Option<StateObserver>,
}

impl UploadEngine {
    /// Create an engine with the default policy
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        sessions: Arc<dyn SessionProvider>,
        source: Arc<dyn FileSource>,
    ) -> Self {
        Self {
            storage,
            sessions,
            source,
            policy: UploadPolicy::default(),
            observer: None,
        }
    }

    /// Replace the policy
    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Observe state transitions
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the policy
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Upload `local_uri` to `destination_path` in the bucket for `kind`
    pub async fn upload(&self, local_uri: &str, destination_path: &str, kind: FileKind) -> Result<UploadOutcome> {
        let request = UploadRequest::new(local_uri, destination_path, kind);
        self.upload_request(&request, &CancellationToken::new()).await
    }

    /// Upload with a caller-held cancellation token covering every attempt
    /// and every backoff wait
    #[instrument(skip(self, request, cancel), fields(bucket = %request.bucket_name, path = %request.destination_path))]
    pub async fn upload_request(&self, request: &UploadRequest, cancel: &CancellationToken) -> Result<UploadOutcome> {
        self.transition(UploadState::Idle, 0);

        if request.local_uri.trim().is_empty() {
            return Err(self.fatal(UploadError::InvalidRequest("local URI is empty".to_string()), 0));
        }
        if request.destination_path.trim().is_empty() {
            return Err(self.fatal(UploadError::InvalidRequest("destination path is empty".to_string()), 0));
        }

        let session = match self.sessions.current_session().await {
            Some(session) => session,
            None => return Err(self.fatal(UploadError::NoSession, 0)),
        };
        if !request.destination_path.starts_with(&format!("{}/", session.user_id)) {
            return Err(self.fatal(
                UploadError::InvalidRequest(format!(
                    "destination {} is outside the user's folder",
                    request.destination_path
                )),
                0,
            ));
        }

        let limit = self.effective_limit(request);
        let declared = match request.size_hint {
            Some(size) => Some(size),
            None => self.source.size_hint(&request.local_uri).await,
        };
        if let Some(size) = declared {
            if let Err(e) = check_size(size, limit) {
                return Err(self.fatal(e, 0));
            }
        }

        let mut attempts: Vec<UploadAttempt> = Vec::new();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started_at = Utc::now();
            let clock = Instant::now();

            let result = self.attempt(request, attempt, limit, cancel).await;

            match result {
                Ok(path) => {
                    attempts.push(UploadAttempt {
                        attempt_number: attempt,
                        started_at,
                        elapsed: clock.elapsed(),
                        outcome: AttemptOutcome::Success,
                    });
                    self.transition(UploadState::Succeeded, attempt);
                    info!(attempt, path = %path, "Upload succeeded");
                    return Ok(UploadOutcome {
                        public_url: self.storage.public_url(&request.bucket_name, &path),
                        bucket: request.bucket_name.clone(),
                        final_path: path,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    let fatal = e.is_fatal(self.policy.fail_fast_on_permission_denied);
                    attempts.push(UploadAttempt {
                        attempt_number: attempt,
                        started_at,
                        elapsed: clock.elapsed(),
                        outcome: if fatal {
                            AttemptOutcome::FatalFailure(e.to_string())
                        } else {
                            AttemptOutcome::TransientFailure(e.to_string())
                        },
                    });

                    if fatal || attempt >= self.policy.max_attempts {
                        warn!(
                            attempts = attempts.len(),
                            total_ms = attempts.iter().map(|a| a.elapsed.as_millis()).sum::<u128>(),
                            error = %e,
                            "Upload failed"
                        );
                        return Err(self.fatal(e, attempt));
                    }

                    self.transition(UploadState::FailedTransient, attempt);
                    let delay = self.policy.next_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Upload attempt failed, retrying");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(self.fatal(UploadError::Cancelled, attempt)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Upload several files concurrently; all outcomes, or the first failure
    /// in request order
    pub async fn upload_all(&self, requests: &[UploadRequest], cancel: &CancellationToken) -> Result<Vec<UploadOutcome>> {
        join_all(requests.iter().map(|request| self.upload_request(request, cancel)))
            .await
            .into_iter()
            .collect()
    }

    async fn attempt(
        &self,
        request: &UploadRequest,
        attempt: u32,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<String> {
        // Released on every exit path of this attempt
        let attempt_token = cancel.child_token();
        let _guard = attempt_token.clone().drop_guard();

        let bucket = request.bucket_name.as_str();
        let path = request.destination_path.as_str();

        self.transition(UploadState::ProbingConnectivity, attempt);
        let session = self.attempt_session().await?;
        cancellable(cancel, async {
            self.storage
                .probe(&session, bucket, path)
                .await
                .map_err(UploadError::from_probe)
        })
        .await?;

        self.transition(UploadState::VerifyingBucket, attempt);
        cancellable(cancel, async {
            self.storage
                .list_objects(&session, bucket, "", ListOptions::limit(1))
                .await
                .map(|_| ())
                .map_err(UploadError::from_storage)
        })
        .await?;

        self.transition(UploadState::FetchingPayload, attempt);
        let payload = self.fetch_payload(&request.local_uri, &attempt_token).await?;

        self.transition(UploadState::Validating, attempt);
        check_size(payload.len() as u64, limit)?;

        self.transition(UploadState::Writing, attempt);
        let options = UploadOptions::new(request.declared_mime_type.clone())
            .with_cache_control(self.policy.cache_control.clone())
            .with_upsert(true);
        cancellable(cancel, async {
            self.storage
                .upload(&session, bucket, path, payload, options)
                .await
                .map_err(UploadError::from_storage)
        })
        .await
    }

    async fn fetch_payload(
        &self,
        uri: &str,
        attempt_token: &CancellationToken,
    ) -> Result<Bytes> {
        let timeout = self.policy.attempt_timeout;
        match tokio::time::timeout(timeout, self.source.fetch(uri, attempt_token)).await {
            Ok(result) => result,
            Err(_) => {
                attempt_token.cancel();
                Err(UploadError::Timeout {
                    seconds: timeout_seconds(timeout),
                })
            }
        }
    }

    async fn attempt_session(&self) -> Result<Session> {
        self.sessions
            .current_session()
            .await
            .ok_or_else(|| UploadError::Connectivity("session is no longer active".to_string()))
    }

    fn effective_limit(&self, request: &UploadRequest) -> u64 {
        request.size_limit_bytes.min(self.policy.max_file_size)
    }

    fn fatal(&self, err: UploadError, attempt: u32) -> UploadError {
        self.transition(UploadState::FailedFatal, attempt);
        err
    }

    fn transition(&self, state: UploadState, attempt: u32) {
        debug!(%state, attempt, "Upload state");
        if let Some(observer) = &self.observer {
            observer(state, attempt);
        }
    }
}

/// Whole seconds, rounded up so a sub-second budget never reads as zero
fn timeout_seconds(timeout: Duration) -> u64 {
    timeout.as_millis().div_ceil(1000) as u64
}

fn check_size(size: u64, limit: u64) -> Result<()> {
    if size == 0 {
        return Err(UploadError::EmptyFile);
    }
    if size > limit {
        return Err(UploadError::FileTooLarge { size, limit });
    }
    Ok(())
}

async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        result = fut => result,
    }
}

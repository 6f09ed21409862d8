//! Resume upload walkthrough against in-memory storage
//!
//! This demo shows:
//! - Building a destination path for a picked file
//! - Watching the engine move through its states
//! - The size guard and the permission-denied fast failure
//!
//! Run with: cargo run --example upload_resume

use chrono::Utc;
use jobswipe_storage::{MemoryStorage, ObjectStorage, Session, SessionStore};
use jobswipe_upload::{
    FileKind, LocalFileSource, PickedFile, UploadEngine, UploadError, UploadRequest, UploadState,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("JobSwipe - resume upload demo\n");

    let storage = MemoryStorage::with_buckets(["resumes", "profile_picture"]);
    let session = Session::new("demo-user", "demo-token");
    let sessions = Arc::new(SessionStore::with_session(session.clone()));

    let engine = UploadEngine::new(Arc::new(storage.clone()), sessions, Arc::new(LocalFileSource::new()))
        .with_observer(Arc::new(|state: UploadState, attempt: u32| {
            println!("   [attempt {}] {}", attempt, state);
        }));

    // ==================== Resume ====================

    let dir = std::env::temp_dir().join("jobswipe-demo");
    tokio::fs::create_dir_all(&dir).await?;
    let resume_path = dir.join("resume.pdf");
    tokio::fs::write(&resume_path, vec![0x25u8; 1024 * 1024]).await?;

    let picked = PickedFile::from_path(&resume_path).await?;
    picked.check_selection(FileKind::Resume)?;

    let destination = FileKind::Resume.destination_path(&session.user_id, &picked.name, Utc::now());
    println!("Uploading {} ({} bytes) to {}", picked.name, picked.size_bytes, destination);

    let outcome = engine.upload(&picked.uri, &destination, FileKind::Resume).await?;
    println!("   stored at {} after {} attempt(s)", outcome.final_path, outcome.attempts);
    println!("   public URL {}\n", outcome.public_url);

    // ==================== Oversized ====================

    let big_path = dir.join("poster.png");
    tokio::fs::write(&big_path, vec![0u8; 11 * 1024 * 1024]).await?;
    let big = PickedFile::from_path(&big_path).await?;
    let request = UploadRequest::new(
        big.uri.clone(),
        FileKind::Avatar.destination_path(&session.user_id, &big.name, Utc::now()),
        FileKind::Avatar,
    );
    println!("Uploading {} ({} bytes)", big.name, big.size_bytes);
    match engine.upload_request(&request, &Default::default()).await {
        Err(e @ UploadError::FileTooLarge { .. }) => println!("   rejected: {}\n", e),
        other => println!("   unexpected: {:?}\n", other),
    }

    // ==================== Permission denied ====================

    storage.restrict("profile_picture");
    let avatar_path = dir.join("me.png");
    tokio::fs::write(&avatar_path, vec![1u8; 2048]).await?;
    let avatar = PickedFile::from_path(&avatar_path).await?;
    let destination = FileKind::Avatar.destination_path(&session.user_id, &avatar.name, Utc::now());
    println!("Uploading {} into a restricted bucket", avatar.name);
    if let Err(e) = engine.upload(&avatar.uri, &destination, FileKind::Avatar).await {
        println!("   failed: {}\n", e);
    }

    let buckets = storage.list_buckets(&session).await?;
    println!("Buckets: {}", buckets.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join(", "));
    println!("Objects in resumes: {}", storage.object_count("resumes"));

    tokio::fs::remove_dir_all(&dir).await?;
    Ok(())
}

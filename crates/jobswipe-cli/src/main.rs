//! JobSwipe uploader - push profile documents to storage from the command line

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use jobswipe_storage::{AuthClient, ObjectStorage, Session, SessionStore, StorageClient, StorageConfig};
use jobswipe_upload::{
    CancellationToken, FileKind, LocalFileSource, PickedFile, UploadEngine, UploadPolicy, UploadRequest,
    UploadState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "jobswipe-upload")]
#[command(about = "Upload JobSwipe profile documents to object storage")]
#[command(version)]
struct Args {
    /// Project URL
    #[arg(long, default_value = "http://localhost:54321", env = "JOBSWIPE_URL")]
    url: String,

    /// Anonymous API key
    #[arg(long, env = "JOBSWIPE_API_KEY")]
    api_key: Option<String>,

    /// Access token of an existing session
    #[arg(long, env = "JOBSWIPE_ACCESS_TOKEN", requires = "user_id")]
    access_token: Option<String>,

    /// User id the access token belongs to
    #[arg(long, env = "JOBSWIPE_USER_ID")]
    user_id: Option<String>,

    /// Email for password sign-in
    #[arg(long, env = "JOBSWIPE_EMAIL")]
    email: Option<String>,

    /// Password for password sign-in
    #[arg(long, env = "JOBSWIPE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "JOBSWIPE_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file into the signed-in user's folder
    Upload {
        /// resume, front_id, back_id, employer_id or avatar
        #[arg(long)]
        kind: FileKind,

        /// File to upload
        file: std::path::PathBuf,

        /// Attempt ceiling
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,

        /// Retry permission-denied failures instead of stopping
        #[arg(long)]
        compat_permission_retry: bool,
    },

    /// List buckets
    Buckets,

    /// Print the public URL of an object
    Url {
        #[arg(long)]
        kind: FileKind,
        path: String,
    },

    /// Remove objects
    Remove {
        #[arg(long)]
        kind: FileKind,
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("jobswipe_cli={0},jobswipe_upload={0},jobswipe_storage={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = StorageConfig::new(args.url.clone());
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key.clone());
    }
    let storage = Arc::new(StorageClient::new(config.clone()).context("invalid storage configuration")?);

    if let Command::Url { kind, path } = &args.command {
        println!("{}", storage.public_url(kind.bucket(), path));
        return Ok(());
    }

    let (session, signed_in) = resolve_session(&args, &config).await?;
    tracing::debug!(user_id = %session.user_id, "Using session");

    let result = run(&args.command, storage, session.clone()).await;

    if signed_in {
        if let Err(e) = AuthClient::new(config)?.sign_out(&session).await {
            tracing::warn!(error = %e, "Sign-out failed");
        }
    }
    result
}

async fn run(command: &Command, storage: Arc<StorageClient>, session: Session) -> anyhow::Result<()> {
    match command {
        Command::Upload {
            kind,
            file,
            max_attempts,
            compat_permission_retry,
        } => {
            let picked = PickedFile::from_path(file).await?;
            picked.check_selection(*kind)?;

            let mut policy = UploadPolicy::default().with_max_attempts(*max_attempts);
            if *compat_permission_retry {
                policy = policy.retry_permission_denied();
            }

            let destination = kind.destination_path(&session.user_id, &picked.name, Utc::now());
            let engine = UploadEngine::new(
                storage,
                Arc::new(SessionStore::with_session(session)),
                Arc::new(LocalFileSource::new()),
            )
            .with_policy(policy)
            .with_observer(Arc::new(|state: UploadState, attempt: u32| {
                tracing::info!(%state, attempt, "Upload progress");
            }));

            let request = UploadRequest::new(picked.uri.clone(), destination, *kind).with_size_hint(picked.size_bytes);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling upload");
                    on_interrupt.cancel();
                }
            });

            let outcome = engine.upload_request(&request, &cancel).await?;
            println!("bucket:   {}", outcome.bucket);
            println!("path:     {}", outcome.final_path);
            println!("url:      {}", outcome.public_url);
            println!("attempts: {}", outcome.attempts);
        }
        Command::Buckets => {
            for bucket in storage.list_buckets(&session).await? {
                let visibility = if bucket.public { "public" } else { "private" };
                println!("{}\t{}", bucket.name, visibility);
            }
        }
        Command::Remove { kind, paths } => {
            let removed = storage.remove(&session, kind.bucket(), paths).await?;
            for path in &removed {
                println!("removed {}", path);
            }
            if removed.len() < paths.len() {
                tracing::warn!(requested = paths.len(), removed = removed.len(), "Some objects were not found");
            }
        }
        Command::Url { .. } => {}
    }
    Ok(())
}

/// Session from a supplied token, or from password sign-in. The flag tells
/// whether the session was created here.
async fn resolve_session(args: &Args, config: &StorageConfig) -> anyhow::Result<(Session, bool)> {
    if let (Some(token), Some(user_id)) = (&args.access_token, &args.user_id) {
        return Ok((Session::new(user_id.clone(), token.clone()), false));
    }
    match (&args.email, &args.password) {
        (Some(email), Some(password)) => {
            let session = AuthClient::new(config.clone())?
                .sign_in_with_password(email, password)
                .await
                .context("sign-in failed")?;
            Ok((session, true))
        }
        _ => bail!("no session: pass --access-token with --user-id, or --email with --password"),
    }
}

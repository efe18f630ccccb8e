//! Depot server binary.

use clap::Parser;
use depot_config::Config;
use depot_server::{AppState, create_router};
use depot_storage::BackendHandle;
use depot_storage::backend::LocalBackend;
use depot_store::{Database, ProjectResolver};
use depot_upload::{AssetRecorder, Uploader};
use derive_more::{Display, Error};
use exn::{Exn, ResultExt};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Accepts multi-file uploads over HTTP and stores them per project.
#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (toml, yaml or json). Defaults to
    /// `depot/config.toml` in the platform's config directory, if present.
    #[arg(short, long, env = "DEPOT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "depot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Depot v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err:?}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    let db = match Database::connect(&config.database.path).await {
        Ok(db) => db,
        Err(err) => {
            error!(path = %config.database.path.display(), "failed to open database: {err:?}");
            return ExitCode::FAILURE;
        },
    };
    let code = match serve(&config, &db).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        },
    };
    db.close().await;
    info!("shut down");
    code
}

/// Why the server stopped before (or instead of) shutting down cleanly.
#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("invalid storage directory: {}", _0.display())]
    StorageDir(#[error(not(source))] PathBuf),
    #[display("failed to prepare the {_0} collection")]
    Collection(#[error(not(source))] &'static str),
    #[display("failed to bind {_0}")]
    Bind(#[error(not(source))] SocketAddr),
    #[display("server error")]
    Serve,
}

async fn serve(config: &Config, db: &Database) -> Result<(), Exn<ErrorKind>> {
    let storage_dir = || ErrorKind::StorageDir(config.storage.files_dir.clone());
    let files_dir = std::path::absolute(&config.storage.files_dir).or_raise(storage_dir)?;
    let backend: BackendHandle = Arc::new(LocalBackend::new("local", &files_dir).or_raise(storage_dir)?);
    let resolver = ProjectResolver::new(Arc::new(db.projects())).await.or_raise(|| ErrorKind::Collection("projects"))?;
    let recorder = AssetRecorder::new(Arc::new(db.assets())).await.or_raise(|| ErrorKind::Collection("assets"))?;
    let uploader = Uploader::new(backend, resolver, recorder, Arc::new(config.upload.clone()));
    let router = create_router(AppState::new(uploader, config.server.max_request_size));

    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .or_raise(|| ErrorKind::Bind(config.server.listen))?;
    info!(listen = %config.server.listen, files_dir = %files_dir.display(), "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .or_raise(|| ErrorKind::Serve)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received termination signal, shutting down");
}

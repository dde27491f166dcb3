use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use common::config::{StorageAppConfig, StorageBackendKind};
use common::storage::ObjectStore;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::s3::{S3ObjectStore, S3Settings};
use mq::{MqConfig, init_mq};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::consumers::consume_scan_reports;
use server::database::init_db;
use server::notify::{LogNotifier, Notifier, RelayNotifier};
use server::seed::{ensure_indexes, seed_admin};
use server::services::{JobQueue, MemoryJobQueue};
use server::state::AppState;
use server::store::{DocumentStore, MemoryStore, PgStore};
use server::tasks::BackgroundTasks;

async fn object_store(storage: &StorageAppConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let max_size = storage.max_file_size.max(storage.max_avatar_size);
    Ok(match storage.backend {
        StorageBackendKind::Filesystem => {
            let store = FilesystemObjectStore::new(PathBuf::from(&storage.path), max_size)
                .await
                .context("failed to prepare the object storage directory")?;
            info!(path = %storage.path, "Using filesystem object storage");
            Arc::new(store)
        }
        StorageBackendKind::S3 => {
            let s3 = &storage.s3;
            let store = S3ObjectStore::new(
                S3Settings {
                    endpoint: s3.endpoint.clone(),
                    region: s3.region.clone(),
                    access_key: s3.access_key.clone(),
                    secret_key: s3.secret_key.clone(),
                    bucket_prefix: s3.bucket_prefix.clone(),
                    path_style: s3.path_style,
                },
                max_size,
            )
            .context("failed to configure S3 object storage")?;
            info!(endpoint = %s3.endpoint, "Using S3 object storage");
            Arc::new(store)
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let docs: Arc<dyn DocumentStore> = match &config.database.url {
        Some(url) => {
            let db = init_db(url).await.context("failed to connect to database")?;
            ensure_indexes(&db).await?;
            info!("Using PostgreSQL document store");
            Arc::new(PgStore::new(db))
        }
        None => {
            warn!("No database URL configured, documents are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let blobs = object_store(&config.storage).await?;

    let mq = if config.mq.enabled {
        let mq = init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        .context("failed to connect to message broker")?;
        Some(Arc::new(mq))
    } else {
        warn!("Message queue disabled, scan jobs are only recorded in memory");
        None
    };
    let queue: Arc<dyn JobQueue> = match &mq {
        Some(mq) => mq.clone(),
        None => Arc::new(MemoryJobQueue::new()),
    };

    let notifier: Arc<dyn Notifier> = match &config.mail.relay_url {
        Some(url) => Arc::new(RelayNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let (tasks, _runner) = BackgroundTasks::start();
    let state = AppState::build(config, docs, blobs, queue, notifier, tasks);

    seed_admin(&state.accounts, &state.config.admin)
        .await
        .context("failed to seed the admin account")?;

    if let Some(mq) = mq {
        let content = state.content.clone();
        let queue_name = state.config.mq.result_queue_name.clone();
        tokio::spawn(consume_scan_reports(content, mq, queue_name));
    }

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .context("invalid server address")?;
    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Application state wiring all services together.
//!
//! The orchestrator is generic over the KV store and backend factory, but
//! AppState pins it to the concrete infra implementations: SQLite storage
//! and the OpenAI-compatible provider catalog.

use std::path::PathBuf;
use std::sync::Arc;

use inkwell_core::admission::AdmissionController;
use inkwell_core::chat::ChatOrchestrator;
use inkwell_core::history::HistoryStore;
use inkwell_core::quota::QuotaTracker;
use inkwell_infra::config::AppConfig;
use inkwell_infra::llm::CatalogBackendFactory;
use inkwell_infra::sqlite::pool::DatabasePool;
use inkwell_infra::sqlite::SqliteKvStore;

/// Concrete orchestrator type pinned to the infra implementations.
pub type ConcreteOrchestrator = ChatOrchestrator<SqliteKvStore, CatalogBackendFactory>;

/// Shared application state used by the REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub admission: Arc<AdmissionController>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, wire the
    /// orchestrator, and start the stale-slot sweeper.
    pub async fn init(data_dir: PathBuf, config: AppConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = config.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                data_dir.join("inkwell.db").display()
            )
        });
        let db_pool = DatabasePool::new(&db_url).await?;

        let kv = Arc::new(SqliteKvStore::new(db_pool.clone()));
        let history = Arc::new(HistoryStore::new(
            Arc::clone(&kv),
            config.chat.history.clone(),
        ));
        let quota = Arc::new(QuotaTracker::new(Arc::clone(&kv), config.chat.quota.clone()));

        let admission = AdmissionController::new(config.chat.concurrency.clone());
        admission.spawn_sweeper();

        let factory = Arc::new(CatalogBackendFactory::new(config.providers));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            history,
            quota,
            Arc::clone(&admission),
            factory,
            config.chat,
            config.system_prompt,
        ));

        Ok(Self {
            orchestrator,
            admission,
            data_dir,
            db_pool,
        })
    }
}

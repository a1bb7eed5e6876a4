/// Application context and dependency injection
use crate::{
    actor_store::ActorStore,
    config::ServerConfig,
    db,
    directory::{ActorDirectory, TvMazeClient},
    error::{CastError, CastResult},
    reconciler::Reconciler,
    statistics::{ChartRenderer, PieChartRenderer},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub store: ActorStore,
    pub reconciler: Arc<Reconciler>,
    pub chart_renderer: Arc<dyn ChartRenderer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CastResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize actor database
        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.actor_db, options).await?;

        // Run migrations
        db::run_migrations(&pool).await?;

        // Test connection
        db::test_connection(&pool).await?;

        // Directory client
        let directory = Arc::new(TvMazeClient::new(&config.directory)?);

        tracing::info!("Actor database ready at {:?}", config.storage.actor_db);
        tracing::info!("Actor directory: {}", config.directory.base_url);

        Ok(Self::with_parts(config, pool, directory))
    }

    /// Assemble a context from an already prepared pool and directory
    pub fn with_parts(
        config: ServerConfig,
        db: SqlitePool,
        directory: Arc<dyn ActorDirectory>,
    ) -> Self {
        let store = ActorStore::new(db.clone());
        let reconciler = Arc::new(Reconciler::new(store.clone(), directory));
        let chart_renderer: Arc<dyn ChartRenderer> = Arc::new(PieChartRenderer::new(&config.chart));

        Self {
            config: Arc::new(config),
            db,
            store,
            reconciler,
            chart_renderer,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CastResult<()> {
        let mut dirs = vec![config.storage.data_directory.as_path()];
        if let Some(parent) = config.storage.actor_db.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.push(parent);
            }
        }

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    CastError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

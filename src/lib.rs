//! User directory: persistence, search and cache-coherent profile listings
//! for the users of a multi-tenant team collaboration system.

#![forbid(unsafe_code)]
pub mod cache;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod id;
pub mod model;
pub mod stores;
pub mod telemetry;
pub mod user;

use std::sync::Arc;

use cache::ProfileCache;
use metrics_exporter_prometheus::PrometheusHandle;
use stores::{
    BotStore, ChannelStore, GroupStore, SqlBotStore, SqlChannelStore, SqlGroupStore,
    SqlStatusStore, SqlTeamStore, StatusStore, TeamStore,
};
use user::UserStore;

/// Stores sharing one pool and one profile cache.
#[derive(Clone)]
pub struct Directory {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub cache: Arc<ProfileCache>,
    pub users: UserStore,
    pub teams: Arc<dyn TeamStore>,
    pub channels: Arc<dyn ChannelStore>,
    pub bots: Arc<dyn BotStore>,
    pub groups: Arc<dyn GroupStore>,
    pub statuses: Arc<dyn StatusStore>,
    /// Prometheus render handle, when this directory installed the recorder.
    pub metrics: Option<PrometheusHandle>,
}

impl Directory {
    /// Wire every store over an already migrated database.
    pub fn new(config: Arc<config::Configuration>, db: database::Database) -> Self {
        let cache = Arc::new(ProfileCache::from_config(&config.cache));
        let pool = db.sqlite.clone();

        let bots: Arc<dyn BotStore> =
            Arc::new(SqlBotStore::new(pool.clone(), Arc::clone(&cache)));
        let users = UserStore::new(pool.clone(), Arc::clone(&cache), Arc::clone(&bots))
            .search_limit(config.search.default_limit);

        Self {
            teams: Arc::new(SqlTeamStore::new(pool.clone())),
            channels: Arc::new(SqlChannelStore::new(pool.clone(), Arc::clone(&cache))),
            groups: Arc::new(SqlGroupStore::new(pool.clone())),
            statuses: Arc::new(SqlStatusStore::new(pool)),
            bots,
            users,
            cache,
            db,
            config,
            metrics: None,
        }
    }

    /// Connect, migrate and wire.
    pub async fn open(config: Arc<config::Configuration>) -> error::Result<Self> {
        let db = database::Database::new(
            &config.database.url,
            config
                .database
                .pool_size
                .unwrap_or(database::DEFAULT_POOL_SIZE),
        )
        .await?;
        db.migrate().await?;

        Ok(Self::new(config, db))
    }

    /// Private in-memory directory with default configuration.
    pub async fn in_memory() -> error::Result<Self> {
        let db = database::Database::in_memory().await?;
        db.migrate().await?;

        Ok(Self::new(Arc::new(config::Configuration::default()), db))
    }
}

/// Initialize the directory from `config.yaml`.
pub async fn initialize_directory() -> Result<Directory, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read();

    if let Err(err) = telemetry::setup_logging(config.log_level.as_deref()) {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "prometheus recorder not installed");
            None
        },
    };

    let mut directory = Directory::open(config).await?;
    directory.metrics = metrics;

    Ok(directory)
}

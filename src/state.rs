use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    error::StartupError,
    infra::{
        broadcast::{RedisBroadcaster, UpdateSource},
        cache::{connect_redis, RedisCache},
        store::{connect_postgres, PgStore},
        vision::VisionClient,
        AlertPublisher, CocktailStore, MenuOcr, SearchCache,
    },
    util::version::user_agent,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CocktailStore>,
    pub cache: Arc<dyn SearchCache>,
    pub publisher: Arc<dyn AlertPublisher>,
    /// Absent when no Google API key is configured.
    pub ocr: Option<Arc<dyn MenuOcr>>,
    /// Absent when the gateway runs without a Redis broker.
    pub updates: Option<UpdateSource>,
}

impl AppState {
    /// Connects every production collaborator described by `config`.
    pub async fn connect(config: Config) -> Result<Arc<Self>, StartupError> {
        info!("Connecting to Postgres...");
        let pool = connect_postgres(&config.database_url, config.collaborator_timeout).await?;

        info!("Connecting to Redis...");
        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis_connection = connect_redis(&redis_client, config.collaborator_timeout).await?;

        let ocr: Option<Arc<dyn MenuOcr>> = match &config.google_api_key {
            Some(key) => Some(Arc::new(VisionClient::new(
                &config.vision_base_url,
                key.clone(),
                &user_agent(),
                config.collaborator_timeout,
            )?)),
            None => {
                warn!("GOOGLE_API_KEY not set, menu OCR disabled");
                None
            }
        };

        let updates = UpdateSource::new(redis_client, &config.redis_namespace);
        let publisher = RedisBroadcaster::new(redis_connection.clone(), &config.redis_namespace);

        Ok(Arc::new(Self {
            store: Arc::new(PgStore::new(pool)),
            cache: Arc::new(RedisCache::new(redis_connection)),
            publisher: Arc::new(publisher),
            ocr,
            updates: Some(updates),
            config,
        }))
    }

    /// Assembles a state from already-built collaborators.
    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn CocktailStore>,
        cache: Arc<dyn SearchCache>,
        publisher: Arc<dyn AlertPublisher>,
        ocr: Option<Arc<dyn MenuOcr>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            cache,
            publisher,
            ocr,
            updates: None,
        })
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::repo::UserRepo;
use crate::bookings::repo::BookingRepo;
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::events::repo::EventRepo;
use crate::memory::MemoryStore;
use crate::rate_limit::RateLimits;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub events: Arc<dyn EventRepo>,
    pub bookings: Arc<dyn BookingRepo>,
    pub limits: RateLimits,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.database_url.as_deref() {
            Some(url) => {
                let store = PgStore::connect(url, config.max_connections).await?;
                store.migrate().await?;
                info!(max_connections = config.max_connections, "using postgres store");
                Ok(Self::with_store(config, store))
            }
            None => {
                warn!("DATABASE_URL not set; data lives in memory and is lost on restart");
                Ok(Self::with_store(config, MemoryStore::new()))
            }
        }
    }

    /// Wires one store into every repo slot.
    pub fn with_store<S>(config: Arc<AppConfig>, store: S) -> Self
    where
        S: UserRepo + EventRepo + BookingRepo + Clone + 'static,
    {
        let limits = RateLimits::from_config(&config.rate_limit);
        Self {
            config,
            users: Arc::new(store.clone()),
            events: Arc::new(store.clone()),
            bookings: Arc::new(store),
            limits,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(false)
    }

    /// Memory-backed state with a fixed JWT secret.
    #[cfg(test)]
    pub fn fake_with(rate_limited: bool) -> Self {
        use crate::config::{JwtConfig, RateLimitConfig};

        let config = Arc::new(AppConfig {
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "eventbook".into(),
                audience: "eventbook-users".into(),
                ttl_minutes: 60 * 24 * 7,
            },
            host: "127.0.0.1".into(),
            port: 0,
            rate_limit: RateLimitConfig {
                enabled: rate_limited,
            },
        });
        Self::with_store(config, MemoryStore::new())
    }
}

//! Connection pool for the database being migrated.
//!
//! A migration owns exactly one connection for its whole transaction, so the
//! pool is sized to one and never shared between migrations.

use std::time::{Duration, Instant};

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::drivers::common::TlsBuilder;
use crate::error::{MigrateError, Result};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-connection PostgreSQL pool.
pub struct PgPool {
    pool: Pool,
    target: String,
}

impl PgPool {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = config.pg_config();
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::for_database(config)?.build()? {
            None => {
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let pg_pool = Self {
            pool,
            target: config.display_target(),
        };
        pg_pool.ping().await?;

        info!("Connected to PostgreSQL: {}", pg_pool.target);
        Ok(pg_pool)
    }

    /// Check out the connection.
    pub async fn get(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("getting connection to {}", self.target)))
    }

    /// Round-trip `SELECT 1` and report the latency.
    pub async fn ping(&self) -> Result<Duration> {
        let client = self.get().await?;
        let start = Instant::now();
        client.simple_query("SELECT 1").await?;
        Ok(start.elapsed())
    }

    /// `user@host:port/database` of this pool.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Close the pool; the connection is dropped once returned.
    pub fn close(&self) {
        self.pool.close();
    }
}

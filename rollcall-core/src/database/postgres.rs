use std::fmt;

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tracing::info;

use crate::database::repositories::memberships::PostgresMembershipsRepository;
use crate::error::{RenewalError, Result};

/// Statistics about the connection pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
    pub min_idle: u32,
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    max_connections: u32,
    min_connections: u32,
    memberships: PostgresMembershipsRepository,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .finish()
    }
}

impl PostgresDatabase {
    pub async fn new(connection_string: &str) -> Result<Self> {
        // Pool sizing from environment or sensible defaults
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(num_cpus::get() as u32);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let connect_options =
            connection_string
                .trim()
                .parse::<PgConnectOptions>()
                .map_err(|e| {
                    RenewalError::Database(format!(
                        "Invalid PostgreSQL connection string: {}",
                        e
                    ))
                })?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .idle_timeout(std::time::Duration::from_secs(600))
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                RenewalError::Database(format!(
                    "Database connection failed: {}",
                    e
                ))
            })?;

        info!(
            "Database pool initialized with max_connections={}, min_connections={}",
            max_connections, min_connections
        );

        let memberships = PostgresMembershipsRepository::new(pool.clone());

        Ok(PostgresDatabase {
            pool,
            max_connections,
            min_connections,
            memberships,
        })
    }

    /// Create a PostgresDatabase from an existing pool (mainly for testing)
    pub fn from_pool(pool: PgPool) -> Self {
        let max_connections = 20;
        let min_connections = 2;

        let memberships = PostgresMembershipsRepository::new(pool.clone());

        PostgresDatabase {
            pool,
            max_connections,
            min_connections,
            memberships,
        }
    }

    /// Apply embedded migrations.
    pub async fn initialize_schema(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                RenewalError::Database(format!("Migration failed: {}", e))
            })?;

        Ok(())
    }

    /// Get a reference to the connection pool for use in extension modules
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn memberships_repository(&self) -> &PostgresMembershipsRepository {
        &self.memberships
    }

    /// Get connection pool statistics for monitoring
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_size: self.max_connections,
            min_idle: self.min_connections,
        }
    }
}

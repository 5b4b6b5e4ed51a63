pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{InternalProfileRepository, ProviderConfigRepository, UserProfileRepository};

use anyhow::{Context, Result};
use refinery::load_sql_migrations;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Database service combining all repositories. Repositories are shared
/// handles so they can be handed to the service layer as trait objects.
pub struct Database {
    pub provider_configs: Arc<ProviderConfigRepository>,
    pub user_profiles: Arc<UserProfileRepository>,
    pub internal_profiles: Arc<InternalProfileRepository>,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            provider_configs: Arc::new(ProviderConfigRepository::new(pool.clone())),
            user_profiles: Arc::new(UserProfileRepository::new(pool.clone())),
            internal_profiles: Arc::new(InternalProfileRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Apply the schema migrations shipped in this crate's `migrations/`
    /// directory
    pub async fn run_migrations(&self) -> Result<()> {
        self.run_migrations_from(Self::bundled_migrations_dir())
            .await
    }

    /// Apply migrations from an explicit directory
    pub async fn run_migrations_from<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let migrations = load_sql_migrations(dir)
            .with_context(|| format!("Failed to load migrations from {dir:?}"))?;

        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection for migrations")?;

        let report = refinery::Runner::new(&migrations)
            .run_async(&mut **client)
            .await
            .context("Failed to apply migrations")?;

        let applied = report.applied_migrations();
        if applied.is_empty() {
            debug!("Schema already up to date");
        } else {
            for migration in applied {
                info!(name = migration.name(), "Applied migration");
            }
        }

        Ok(())
    }

    /// The migration SQL lives next to this crate's sources, so the path is
    /// derived from the crate location rather than the process working
    /// directory.
    fn bundled_migrations_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

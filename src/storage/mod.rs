//! Persistent storage for scenarios and their embeddings.
//!
//! The pipeline consumes the `ScenarioRepository` contract; the SQLite
//! implementation below stores the full scenario payload as JSON alongside
//! the indexed columns the pipeline queries (title, category, bundle).

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::RepositoryError;
use crate::scenario::ScenarioData;

/// Repository contract consumed by the pipeline.
#[async_trait]
pub trait ScenarioRepository: Send + Sync {
    /// Insert an approved scenario tagged with its bundle. Fails with
    /// `RepositoryError::DuplicateTitle` when the title already exists.
    async fn insert_scenario(
        &self,
        scenario: &ScenarioData,
        bundle_id: &str,
    ) -> Result<i64, RepositoryError>;

    /// Persist the embedding vector for a scenario title.
    async fn save_embedding(&self, title: &str, vector: &[f32]) -> Result<(), RepositoryError>;

    /// Load every persisted embedding as (title, vector) pairs.
    async fn load_all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>, RepositoryError>;

    /// Load up to `limit` approved scenarios in a category, newest first.
    async fn load_approved_examples(
        &self,
        category: &str,
        limit: u32,
    ) -> Result<Vec<ScenarioData>, RepositoryError>;
}

/// SQLite-backed repository.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect to the database and create the schema if needed.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string
    ///   (e.g., "sqlite://swarmforge.db?mode=rwc")
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// Create a repository from an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes.
    async fn init_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scenarios (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bundle_id TEXT NOT NULL,
                title TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'approved',
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scenarios_category ON scenarios(category)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scenario_embeddings (
                title TEXT PRIMARY KEY,
                vector_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScenarioRepository for SqliteRepository {
    async fn insert_scenario(
        &self,
        scenario: &ScenarioData,
        bundle_id: &str,
    ) -> Result<i64, RepositoryError> {
        let title = scenario.title().trim();
        if title.is_empty() {
            return Err(RepositoryError::InvalidRecord(
                "scenario has no title".to_string(),
            ));
        }

        let data_json = serde_json::to_string(scenario)?;

        let result = sqlx::query(
            r#"
            INSERT INTO scenarios (bundle_id, title, category, status, data, created_at)
            VALUES (?1, ?2, ?3, 'approved', ?4, ?5)
            "#,
        )
        .bind(bundle_id)
        .bind(title)
        .bind(scenario.category())
        .bind(&data_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(RepositoryError::DuplicateTitle(title.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_embedding(&self, title: &str, vector: &[f32]) -> Result<(), RepositoryError> {
        let vector_json = serde_json::to_string(vector)?;
        sqlx::query(
            r#"
            INSERT INTO scenario_embeddings (title, vector_json)
            VALUES (?1, ?2)
            ON CONFLICT (title) DO UPDATE SET vector_json = excluded.vector_json
            "#,
        )
        .bind(title)
        .bind(&vector_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>, RepositoryError> {
        let rows = sqlx::query("SELECT title, vector_json FROM scenario_embeddings")
            .fetch_all(&self.pool)
            .await?;

        let mut embeddings = Vec::with_capacity(rows.len());
        for row in rows {
            let title: String = row.try_get("title")?;
            let vector_json: String = row.try_get("vector_json")?;
            match serde_json::from_str::<Vec<f32>>(&vector_json) {
                Ok(vector) if !vector.is_empty() => embeddings.push((title, vector)),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(title = title.as_str(), error = %e, "Skipping unparseable embedding");
                }
            }
        }
        Ok(embeddings)
    }

    async fn load_approved_examples(
        &self,
        category: &str,
        limit: u32,
    ) -> Result<Vec<ScenarioData>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM scenarios
            WHERE category = ?1 AND status = 'approved'
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(category)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut scenarios = Vec::with_capacity(rows.len());
        for row in rows {
            let data_json: String = row.try_get("data")?;
            match serde_json::from_str::<ScenarioData>(&data_json) {
                Ok(scenario) => scenarios.push(scenario),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable scenario row");
                }
            }
        }
        Ok(scenarios)
    }
}

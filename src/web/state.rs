use std::{path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::{
    classifier::{Classifier, OnnxClassifier},
    config::AppConfig,
    users,
    web::session::{MemorySessionStore, SessionStore},
};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    sessions: Arc<dyn SessionStore>,
    classifier: Arc<dyn Classifier>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Connects the credential store, runs migrations, loads the model and
    /// prepares the uploads directory. Any failure here is fatal.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("invalid DATABASE_URL: {}", config.database_url))?
            .create_if_missing(true);

        let db_file = config.database_file();
        if let Some(parent) = db_file
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .context("failed to open the credential store")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let user_count = users::count_users(&pool)
            .await
            .context("failed to query the credential store")?;
        info!(user_count, "credential store ready");

        let model_path = config.model_path.clone();
        let input_width = config.model_input_width;
        let classifier = tokio::task::spawn_blocking(move || {
            OnnxClassifier::load(&model_path, input_width)
        })
        .await
        .context("model loading task panicked")?
        .context("failed to load the watermark model")?;

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create upload directory {}",
                    config.upload_dir.display()
                )
            })?;

        Ok(Self::from_parts(
            pool,
            Arc::new(MemorySessionStore::new()),
            Arc::new(classifier),
            config,
        ))
    }

    pub fn from_parts(
        pool: SqlitePool,
        sessions: Arc<dyn SessionStore>,
        classifier: Arc<dyn Classifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            pool,
            sessions,
            classifier,
            config: Arc::new(config),
        }
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub fn classifier(&self) -> Arc<dyn Classifier> {
        Arc::clone(&self.classifier)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

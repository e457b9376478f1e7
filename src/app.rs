//! Application lifecycle: migrations, module start, HTTP serving, shutdown.

use anyhow::Context;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A configured application with its modules registered.
pub struct App {
    settings: Settings,
    db: Database,
    registry: ModuleRegistry,
}

impl App {
    /// Open the configured database and register every module.
    pub fn open(settings: Settings) -> anyhow::Result<Self> {
        let db = Database::open(&settings.database.path)?;
        Ok(Self::with_database(settings, db))
    }

    pub fn with_database(settings: Settings, db: Database) -> Self {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &db, &settings);

        tracing::info!(modules = registry.module_count(), "modules registered");
        Self {
            settings,
            db,
            registry,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Apply pending migrations; returns how many ran.
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        let applied = self.registry.apply_migrations(&self.db).await?;
        tracing::info!(applied, "migrations complete");
        Ok(applied)
    }

    /// Migrate, then init and start every module.
    pub async fn prepare(&self) -> anyhow::Result<()> {
        self.migrate().await?;

        let ctx = InitCtx {
            settings: &self.settings,
            db: &self.db,
        };
        self.registry.init_modules(&ctx).await?;
        self.registry.start_modules(&ctx).await?;
        Ok(())
    }

    /// Router with every module mounted and the middleware stack applied.
    pub fn router(&self) -> Router {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }

    /// Run until Ctrl-C, then stop modules in reverse order.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.prepare().await?;

        let served = bookshelf_http::start_server(&self.registry, &self.settings, shutdown_signal())
            .await;

        self.registry
            .stop_modules()
            .await
            .context("failed to stop modules")?;

        served
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}

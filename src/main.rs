use campus_library::{
    adapters::{
        memory::InMemoryLibraryStore,
        postgres::{PostgresLibraryStore, run_migrations},
    },
    api::{handlers::AppState, router::create_router},
    application::library::ServiceDependencies,
    config::{AppConfig, StoreBackend},
    ports::LibraryStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("campus_library={},tower_http=debug", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn LibraryStore> = match config.store.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database");

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.url)
                .await?;

            run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");

            Arc::new(PostgresLibraryStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data will not survive a restart");
            Arc::new(InMemoryLibraryStore::new())
        }
    };

    let app_state = Arc::new(AppState {
        service_deps: ServiceDependencies { store },
        default_due_days: config.loans.default_due_days,
    });

    let app = create_router(app_state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

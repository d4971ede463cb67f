use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use stratfeed_backend::app;
use stratfeed_backend::config::WorkerConfig;
use stratfeed_backend::jobs::BacktestWorker;
use stratfeed_backend::logging::{self, LoggingConfig};
use stratfeed_backend::services::JobService;
use stratfeed_backend::state::AppState;
use stratfeed_backend::store::{JobStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    logging::init_logging(LoggingConfig::from_env())?;

    let store_kind = std::env::var("JOB_STORE").unwrap_or_else(|_| "memory".to_string());
    let store: Arc<dyn JobStore> = match store_kind.to_lowercase().as_str() {
        "postgres" => {
            let database_url = std::env::var("DATABASE_URL")?;
            tracing::info!("Using Postgres job store");
            Arc::new(PostgresStore::connect(&database_url).await?)
        }
        "memory" => {
            tracing::info!("Using in-memory job store (records do not survive restart)");
            Arc::new(MemoryStore::new())
        }
        other => anyhow::bail!("Invalid JOB_STORE: {}. Must be 'memory' or 'postgres'", other),
    };

    let worker = BacktestWorker::new(store.clone(), WorkerConfig::from_env());
    let jobs = Arc::new(JobService::new(store.clone(), worker.active_jobs()));

    let runner = worker.clone();
    tokio::spawn(async move {
        runner.run().await;
    });

    let state = AppState { jobs, store };
    let app = app::create_app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Stratfeed backend running at http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(worker))
        .await?;

    Ok(())
}

async fn shutdown_signal(worker: BacktestWorker) {
    if tokio::signal::ctrl_c().await.is_ok() {
        worker.stop();
    }
}

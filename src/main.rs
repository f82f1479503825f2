use std::process::ExitCode;
use std::sync::Arc;

use paylanka_nano::{create_routes, AppState, Config, InMemoryStore, StartupError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let state = AppState {
        service_name: Arc::from(config.app_name.as_str()),
        store: Arc::new(InMemoryStore::new()),
    };
    let app = create_routes(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    tracing::info!(service = %config.app_name, %addr, "{} listening on {}", config.app_name, config.port);
    axum::serve(listener, app).await.map_err(StartupError::Serve)
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenv::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server stopped");
            ExitCode::FAILURE
        }
    }
}

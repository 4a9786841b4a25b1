//! Binary entrypoint for the graph rendering API server.
//!
//! Reads configuration from environment variables:
//! - `GRAPHAPI_DB_PATH`: SQLite database file path (default: "graphapi.db")
//! - `GRAPHAPI_PORT`: Server listen port (default: "8080")

use graphapi_server::router::build_router;
use graphapi_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path =
        std::env::var("GRAPHAPI_DB_PATH").unwrap_or_else(|_| "graphapi.db".to_string());
    let port = std::env::var("GRAPHAPI_PORT").unwrap_or_else(|_| "8080".to_string());

    let state = match AppState::new(&db_path) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(code = %err.code, "failed to initialize storage: {}", err.message);
            std::process::exit(1);
        }
    };

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("graphapi server starting on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", err);
        std::process::exit(1);
    }
}

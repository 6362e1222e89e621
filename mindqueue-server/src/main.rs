use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use mindqueue::Assistant;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod models;
mod state;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "mindqueue-server")]
#[command(about = "Serve mindqueue tools over HTTP")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "MINDQUEUE_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,

    /// Path to data directory
    #[arg(long, env = "MINDQUEUE_DATA_DIR", default_value = "./mindqueue_data")]
    data_dir: PathBuf,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/v1/tools", get(api::list_tools))
        .route("/v1/tools/call", post(api::call_tool))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,mindqueue=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Opening stores under {}", args.data_dir.display());
    let assistant = Assistant::with_data_dir(&args.data_dir)?;
    let state = Arc::new(AppState {
        assistant: Arc::new(assistant),
    });

    let app = router(state);

    tracing::info!("mindqueue server listening on {}", args.addr);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(AppState {
            assistant: Arc::new(Assistant::in_memory()),
        }))
    }

    async fn post_call(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/v1/tools/call")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_tools_catalogue_is_served() {
        let response = app()
            .oneshot(Request::get("/v1/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["tools"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_failures_map_to_status_codes() {
        let (status, body) = post_call(
            app(),
            json!({ "name": "update_memory_access", "arguments": { "id": "mem-missing" } }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");

        let (status, _) = post_call(app(), json!({ "name": "nope", "arguments": {} })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_successful_call() {
        let (status, body) = post_call(
            app(),
            json!({
                "name": "create_task",
                "arguments": { "description": "serve", "priority": "low", "category": "net" }
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["task"]["priority"], "low");
    }
}

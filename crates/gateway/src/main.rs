//! litgraph API Gateway
//!
//! HTTP front door for the research pipeline.
//! Handles:
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use litgraph_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics,
};
use litgraph_research::ResearchWorkflow;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workflow: Arc<ResearchWorkflow>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting litgraph API Gateway v{}", litgraph_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Suffix("research_duration_seconds".to_string()),
                metrics::RUN_BUCKETS,
            )?
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Build the research pipeline
    let workflow = ResearchWorkflow::from_config(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialise research workflow");
        e
    })?;

    // Create app state
    let state = AppState {
        config: config.clone(),
        workflow: Arc::new(workflow),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Research runs are the expensive route; only they are rate limited
    let mut research_route = post(handlers::research::research);
    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        research_route = research_route.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Research endpoint
        .route("/research", research_route);

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use litgraph_common::{
        AppError, CompletionClient, CompletionRequest, MemoryStore, PaperRecord, PaperSource,
        Result,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct EmptySource;

    #[async_trait]
    impl PaperSource for EmptySource {
        async fn search_by_keyword(&self, _query: &str, _limit: usize) -> Vec<PaperRecord> {
            Vec::new()
        }

        async fn search_by_title(&self, _title: &str) -> Option<PaperRecord> {
            None
        }

        async fn batch_details(&self, _ids: &[String]) -> Vec<PaperRecord> {
            Vec::new()
        }
    }

    struct OfflineCompletion;

    #[async_trait]
    impl CompletionClient for OfflineCompletion {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Err(AppError::Completion {
                message: "offline".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "offline"
        }
    }

    fn test_router(config: AppConfig) -> Router {
        let workflow = ResearchWorkflow::new(
            Arc::new(EmptySource),
            Arc::new(MemoryStore::new()),
            Arc::new(OfflineCompletion),
            &config,
        );
        create_router(AppState {
            config: Arc::new(config),
            workflow: Arc::new(workflow),
        })
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_research(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/research")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/v1/health").body(Body::empty()).unwrap();
        let (status, body) = send(test_router(AppConfig::default()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_store() {
        let request = Request::builder().uri("/v1/ready").body(Body::empty()).unwrap();
        let (status, body) = send(test_router(AppConfig::default()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["cache"]["backend"], "memory");
    }

    #[tokio::test]
    async fn test_research_without_seeds() {
        let request = post_research(json!({"query": "graph neural networks", "include_progress": true}));
        let (status, body) = send(test_router(AppConfig::default()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_seeds");
        assert_eq!(body["directive"]["mode"], "keyword");
        assert_eq!(body["directive"]["text"], "graph neural networks");
        assert_eq!(body["progress"].as_array().map(Vec::len), Some(3));
        assert!(body["report"].as_str().unwrap().contains("keyword"));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let (status, body) = send(test_router(AppConfig::default()), post_research(json!({"query": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(test_router(AppConfig::default()), post_research(json!({"query": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_research_is_rate_limited() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let router = test_router(config);

        let (first, _) = send(router.clone(), post_research(json!({"query": "gnn"}))).await;
        let (second, body) = send(router, post_research(json!({"query": "gnn"}))).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }
}

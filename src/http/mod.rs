//! HTTP boundary: thin axum routes over [`NetworkService`].

mod query;

pub use query::{graph_query, path_query};

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{Result, WarmgraphError};
use crate::service::NetworkService;
use query::Params;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .is_ok()
}

/// Error body `{"error": kind, "message": text}` with the matching status.
pub struct ApiError(pub WarmgraphError);

impl From<WarmgraphError> for ApiError {
    fn from(e: WarmgraphError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(error: &WarmgraphError) -> StatusCode {
    match error {
        WarmgraphError::NodeNotFound { .. } => StatusCode::NOT_FOUND,
        WarmgraphError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        WarmgraphError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        } else {
            log::debug!("Request rejected: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.kind(),
                "message": self.0.to_string()
            })),
        )
            .into_response()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    service: Arc<NetworkService>,
    api_key: String,
    allowed_origins: Vec<String>,
    authless: bool,
}

/// HTTP server wrapper
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(service: Arc<NetworkService>) -> Result<Self> {
        let settings = service.config().http_server.clone();
        let api_key = if settings.authless {
            String::new()
        } else {
            std::env::var(&settings.api_key_env).map_err(|_| {
                WarmgraphError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable, or enable authless mode.",
                    settings.api_key_env
                ))
            })?
        };
        Ok(Self {
            state: AppState {
                service,
                api_key,
                allowed_origins: settings.allowed_origins,
                authless: settings.authless,
            },
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.router();
        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting warmgraph HTTP server on http://{}", addr);

        if !check_port_available(port).await {
            return Err(WarmgraphError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Create the axum router
    pub fn router(&self) -> Router {
        let cors = if self.state.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .state
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let api = Router::new()
            .route("/warm-intros/:source/:target", get(handle_warm_intros))
            .route("/network/graph", get(handle_network_graph))
            .route("/network/stats", get(handle_network_stats))
            .route("/network/rebuild", post(handle_rebuild))
            .route_layer(middleware::from_fn_with_state(self.state.clone(), guard));

        Router::new()
            .merge(api)
            .route("/health", get(handle_health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(self.state.clone())
    }
}

/// Bearer-token and origin checks, skipped in authless mode.
async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.authless {
        if let Err(response) = validate_auth(request.headers(), &state.api_key) {
            return response;
        }
        if let Err(response) = validate_origin(request.headers(), &state.allowed_origins) {
            return response;
        }
    }
    next.run(request).await
}

async fn handle_warm_intros(
    State(state): State<AppState>,
    Path((source, target)): Path<(String, String)>,
    Query(params): Query<Params>,
) -> std::result::Result<Response, ApiError> {
    let query = path_query(&params)?;
    let response = state.service.warm_intros(&source, &target, &query).await?;
    Ok(Json(&*response).into_response())
}

async fn handle_network_graph(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> std::result::Result<Response, ApiError> {
    let (filters, limit) = graph_query(&params)?;
    let subgraph = state.service.network_graph(filters, limit).await?;
    Ok(Json(&*subgraph).into_response())
}

async fn handle_network_stats(State(state): State<AppState>) -> Response {
    Json(state.service.network_stats()).into_response()
}

async fn handle_rebuild(
    State(state): State<AppState>,
) -> std::result::Result<Response, ApiError> {
    let report = state.service.rebuild().await?;
    log::info!(
        "Rebuild via HTTP: v{} with {} nodes, {} edges, {} warnings",
        report.version,
        report.nodes,
        report.edges,
        report.warning_count
    );
    Ok(Json(report).into_response())
}

async fn handle_health(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "warmgraph",
            "version": env!("CARGO_PKG_VERSION"),
            "graph": state.service.status()
        })),
    )
        .into_response()
}

fn unauthorized(error: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": error,
            "message": "Use 'Authorization: Bearer <api-key>' header"
        })),
    )
        .into_response()
}

fn validate_auth(headers: &HeaderMap, expected_key: &str) -> std::result::Result<(), Response> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("missing_authorization"))?;

    let provided_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("invalid_authorization_format"))?;

    if provided_key != expected_key {
        return Err(unauthorized("invalid_api_key"));
    }
    Ok(())
}

fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> std::result::Result<(), Response> {
    // No list configured: local development
    if allowed_origins.is_empty() {
        return Ok(());
    }

    // Non-browser clients send no Origin
    let Some(origin) = headers.get("origin").and_then(|h| h.to_str().ok()) else {
        return Ok(());
    };

    if allowed_origins.iter().any(|allowed| origin == allowed) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "origin_not_allowed",
                "message": format!("Origin '{}' is not in the allowed origins list", origin)
            })),
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::loader::test_support::seeded_db;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app_with(config: Config, api_key: &str) -> (tempfile::TempDir, Router) {
        let (dir, db) = seeded_db().await;
        let service = Arc::new(NetworkService::new(db, config));
        service.rebuild().await.unwrap();
        let settings = service.config().http_server.clone();
        let server = HttpServer {
            state: AppState {
                service,
                api_key: api_key.to_string(),
                allowed_origins: settings.allowed_origins,
                authless: settings.authless,
            },
        };
        (dir, server.router())
    }

    async fn app() -> (tempfile::TempDir, Router) {
        app_with(Config::default(), "").await
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = app().await;
        let (status, body) = call(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["graph"]["nodes"], 5);
    }

    #[tokio::test]
    async fn test_warm_intros_route() {
        let (_dir, app) = app().await;
        let (status, body) = call(&app, get_req("/warm-intros/investor:1/investor:3?maxHops=3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["best_path"]["hops"], 2);
        assert_eq!(body["best_path"]["nodes"][1]["id"], "investor:2");
        assert_eq!(body["best_path"]["edges"][0]["type"], "co_investment");
        assert_eq!(body["paths"].as_array().unwrap().len(), 1);
        assert!(body["introduction"].as_str().unwrap().contains("Ben Ortiz"));
    }

    #[tokio::test]
    async fn test_warm_intros_no_path() {
        let (_dir, app) = app().await;
        let (status, body) = call(&app, get_req("/warm-intros/investor:1/investor:3?maxHops=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["best_path"].is_null());
        assert_eq!(body["paths"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (_dir, app) = app().await;
        let (status, body) = call(&app, get_req("/warm-intros/investor:1/investor:99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "node_not_found");

        let (status, body) = call(&app, get_req("/warm-intros/investor:1/investor:1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let (status, _) = call(&app, get_req("/warm-intros/investor:1/investor:3?maxHops=x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, get_req("/network/graph?focusId=investor:99")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&WarmgraphError::Timeout("path search")), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&WarmgraphError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_network_graph_route() {
        let (_dir, app) = app().await;
        let (status, body) = call(
            &app,
            get_req("/network/graph?kinds=investor&focusId=investor:3&limit=2&unknown=1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let nodes = body["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["id"], "investor:3");
        assert_eq!(body["stats"]["totalNodes"], 5);
        assert_eq!(body["stats"]["focusNode"]["id"], "investor:3");
    }

    #[tokio::test]
    async fn test_network_graph_sector() {
        let (_dir, app) = app().await;
        let (status, body) = call(&app, get_req("/network/graph?sector=fintech")).await;
        assert_eq!(status, StatusCode::OK);
        let nodes = body["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["id"], "company:1");
        assert_eq!(body["edges"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_stats_route() {
        let (_dir, app) = app().await;
        let (status, body) = call(&app, get_req("/network/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalNodes"], 5);
        assert_eq!(body["nodesByKind"]["investor"], 3);
        assert_eq!(body["edgesByType"]["firm_colleague"], 2);
    }

    #[tokio::test]
    async fn test_rebuild_route() {
        let (_dir, app) = app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/network/rebuild")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 2);
        assert_eq!(body["edges"], 4);
    }

    #[tokio::test]
    async fn test_auth_required_when_not_authless() {
        let mut config = Config::default();
        config.http_server.authless = false;
        config.http_server.allowed_origins = vec!["https://app.example.com".to_string()];
        let (_dir, app) = app_with(config, "secret").await;

        let (status, body) = call(&app, get_req("/network/stats")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing_authorization");

        let wrong = Request::builder()
            .uri("/network/stats")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, wrong).await.0, StatusCode::UNAUTHORIZED);

        let foreign = Request::builder()
            .uri("/network/stats")
            .header("authorization", "Bearer secret")
            .header("origin", "https://evil.example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, foreign).await.0, StatusCode::FORBIDDEN);

        let ok = Request::builder()
            .uri("/network/stats")
            .header("authorization", "Bearer secret")
            .header("origin", "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&app, ok).await.0, StatusCode::OK);

        // health stays open
        assert_eq!(call(&app, get_req("/health")).await.0, StatusCode::OK);
    }
}

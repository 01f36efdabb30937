use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use domain_users::{handlers, UserBackend, UserRepository, UserService};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, Level};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
}

/// Full application router: users API under `/api/v1/users` plus liveness
/// and readiness probes
pub fn router<R: UserRepository + 'static>(
    service: UserService<R>,
    backend: Arc<UserBackend>,
    cors: CorsLayer,
) -> Router {
    Router::new()
        .nest("/api/v1/users", handlers::router(service))
        .merge(health_router(backend))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
}

fn health_router(backend: Arc<UserBackend>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(backend)
}

/// Liveness: 200 whenever the process is serving
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness: pings the selected backend
async fn ready(State(backend): State<Arc<UserBackend>>) -> Response {
    let kind = backend.kind().to_string();
    let health = backend.health_status().await;

    if health.healthy {
        return (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "backend": kind,
                "database": "connected",
                "response_time_ms": health.response_time_ms,
            })),
        )
            .into_response();
    }

    error!(
        backend = %kind,
        "Readiness check failed: {}",
        health.message.as_deref().unwrap_or("unknown error")
    );
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "not ready",
            "backend": kind,
            "database": "disconnected",
            "error": health.message,
            "response_time_ms": health.response_time_ms,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cors::CorsConfig;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use database::postgres::PostgresConfig;
    use domain_users::{
        BackendConfig, EventBus, InMemoryUserRepository, Sha256Hasher, UserServiceConfig,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut unreachable = PostgresConfig::new("127.0.0.1", 1, "postgres", "postgres", "users_db");
        unreachable.connect_timeout_secs = 1;
        let backend = Arc::new(UserBackend::new(
            BackendConfig::postgres(unreachable),
            EventBus::new(),
        ));

        let service = UserService::new(
            InMemoryUserRepository::new(EventBus::new()),
            Arc::new(Sha256Hasher::new("api-test")),
            UserServiceConfig::default(),
        );

        router(service, backend, CorsConfig::default().layer())
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["name"], "users_api");
    }

    #[tokio::test]
    async fn test_ready_reports_unreachable_backend() {
        let response = app()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["status"], "not ready");
        assert_eq!(body["backend"], "postgres");
        assert!(body["error"].is_string());
        assert!(body["response_time_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_cors_preflight_for_allowed_origin() {
        let cors = CorsConfig {
            allowed_origins: vec![HeaderValue::from_static("http://localhost:3000")],
        };
        let backend = Arc::new(UserBackend::new(BackendConfig::default(), EventBus::new()));
        let service = UserService::new(
            InMemoryUserRepository::new(EventBus::new()),
            Arc::new(Sha256Hasher::new("api-test")),
            UserServiceConfig::default(),
        );
        let app = router(service, backend, cors.layer());

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/users")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );

        let request = Request::get("/health")
            .header("origin", "http://evil.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_permissive_cors_allows_any_origin() {
        let request = Request::get("/health")
            .header("origin", "http://anywhere.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_users_api_is_nested() {
        let request = Request::post("/api/v1/users")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"email":"a@b.com","username":"a","password":"longenough1"}"#,
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app()
            .oneshot(Request::get("/api/v1/users/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

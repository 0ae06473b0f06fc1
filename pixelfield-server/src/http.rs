//! HTTP surface: axum routes and the `PlaceError` → status mapping.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pixelfield_core::{now_ms, Region};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::identity::{Credentials, IdentityResolver};
use crate::pipeline::{PlaceError, WritePipeline};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<WritePipeline>,
    pub resolver: Arc<IdentityResolver>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/canvas", get(get_canvas))
        .route("/pixel", post(post_pixel))
        .route("/agents", get(get_agents))
        .route("/health", get(get_health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RegionQuery {
    x: Option<u32>,
    y: Option<u32>,
    w: Option<u32>,
    h: Option<u32>,
}

async fn get_canvas(State(state): State<AppState>, Query(query): Query<RegionQuery>) -> Response {
    let dims = state.pipeline.dims();
    let region = Region::new(
        query.x.unwrap_or(0),
        query.y.unwrap_or(0),
        query.w.unwrap_or(dims.width),
        query.h.unwrap_or(dims.height),
    );
    let pipeline = state.pipeline.clone();
    match run_blocking(move || pipeline.snapshot(region)).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

/// Run store-touching pipeline work on the blocking pool. Plane reads can
/// span megabytes of RocksDB I/O, which must not stall a runtime worker.
async fn run_blocking<T, F>(f: F) -> Result<T, PlaceError>
where
    F: FnOnce() -> Result<T, PlaceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PlaceError::Backend(e.to_string()))?
}

async fn post_pixel(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let creds = extract_credentials(&headers, addr);
    let identity = match state.resolver.resolve(&creds).await {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    // Coordinates must be JSON integers; anything else is a 400, not
    // a silent truncation.
    let Some(x) = body.get("x").and_then(Value::as_i64) else {
        return error_response(PlaceError::Validation("x must be an integer".to_string()));
    };
    let Some(y) = body.get("y").and_then(Value::as_i64) else {
        return error_response(PlaceError::Validation("y must be an integer".to_string()));
    };
    let Some(color) = body.get("color").and_then(Value::as_str) else {
        return error_response(PlaceError::Validation("color must be a string".to_string()));
    };

    let pipeline = state.pipeline.clone();
    let color = color.to_string();
    match run_blocking(move || pipeline.place(x, y, &color, &identity)).await {
        Ok(event) => {
            let mut payload = match serde_json::to_value(&event) {
                Ok(v) => v,
                Err(e) => return error_response(PlaceError::Backend(e.to_string())),
            };
            payload["ok"] = json!(true);
            // agent_hash is omitted, not null, when attribution is off.
            if payload["agent_hash"].is_null() {
                if let Some(obj) = payload.as_object_mut() {
                    obj.remove("agent_hash");
                }
            }
            Json(payload).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn get_agents(State(state): State<AppState>) -> Response {
    let pipeline = state.pipeline.clone();
    match run_blocking(move || pipeline.agent_map()).await {
        Ok(agents) => Json(json!({ "agents": agents })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_health(State(state): State<AppState>) -> Response {
    match state.pipeline.store().ping() {
        Ok(latency) => Json(json!({
            "status": "ok",
            "checks": {
                "store": {
                    "status": "ok",
                    "latency_ms": latency.as_millis() as u64,
                }
            },
            "timestamp": now_ms(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "checks": {
                    "store": {
                        "status": "error",
                        "error": e.to_string(),
                    }
                },
                "timestamp": now_ms(),
            })),
        )
            .into_response(),
    }
}

/// Pull raw credentials out of the request.
fn extract_credentials(headers: &HeaderMap, addr: SocketAddr) -> Credentials {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Credentials {
        agent_header: header("x-agent-id"),
        bearer_token: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string),
        forwarded_for: header("x-forwarded-for"),
        real_ip: header("x-real-ip"),
        remote_addr: addr.ip().to_string(),
    }
}

/// Map a [`PlaceError`] to its HTTP response.
fn error_response(error: PlaceError) -> Response {
    match &error {
        PlaceError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": msg })),
        )
            .into_response(),
        PlaceError::Auth(msg) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": msg })),
        )
            .into_response(),
        PlaceError::Throttled { retry_after } => (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", retry_after.to_string())],
            Json(json!({
                "error": "rate limited",
                "retry_after": retry_after,
            })),
        )
            .into_response(),
        PlaceError::Backend(msg) => {
            log::error!("Backend failure: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                PlaceError::Validation("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (PlaceError::Auth("who".to_string()), StatusCode::UNAUTHORIZED),
            (
                PlaceError::Throttled { retry_after: 5 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                PlaceError::Backend("down".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error_response(error).status(), expected);
        }
    }

    #[test]
    fn test_throttled_sets_retry_after_header() {
        let response = error_response(PlaceError::Throttled { retry_after: 5 });
        assert_eq!(
            response.headers().get("retry-after").unwrap().to_str().unwrap(),
            "5"
        );
    }

    #[test]
    fn test_extract_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("x-agent-id", "bot-a".parse().unwrap());
        headers.insert("authorization", "Bearer tok123".parse().unwrap());
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());

        let addr: SocketAddr = "10.0.0.1:55555".parse().unwrap();
        let creds = extract_credentials(&headers, addr);

        assert_eq!(creds.agent_header.as_deref(), Some("bot-a"));
        assert_eq!(creds.bearer_token.as_deref(), Some("tok123"));
        assert_eq!(creds.client_ip(), "203.0.113.7");
        assert_eq!(creds.remote_addr, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_run_blocking_passes_results_through() {
        let ok = run_blocking(|| Ok(7u32)).await;
        assert_eq!(ok.unwrap(), 7);

        let err = run_blocking::<u32, _>(|| {
            Err(PlaceError::Validation("bad".to_string()))
        })
        .await;
        assert!(matches!(err, Err(PlaceError::Validation(_))));
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        let addr: SocketAddr = "10.0.0.1:55555".parse().unwrap();
        assert_eq!(extract_credentials(&headers, addr).bearer_token, None);
    }
}

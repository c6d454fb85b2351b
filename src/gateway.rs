use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::Extension;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::case_id::format_case_id;
use crate::case_type::CaseType;
use crate::counter::{counter_key, CounterError, CounterStore};
use crate::time_bucket::MonthBucket;

/// Shared state for the gateway routes. Holds no mutable state of its own;
/// the sequence counters live entirely in the external store.
pub struct AppState {
    pub allowed_origin: Option<String>,
    pub store: Arc<dyn CounterStore>,
}

/// Successful mint result, returned to the client as
/// `{"caseId", "year", "month", "seq"}`.
struct Minted {
    case_id: String,
    year: String,
    month: String,
    seq: i64,
}

#[derive(Debug, thiserror::Error)]
enum MintError {
    #[error("Use one of FCR, CR, IRR, RMA.")]
    InvalidType,

    /// Body present but not valid JSON. Surfaces as a 500, not a 400; the
    /// missing-body case never gets here (it is treated as an empty object).
    #[error("{0}")]
    MalformedBody(serde_json::Error),

    #[error(transparent)]
    Counter(#[from] CounterError),
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/case-id", any(handle_case_id))
        .route("/health", get(health))
        .layer(Extension(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The minting endpoint. Dispatches on method so that every branch, including
/// preflight and method rejection, carries the same CORS headers.
async fn handle_case_id(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Response {
    let origin = resolve_origin(state.allowed_origin.as_deref());

    // Browser pre-flight: answer immediately, never touch the counter.
    if method == Method::OPTIONS {
        return cors_response(StatusCode::NO_CONTENT, &origin, None);
    }

    if method != Method::POST {
        return cors_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &origin,
            Some(json!({ "error": "Method Not Allowed" })),
        );
    }

    match mint(&state, &body).await {
        Ok(minted) => {
            log::info!("minted {}", minted.case_id);
            let body = json!({
                "caseId": minted.case_id,
                "year": minted.year,
                "month": minted.month,
                "seq": minted.seq,
            });
            cors_response(StatusCode::OK, &origin, Some(body))
        }
        Err(err @ MintError::InvalidType) => {
            log::debug!("rejected mint request: invalid case type");
            cors_response(
                StatusCode::BAD_REQUEST,
                &origin,
                Some(json!({ "error": err.to_string() })),
            )
        }
        Err(err) => {
            log::error!("mint request failed: {}", err);
            let mut message = err.to_string();
            if message.is_empty() {
                message = "Server error".to_string();
            }
            cors_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &origin,
                Some(json!({ "error": message })),
            )
        }
    }
}

/// Linear per-request flow: validate, bucket, increment, format. Any step's
/// failure short-circuits to the matching error response.
async fn mint(state: &AppState, body: &[u8]) -> Result<Minted, MintError> {
    let case_type = parse_case_type(body)?;
    let bucket = MonthBucket::now();
    let key = counter_key(case_type, &bucket);
    let seq = state.store.increment(&key).await?;

    Ok(Minted {
        case_id: format_case_id(case_type, &bucket, seq),
        year: bucket.year,
        month: bucket.month,
        seq,
    })
}

/// Lenient body handling: a missing body is the empty object, so it falls
/// through to the validation error rather than a parse error. Syntactically
/// invalid JSON, by contrast, is a server-side failure.
fn parse_case_type(body: &[u8]) -> Result<CaseType, MintError> {
    let payload: Value = if body.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(MintError::MalformedBody)?
    };

    let raw = payload
        .get("type")
        .map(coerce_to_string)
        .unwrap_or_default();
    CaseType::parse(&raw).ok_or(MintError::InvalidType)
}

/// Stringify the `type` field the way loosely typed clients expect: strings
/// pass through, scalars stringify, missing/null become empty.
fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A configured allow-list origin is always the one emitted, whether or not
/// the request's Origin matched it; with none configured, any origin is
/// allowed.
fn resolve_origin(allowed: Option<&str>) -> HeaderValue {
    allowed
        .and_then(|origin| HeaderValue::from_str(origin).ok())
        .unwrap_or_else(|| HeaderValue::from_static("*"))
}

/// Wrap every response branch in the fixed CORS header set. Only successful
/// mints carry an explicit JSON content type.
fn cors_response(status: StatusCode, origin: &HeaderValue, body: Option<Value>) -> Response {
    let mut response = match body {
        Some(value) => Response::new(Body::from(value.to_string())),
        None => Response::new(Body::empty()),
    };
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if status == StatusCode::OK {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    response
}

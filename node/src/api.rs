//! # REST API
//!
//! Builds the axum router that exposes the verification node's HTTP
//! interface. All endpoints share application state through axum's `State`
//! extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                             | Description                          |
//! |--------|----------------------------------|--------------------------------------|
//! | GET    | `/health`                        | Liveness probe                       |
//! | POST   | `/api/auth/github/start`         | Issue a code for an announcement     |
//! | POST   | `/api/auth/github/verify`        | Check the author's `verify:` comment |
//! | POST   | `/api/auth/siwe/nonce`           | Issue a nonce and sign-in message    |
//! | POST   | `/api/auth/siwe/verify`          | Recover the signer and sign in       |
//! | GET    | `/api/auth/siwe/check`           | Is this wallet registered?           |
//! | GET    | `/api/oracles/me`                | Identity behind a bearer token       |
//! | POST   | `/api/admin/oracles/:id/approve` | Approve a pending identity           |
//!
//! Hard failures answer with an error status and `{success: false, error}`.
//! A verify attempt whose proof did not hold answers 200 with
//! `{success: false, error, hint?}` so clients can tell "try again" from
//! "bad request".

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use oraclenet_protocol::identity::{Oracle, OracleStore, SessionTokens, StoreError, TokenIssuer};
use oraclenet_protocol::social::SocialVerifier;
use oraclenet_protocol::wallet::SignatureVerifier;
use oraclenet_protocol::{AuthError, ErrorKind, Rejection, Verdict};

use crate::metrics::{
    SharedMetrics, FLOW_GITHUB, FLOW_WALLET, OUTCOME_FAILED, OUTCOME_REJECTED, OUTCOME_VERIFIED,
};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Everything a handler needs. Cloned per request, all behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// GitHub announcement flow.
    pub social: Arc<SocialVerifier>,
    /// Wallet signature flow.
    pub wallet: Arc<SignatureVerifier>,
    /// Identity records, shared with both flows.
    pub store: Arc<dyn OracleStore>,
    /// Bearer sessions issued by both flows.
    pub tokens: Arc<SessionTokens>,
    /// Flow counters and latency histograms.
    pub metrics: SharedMetrics,
    /// Bearer secret for the admin routes. `None` disables them.
    pub admin_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// The API router with permissive CORS and request tracing applied.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/github/start", post(github_start_handler))
        .route("/api/auth/github/verify", post(github_verify_handler))
        .route("/api/auth/siwe/nonce", post(siwe_nonce_handler))
        .route("/api/auth/siwe/verify", post(siwe_verify_handler))
        .route("/api/auth/siwe/check", get(siwe_check_handler))
        .route("/api/oracles/me", get(me_handler))
        .route("/api/admin/oracles/:id/approve", post(approve_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A hard failure rendered as `{success: false, error}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }
}

/// The single place where error kinds become status codes.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedInput
        | ErrorKind::Verification
        | ErrorKind::Conflict
        | ErrorKind::UpstreamStatus => StatusCode::BAD_REQUEST,
        ErrorKind::UpstreamUnavailable | ErrorKind::Persistence => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::debug!(error = %err, "request rejected");
        }
        Self::new(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            other => AuthError::from(other).into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Unwraps a JSON body, turning decode failures into a 400.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(inner)| inner).map_err(ApiError::from)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubStartRequest {
    #[serde(default)]
    pub issue_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubStartResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub issue_url: String,
    pub oracle_name: Option<String>,
    pub author: String,
    pub expires_in: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubVerifyRequest {
    #[serde(default)]
    pub issue_url: String,
    #[serde(default)]
    pub code: String,
}

/// Identity summary returned by the GitHub verify endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct GithubRecord {
    pub id: String,
    pub name: String,
    pub github_username: Option<String>,
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubVerifyResponse {
    pub success: bool,
    pub token: String,
    pub created: bool,
    pub oracle_name: String,
    pub approved: bool,
    pub record: GithubRecord,
}

/// Body of a soft rejection.
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<Rejection> for RejectionBody {
    fn from(rejection: Rejection) -> Self {
        Self {
            success: false,
            error: rejection.error,
            hint: rejection.hint,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub success: bool,
    pub nonce: String,
    pub message: String,
    pub timestamp: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct SiweVerifyRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub signature: String,
    pub name: Option<String>,
}

/// Full public view of an identity. Never includes the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct OracleView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub wallet_address: Option<String>,
    pub github_username: Option<String>,
    pub birth_issue: Option<u64>,
    pub approved: bool,
    pub karma: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl From<Oracle> for OracleView {
    fn from(oracle: Oracle) -> Self {
        Self {
            id: oracle.id,
            name: oracle.name,
            email: oracle.email,
            wallet_address: oracle.wallet_address,
            github_username: oracle.github_username,
            birth_issue: oracle.birth_issue,
            approved: oracle.approved,
            karma: oracle.karma,
            created: oracle.created,
            updated: oracle.updated,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SiweVerifyResponse {
    pub success: bool,
    pub created: bool,
    pub oracle: OracleView,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckOracle {
    pub id: String,
    pub name: String,
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub registered: bool,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<CheckOracle>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OracleResponse {
    pub success: bool,
    pub oracle: OracleView,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
///
/// Always returns 200 with `{"status": "ok"}` while the process is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /api/auth/github/start`
async fn github_start_handler(
    State(state): State<AppState>,
    payload: Result<Json<GithubStartRequest>, JsonRejection>,
) -> ApiResult<GithubStartResponse> {
    let request = body(payload)?;
    let started = state.social.start(&request.issue_url).await?;
    let issue_url = request.issue_url;
    state
        .metrics
        .challenges_issued_total
        .with_label_values(&[FLOW_GITHUB])
        .inc();

    Ok(Json(GithubStartResponse {
        success: true,
        code: started.code,
        message: started.instruction,
        issue_url,
        oracle_name: started.oracle_name,
        author: started.author,
        expires_in: started.expires_in,
    }))
}

/// `POST /api/auth/github/verify`
async fn github_verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<GithubVerifyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = body(payload)?;
    let timer = Instant::now();
    let result = state.social.verify(&request.issue_url, &request.code).await;
    state
        .metrics
        .verification_duration_seconds
        .with_label_values(&[FLOW_GITHUB])
        .observe(timer.elapsed().as_secs_f64());

    match result {
        Ok(Verdict::Accepted(done)) => {
            state
                .metrics
                .record_verification(FLOW_GITHUB, OUTCOME_VERIFIED, done.created);
            let oracle = done.oracle;
            Ok(Json(GithubVerifyResponse {
                success: true,
                token: done.token,
                created: done.created,
                oracle_name: oracle.name.clone(),
                approved: oracle.approved,
                record: GithubRecord {
                    id: oracle.id,
                    name: oracle.name,
                    github_username: oracle.github_username,
                    approved: oracle.approved,
                },
            })
            .into_response())
        }
        Ok(Verdict::Rejected(rejection)) => {
            state
                .metrics
                .record_verification(FLOW_GITHUB, OUTCOME_REJECTED, false);
            Ok(Json(RejectionBody::from(rejection)).into_response())
        }
        Err(err) => {
            state
                .metrics
                .record_verification(FLOW_GITHUB, OUTCOME_FAILED, false);
            Err(err.into())
        }
    }
}

/// `POST /api/auth/siwe/nonce`
async fn siwe_nonce_handler(
    State(state): State<AppState>,
    payload: Result<Json<NonceRequest>, JsonRejection>,
) -> ApiResult<NonceResponse> {
    let request = body(payload)?;
    let grant = state.wallet.issue_nonce(&request.address)?;
    state
        .metrics
        .challenges_issued_total
        .with_label_values(&[FLOW_WALLET])
        .inc();

    Ok(Json(NonceResponse {
        success: true,
        nonce: grant.nonce,
        message: grant.message,
        timestamp: grant.timestamp,
        expires_in: grant.expires_in,
    }))
}

/// `POST /api/auth/siwe/verify`
async fn siwe_verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<SiweVerifyRequest>, JsonRejection>,
) -> ApiResult<SiweVerifyResponse> {
    let request = body(payload)?;
    let timer = Instant::now();
    let wallet = Arc::clone(&state.wallet);
    let result = tokio::task::spawn_blocking(move || {
        wallet.verify(&request.address, &request.signature, request.name.as_deref())
    })
    .await?;
    state
        .metrics
        .verification_duration_seconds
        .with_label_values(&[FLOW_WALLET])
        .observe(timer.elapsed().as_secs_f64());

    match result {
        Ok(login) => {
            state
                .metrics
                .record_verification(FLOW_WALLET, OUTCOME_VERIFIED, login.created);
            Ok(Json(SiweVerifyResponse {
                success: true,
                created: login.created,
                oracle: login.oracle.into(),
                token: login.token,
            }))
        }
        Err(err) => {
            let outcome = if err.kind() == ErrorKind::Verification {
                OUTCOME_REJECTED
            } else {
                OUTCOME_FAILED
            };
            state.metrics.record_verification(FLOW_WALLET, outcome, false);
            Err(err.into())
        }
    }
}

/// `GET /api/auth/siwe/check?address=0x...`
async fn siwe_check_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> ApiResult<CheckResponse> {
    let status = state.wallet.check(&query.address)?;
    Ok(Json(CheckResponse {
        registered: status.registered(),
        address: status.address.to_lowercase_hex(),
        oracle: status.oracle.map(|oracle| CheckOracle {
            id: oracle.id,
            name: oracle.name,
            approved: oracle.approved,
        }),
    }))
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// `GET /api/oracles/me`
async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<OracleResponse> {
    let token = bearer(&headers).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    let oracle_id = state
        .tokens
        .resolve(token)
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;
    let oracle = state
        .store
        .get(&oracle_id)?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Oracle not found"))?;

    Ok(Json(OracleResponse {
        success: true,
        oracle: oracle.into(),
    }))
}

/// `POST /api/admin/oracles/:id/approve`
async fn approve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<OracleResponse> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "Admin API is disabled"))?;
    if bearer(&headers) != Some(expected) {
        return Err(ApiError::unauthorized("Invalid admin token"));
    }

    let store = Arc::clone(&state.store);
    let oracle = tokio::task::spawn_blocking(move || store.set_approved(&id, true)).await??;
    tracing::info!(oracle_id = %oracle.id, "oracle approved by admin");
    Ok(Json(OracleResponse {
        success: true,
        oracle: oracle.into(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

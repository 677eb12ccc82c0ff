//! HTTP routes over the ledger: chain snapshot, ticket status, signed submissions.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{
    Block, CancelToken, ChainSnapshot, Ledger, LedgerError, TicketPayload, TicketStatus,
    Transaction, TransactionType,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::HttpConfig;
use crate::storage::BlockStore;

/// Shared state passed to the handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub store: Arc<BlockStore>,
    pub cancel: CancelToken,
    pub auto_seal: bool,
}

/// Envelope used by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

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

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            LedgerError::State { .. } => StatusCode::CONFLICT,
            LedgerError::SealCancelled => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Serialization(_) => StatusCode::BAD_REQUEST,
            LedgerError::Integrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn router(state: AppState, config: &HttpConfig) -> Router {
    Router::new()
        .route("/chain", get(get_chain))
        .route("/status/:id", get(get_status))
        .route("/submit", post(submit))
        .route("/mine", post(mine))
        .route("/health", get(health))
        .layer(build_cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &HttpConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ]);

    if config.http_cors.iter().any(|s| s.trim() == "*") {
        return cors.allow_origin(Any);
    }

    let origins = config
        .http_cors
        .iter()
        .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    cors.allow_origin(AllowOrigin::list(origins))
}

/// GET /chain
async fn get_chain(State(state): State<AppState>) -> ApiResult<ChainSnapshot> {
    Ok(ApiResponse::ok(state.ledger.get_chain_snapshot()))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ticket_id: String,
    pub status: TicketStatus,
}

/// GET /status/:id
async fn get_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<StatusResponse> {
    let status = state.ledger.get_status(&ticket_id);
    Ok(ApiResponse::ok(StatusResponse { ticket_id, status }))
}

/// Body of POST /submit. Every field is required; they are optional here so a missing
/// one yields a readable 400 instead of a decoder error.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub ticket_id: Option<String>,
    pub payload: Option<TicketPayload>,
    pub signature: Option<String>,
}

impl SubmitRequest {
    fn into_transaction(self) -> Result<Transaction, ApiError> {
        let (Some(tx_type), Some(ticket_id), Some(payload), Some(signature)) =
            (self.tx_type, self.ticket_id, self.payload, self.signature)
        else {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "Missing fields: type, ticketId, payload, signature.",
            ));
        };
        let tx_type: TransactionType = tx_type.parse()?;
        Ok(Transaction::new(tx_type, ticket_id, payload, signature))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: String,
    pub tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
}

/// POST /submit
async fn submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<SubmitResponse> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;
    let tx = body.into_transaction()?;
    let tx_id = tx.id.clone();
    let ticket_id = tx.ticket_id.clone();
    let action = tx.tx_type;

    state.ledger.submit_transaction(tx)?;
    info!(tx_id = %tx_id, ticket_id = %ticket_id, action = %action, "transaction accepted");

    if !state.auto_seal {
        return Ok(ApiResponse::ok(SubmitResponse {
            status: "PENDING".to_string(),
            tx_id,
            block_index: None,
            block_hash: None,
        }));
    }

    let seal_id = tx_id.clone();
    let block = seal_and_persist(&state, move |ledger, cancel| ledger.seal_transaction(&seal_id, cancel)).await?;

    Ok(ApiResponse::ok(SubmitResponse {
        status: "ACCEPTED".to_string(),
        tx_id,
        block_index: Some(block.index),
        block_hash: Some(block.hash),
    }))
}

/// POST /mine
async fn mine(State(state): State<AppState>) -> ApiResult<Block> {
    if state.ledger.pending_len() == 0 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "no pending transactions"));
    }
    let block = seal_and_persist(&state, |ledger, cancel| ledger.seal_pending_transactions(cancel)).await?;
    Ok(ApiResponse::ok(block))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub height: usize,
    pub pending: usize,
}

/// GET /health
async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    Ok(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        height: state.ledger.height(),
        pending: state.ledger.pending_len(),
    }))
}

/// Run a seal off the async workers, then write any new blocks to disk.
async fn seal_and_persist<F>(state: &AppState, op: F) -> Result<Block, ApiError>
where
    F: FnOnce(&Ledger, &CancelToken) -> Result<Block, LedgerError> + Send + 'static,
{
    let ledger = state.ledger.clone();
    let store = state.store.clone();
    let cancel = state.cancel.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let block = op(&*ledger, &cancel)?;
        if let Err(e) = store.flush(&ledger) {
            error!(error = %e, index = block.index, "failed to persist block");
            return Err(ApiError::internal("persist failed"));
        }
        Ok(block)
    })
    .await;

    match joined {
        Ok(res) => res,
        Err(e) => {
            error!(error = %e, "seal task failed");
            Err(ApiError::internal("seal task failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ledger_core::{generate_keypair, public_key_hex, sign_payload, SecretKey, Timestamp};
    use tower::ServiceExt;

    fn test_app(dir: &std::path::Path, auto_seal: bool) -> (Router, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::new(1));
        let state = AppState {
            ledger: ledger.clone(),
            store: Arc::new(BlockStore::new(dir.to_path_buf(), 0)),
            cancel: CancelToken::new(),
            auto_seal,
        };
        (router(state, &HttpConfig::default()), ledger)
    }

    fn submit_body(kind: &str, sk: &SecretKey, payload: TicketPayload) -> String {
        serde_json::json!({
            "type": kind,
            "ticketId": public_key_hex(&sk.verifying_key()),
            "signature": sign_payload(&payload, sk).unwrap(),
            "payload": payload,
        })
        .to_string()
    }

    async fn post(app: &Router, uri: &str, body: String) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn submit_mint_seals_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (app, ledger) = test_app(dir.path(), true);
        let (pk, sk) = generate_keypair();

        let body = submit_body("MINT", &sk, TicketPayload::new(Timestamp::now()).with_price("5.00"));
        let (status, json) = post(&app, "/submit", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ACCEPTED");
        assert_eq!(json["data"]["blockIndex"], 1);

        assert_eq!(ledger.height(), 2);
        assert!(crate::storage::block_path(dir.path(), 1).exists());

        let (_, json) = get_json(&app, &format!("/status/{}", public_key_hex(&pk))).await;
        assert_eq!(json["data"]["status"], "ISSUED");
    }

    #[tokio::test]
    async fn forged_submission_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), true);
        let (victim, _) = generate_keypair();
        let (_, mallory) = generate_keypair();

        let payload = TicketPayload::new(Timestamp::now());
        let body = serde_json::json!({
            "type": "MINT",
            "ticketId": public_key_hex(&victim),
            "signature": sign_payload(&payload, &mallory).unwrap(),
            "payload": payload,
        })
        .to_string();
        let (status, json) = post(&app, "/submit", body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn illegal_transition_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), false);
        let (_, sk) = generate_keypair();

        let body = submit_body("ACTIVATE", &sk, TicketPayload::new(Timestamp::now()));
        let (status, json) = post(&app, "/submit", body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "ACTIVATE rejected: ticket is INVALID");
    }

    #[tokio::test]
    async fn missing_fields_are_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), true);
        let (status, json) = post(&app, "/submit", r#"{"type":"MINT"}"#.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn undecodable_payload_gets_the_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let (app, ledger) = test_app(dir.path(), true);
        let (pk, _) = generate_keypair();

        let numeric_price = serde_json::json!({
            "type": "MINT",
            "ticketId": public_key_hex(&pk),
            "signature": "00",
            "payload": { "price": 5, "timestamp": 1 },
        })
        .to_string();
        let (status, json) = post(&app, "/submit", numeric_price).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("price"));

        let (status, json) = post(&app, "/submit", "{ not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());

        assert_eq!(ledger.pending_len(), 0);
    }

    #[tokio::test]
    async fn pending_until_mine_without_auto_seal() {
        let dir = tempfile::tempdir().unwrap();
        let (app, ledger) = test_app(dir.path(), false);
        let (_, sk) = generate_keypair();

        let (status, json) = post(&app, "/mine", String::new()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let body = submit_body("MINT", &sk, TicketPayload::new(Timestamp::now()));
        let (_, json) = post(&app, "/submit", body).await;
        assert_eq!(json["data"]["status"], "PENDING");
        assert_eq!(ledger.pending_len(), 1);

        let (_, chain) = get_json(&app, "/chain").await;
        assert_eq!(chain["data"]["pending"].as_array().unwrap().len(), 1);
        assert_eq!(chain["data"]["height"], 1);

        let (status, json) = post(&app, "/mine", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["index"], 1);
        assert_eq!(ledger.pending_len(), 0);
    }

    #[tokio::test]
    async fn health_reports_height() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), true);
        let (status, json) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["height"], 1);
        assert_eq!(json["data"]["status"], "ok");
    }
}

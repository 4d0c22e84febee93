//! REST API for an UpChain node
//!
//! Serves the chain snapshot that peers sync from (`GET /chain`) together
//! with the inbound ledger operations: transfers, registry reservations,
//! lookups, mining and peer management.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::blockchain::{Block, ChainSnapshot};
use crate::error::LedgerError;
use crate::miner::MiningOutcome;
use crate::node::Node;
use crate::registry::{namespace, RegistryEntry};
use crate::sync::SyncOutcome;
use crate::transaction::Transaction;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Ledger(e) => match e {
                LedgerError::InvalidAddress(_)
                | LedgerError::InvalidAmountOrFee(_)
                | LedgerError::InvalidRegistryField(_)
                | LedgerError::Config(_) => StatusCode::BAD_REQUEST,
                LedgerError::UnknownNamespace(_) => StatusCode::NOT_FOUND,
                LedgerError::DuplicateKey { .. } => StatusCode::CONFLICT,
                LedgerError::InsufficientFunds { .. }
                | LedgerError::BlockRejected(_)
                | LedgerError::ChainInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::PeerUnreachable(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Ledger(e) => e.to_string(),
            ApiError::NotFound(msg) => msg,
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Deserialize)]
pub struct ReservationRequest {
    pub sender: String,
    pub key: String,
    /// Defaults to the namespace fee.
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct SubmittedResponse {
    pub id: String,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: i128,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transaction: Transaction,
    pub confirmed: bool,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub solved: bool,
    pub attempts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
}

#[derive(Serialize)]
pub struct NodesResponse {
    pub total_nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub adopted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    pub length: u64,
    pub errors: Vec<String>,
}

// ============================================================================
// Middleware
// ============================================================================

async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );
    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the router over `node`.
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Chain
        .route("/chain", get(get_chain))
        .route("/balance/:address", get(get_balance))
        // Transactions
        .route("/transactions", post(submit_transaction))
        .route("/transactions/:id", get(get_transaction))
        // Registry
        .route("/registry/:namespace", post(reserve))
        .route("/registry/:namespace/:key", get(lookup))
        // Mining and peers
        .route("/mine", post(mine))
        .route("/nodes", post(register_nodes))
        .route("/sync", post(sync))
        // System
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `0.0.0.0:port` until the listener fails.
pub async fn run_api_server(node: Arc<Node>, port: u16) -> std::io::Result<()> {
    let app = build_api_router(node);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on http://{}", addr);
    axum::serve(listener, app).await
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let snapshot_len = node.ledger().read().await.len();
    Json(serde_json::json!({
        "status": "healthy",
        "length": snapshot_len,
        "pending": node.pending().await.len(),
        "peers": node.peers().await.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_chain(State(node): State<Arc<Node>>) -> Json<ChainSnapshot> {
    Json(node.chain_snapshot().await)
}

async fn get_balance(State(node): State<Arc<Node>>, Path(address): Path<String>) -> Json<BalanceResponse> {
    let balance = node.balance_of(&address).await;
    Json(BalanceResponse { address, balance })
}

async fn submit_transaction(
    State(node): State<Arc<Node>>,
    Json(req): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    let id = node
        .submit_transaction(&req.sender, &req.recipient, req.amount, req.fee, req.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(SubmittedResponse { id })))
}

async fn get_transaction(
    State(node): State<Arc<Node>>,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    if let Some(transaction) = node.transaction_by_id(&id).await {
        return Ok(Json(TransactionResponse {
            transaction,
            confirmed: true,
        }));
    }

    node.pending()
        .await
        .into_iter()
        .find(|tx| tx.id() == id)
        .map(|transaction| {
            Json(TransactionResponse {
                transaction,
                confirmed: false,
            })
        })
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", id)))
}

async fn reserve(
    State(node): State<Arc<Node>>,
    Path(namespace_name): Path<String>,
    Json(req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    let id = node
        .registry_reserve(&req.sender, &namespace_name, &req.key, req.fee, req.attributes)
        .await?;
    Ok((StatusCode::CREATED, Json(SubmittedResponse { id })))
}

async fn lookup(
    State(node): State<Arc<Node>>,
    Path((namespace_name, key)): Path<(String, String)>,
) -> Result<Json<RegistryEntry>, ApiError> {
    if namespace(&namespace_name).is_none() {
        return Err(LedgerError::UnknownNamespace(namespace_name).into());
    }
    node.registry_lookup(&namespace_name, &key)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{}/{} is not registered", namespace_name, key)))
}

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let response = match node.mine().await? {
        MiningOutcome::Solved { block, attempts } => MineResponse {
            solved: true,
            attempts,
            block: Some(block),
        },
        MiningOutcome::Cancelled { attempts } => MineResponse {
            solved: false,
            attempts,
            block: None,
        },
    };
    Ok(Json(response))
}

async fn register_nodes(
    State(node): State<Arc<Node>>,
    Json(req): Json<RegisterNodesRequest>,
) -> Result<(StatusCode, Json<NodesResponse>), ApiError> {
    for url in &req.nodes {
        node.register_peer(url).await?;
    }
    Ok((
        StatusCode::CREATED,
        Json(NodesResponse {
            total_nodes: node.peers().await,
        }),
    ))
}

async fn sync(State(node): State<Arc<Node>>) -> Json<SyncResponse> {
    let report = node.sync().await;
    let errors = report.errors.iter().map(ToString::to_string).collect();
    let response = match report.outcome {
        SyncOutcome::Adopted { peer, length } => SyncResponse {
            adopted: true,
            peer: Some(peer),
            length,
            errors,
        },
        SyncOutcome::AlreadyCurrent => SyncResponse {
            adopted: false,
            peer: None,
            length: node.ledger().read().await.len() as u64,
            errors,
        },
    };
    Json(response)
}

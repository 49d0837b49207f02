//! # REST + WebSocket API
//!
//! Builds the axum router over the node's single ledger instance. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                              |
//! |--------|------------------------|------------------------------------------|
//! | GET    | `/health`              | Liveness probe                           |
//! | GET    | `/status`              | Chain, rate, supply and reserves         |
//! | GET    | `/holders/:address`    | Effective balance, principal, rate       |
//! | POST   | `/vault/deposit`       | Base asset in, units out                 |
//! | POST   | `/vault/redeem`        | Units in, base asset out (`"max"` ok)    |
//! | POST   | `/vault/fund-rewards`  | Top up vault reserves                    |
//! | POST   | `/transfer`            | Ledger transfer (`"max"` ok)             |
//! | POST   | `/admin/global-rate`   | Lower the global rate                    |
//! | POST   | `/admin/grant`         | Grant `MintBurn`                         |
//! | POST   | `/bridge/send`         | Burn here, returns the hex message       |
//! | POST   | `/bridge/receive`      | Hex message in, mint here                |
//! | GET    | `/ws`                  | Live ledger and adapter events           |
//!
//! Amounts travel as decimal strings. The API trusts the identity named in
//! each request body; it is an operator surface, not a wallet.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rebase_contracts::{FailureKind, PoolError, VaultError, VaultReceipt};
use rebase_protocol::bridge::PayloadError;
use rebase_protocol::storage::{DbError, LedgerDb};
use rebase_protocol::{Address, Amount, ChainSelector, LedgerError, LedgerEvent, MAX_AMOUNT};

use crate::metrics::SharedMetrics;
use crate::state::NodeState;

/// Broadcast channel capacity for live event streaming.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything is behind `Arc` or is a sled handle.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Ledger, vault and pool behind one lock.
    pub node: Arc<RwLock<NodeState>>,
    /// Snapshot store.
    pub db: LedgerDb,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<NodeEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(version: String, node: NodeState, db: LedgerDb, metrics: SharedMetrics) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        metrics.observe_ledger(node.ledger.global_rate(), node.ledger.total_supply());
        Self {
            version,
            node: Arc::new(RwLock::new(node)),
            db,
            event_tx,
            metrics,
        }
    }

    /// Runs one state-mutating operation under the write lock.
    ///
    /// On success the snapshot is persisted, the gauges refreshed and the
    /// ledger's events broadcast. If the operation or the write fails, the
    /// node goes back to the state it had before `op` and the rejection is
    /// counted.
    fn apply<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut NodeState) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let timer = self.metrics.operation_latency_seconds.start_timer();
        let mut node = self.node.write();
        let backup = NodeState::clone(&node);

        let outcome = op(&mut *node).and_then(|value| {
            node.persist(&self.db)?;
            Ok(value)
        });
        let events = match &outcome {
            Ok(_) => {
                self.metrics
                    .observe_ledger(node.ledger.global_rate(), node.ledger.total_supply());
                node.ledger.take_events()
            }
            Err(e) => {
                restore(&mut *node, backup, &self.db, operation, e);
                Vec::new()
            }
        };
        drop(node);
        timer.observe_duration();

        match &outcome {
            Ok(_) => {
                for event in events {
                    // No subscribers is fine.
                    let _ = self.event_tx.send(NodeEvent::Ledger(event));
                }
            }
            Err(ApiError::Rejected { kind, message }) => {
                tracing::debug!(operation, kind = kind_label(*kind), %message, "operation rejected");
                self.metrics.reject(kind_label(*kind));
            }
            Err(_) => {}
        }
        outcome
    }

    fn publish(&self, event: NodeEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Puts `node` back to `backup` after a failed operation.
///
/// When the failure was the snapshot write, disk may hold part of the new
/// state, so the restored snapshot is written again.
fn restore(
    node: &mut NodeState,
    backup: NodeState,
    db: &LedgerDb,
    operation: &str,
    error: &ApiError,
) {
    *node = backup;
    if let ApiError::Storage(message) = error {
        tracing::error!(operation, error = %message, "snapshot write failed, state restored");
        if let Err(e) = node.persist(db) {
            tracing::error!(operation, error = %e, "restored snapshot could not be written");
        }
    }
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A change recorded by the ledger.
    Ledger(LedgerEvent),
    /// A completed vault operation.
    Receipt(VaultReceipt),
    /// A message left this chain.
    BridgeSent {
        message_id: String,
        dest_chain: ChainSelector,
        nonce: u64,
    },
    /// A message from another chain was applied.
    BridgeReceived {
        message_id: String,
        source_chain: ChainSelector,
        nonce: u64,
    },
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/holders/:address", get(holder_handler))
        .route("/vault/deposit", post(deposit_handler))
        .route("/vault/redeem", post(redeem_handler))
        .route("/vault/fund-rewards", post(fund_rewards_handler))
        .route("/transfer", post(transfer_handler))
        .route("/admin/global-rate", post(global_rate_handler))
        .route("/admin/grant", post(grant_handler))
        .route("/bridge/send", post(bridge_send_handler))
        .route("/bridge/receive", post(bridge_receive_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// The ledger or an adapter refused the operation.
    Rejected { kind: FailureKind, message: String },
    /// The request could not be parsed.
    BadRequest(String),
    /// The snapshot store failed.
    Storage(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Authorization => "authorization",
        FailureKind::Invariant => "invariant",
        FailureKind::Arithmetic => "arithmetic",
        FailureKind::ExternalTransfer => "external_transfer",
        FailureKind::BadInput => "bad_input",
    }
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Authorization => StatusCode::FORBIDDEN,
        FailureKind::Invariant => StatusCode::CONFLICT,
        FailureKind::Arithmetic => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::ExternalTransfer => StatusCode::BAD_GATEWAY,
        FailureKind::BadInput => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::Rejected { kind, message } => (status_for(kind), kind_label(kind), message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_input", message),
            ApiError::Storage(message) => (StatusCode::INTERNAL_SERVER_ERROR, "storage", message),
        };
        let body = ErrorResponse {
            error,
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Rejected {
            kind: e.kind().into(),
            message: e.to_string(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        ApiError::Rejected {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        ApiError::Rejected {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<PayloadError> for ApiError {
    fn from(e: PayloadError) -> Self {
        PoolError::from(e).into()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

fn parse_amount(field: &str, raw: &str, allow_max: bool) -> Result<Amount, ApiError> {
    let raw = raw.trim();
    if allow_max && raw.eq_ignore_ascii_case("max") {
        return Ok(MAX_AMOUNT);
    }
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}: {raw:?}")))
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /vault/deposit` and `POST /vault/redeem`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultRequest {
    pub account: Address,
    /// Decimal units, or `"max"` for redeem.
    pub amount: String,
}

/// Body of `POST /vault/fund-rewards`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FundRewardsRequest {
    pub funder: Address,
    pub amount: String,
}

/// Body of `POST /transfer`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    /// Decimal units, or `"max"`.
    pub amount: String,
}

/// Body of `POST /admin/global-rate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalRateRequest {
    pub caller: Address,
    /// New per-second rate, scaled by 1e18.
    pub rate: String,
}

/// Body of `POST /admin/grant`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GrantRequest {
    pub caller: Address,
    pub account: Address,
}

/// Body of `POST /bridge/send`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BridgeSendRequest {
    pub sender: Address,
    pub receiver: Address,
    /// Decimal units, or `"max"`.
    pub amount: String,
    pub dest_chain: ChainSelector,
}

/// Body of `POST /bridge/receive`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BridgeReceiveRequest {
    /// Hex-encoded message, optional `0x` prefix.
    pub message: String,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub chain_selector: ChainSelector,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub owner: Address,
    pub global_rate: String,
    pub total_supply: String,
    /// Base asset held by the vault.
    pub reserves: String,
    /// Holders with a non-zero principal.
    pub holders: usize,
    /// Identities holding the mint/burn capability.
    pub minters: Vec<Address>,
    pub remotes: Vec<RemoteResponse>,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// One trusted remote pool.
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub chain_selector: ChainSelector,
    pub pool: Address,
}

/// Response payload for `GET /holders/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HolderResponse {
    pub address: Address,
    /// Principal plus interest accrued up to now.
    pub balance: String,
    pub principal: String,
    /// Accrued since `last_sync`; realized on the holder's next touch.
    pub pending_interest: String,
    pub rate: String,
    pub last_sync: u64,
}

/// Vault receipt with string amounts.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub id: String,
    pub kind: String,
    pub account: Address,
    pub amount: String,
    pub rate: String,
    pub at: String,
}

impl From<&VaultReceipt> for ReceiptResponse {
    fn from(r: &VaultReceipt) -> Self {
        let kind = serde_json::to_value(r.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        Self {
            id: r.id.to_string(),
            kind,
            account: r.account,
            amount: r.amount.to_string(),
            rate: r.rate.to_string(),
            at: r.at.to_rfc3339(),
        }
    }
}

/// Response payload for `POST /transfer`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Units moved; the resolved amount for `"max"`.
    pub amount: String,
}

/// Response payload for `POST /bridge/send`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BridgeSendResponse {
    /// Hex-encoded message to hand to the relay.
    pub message: String,
    pub message_id: String,
    pub nonce: u64,
    pub amount: String,
    pub rate: String,
}

/// Response payload for `POST /bridge/receive`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BridgeReceiveResponse {
    pub message_id: String,
    pub source_chain: ChainSelector,
    pub receiver: Address,
    pub amount: String,
    pub rate: String,
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: ledger-wide figures.
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let node = state.node.read();
    let ledger = &node.ledger;
    Json(StatusResponse {
        version: state.version.clone(),
        chain_selector: node.pool.chain(),
        name: ledger.name().to_string(),
        symbol: ledger.symbol().to_string(),
        decimals: ledger.decimals(),
        owner: ledger.owner(),
        global_rate: ledger.global_rate().to_string(),
        total_supply: ledger.total_supply().to_string(),
        reserves: node.vault.reserves().to_string(),
        holders: ledger.holder_count(),
        minters: ledger.minters(),
        remotes: node
            .pool
            .remotes()
            .map(|(chain_selector, pool)| RemoteResponse {
                chain_selector,
                pool,
            })
            .collect(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /holders/:address`: one holder's view at the current time.
async fn holder_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<HolderResponse>, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid address: {e}")))?;
    let node = state.node.read();
    let ledger = &node.ledger;
    Ok(Json(HolderResponse {
        address,
        balance: ledger.balance_of(&address)?.to_string(),
        principal: ledger.principal_balance_of(&address).to_string(),
        pending_interest: ledger.pending_interest(&address)?.to_string(),
        rate: ledger.user_rate(&address).to_string(),
        last_sync: ledger.last_sync_time(&address),
    }))
}

// ---------------------------------------------------------------------------
// Vault Handlers
// ---------------------------------------------------------------------------

async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<VaultRequest>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let amount = parse_amount("amount", &req.amount, false)?;
    let receipt = state.apply("deposit", |node| {
        let NodeState { ledger, vault, .. } = node;
        Ok(vault.deposit(ledger, &req.account, amount)?)
    })?;
    state.metrics.deposits_total.inc();
    let response = ReceiptResponse::from(&receipt);
    state.publish(NodeEvent::Receipt(receipt));
    Ok(Json(response))
}

async fn redeem_handler(
    State(state): State<AppState>,
    Json(req): Json<VaultRequest>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let amount = parse_amount("amount", &req.amount, true)?;
    let receipt = state.apply("redeem", |node| {
        let NodeState { ledger, vault, .. } = node;
        Ok(vault.redeem(ledger, &req.account, amount)?)
    })?;
    state.metrics.redeems_total.inc();
    let response = ReceiptResponse::from(&receipt);
    state.publish(NodeEvent::Receipt(receipt));
    Ok(Json(response))
}

async fn fund_rewards_handler(
    State(state): State<AppState>,
    Json(req): Json<FundRewardsRequest>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let amount = parse_amount("amount", &req.amount, false)?;
    let receipt = state.apply("fund_rewards", |node| {
        let now = node.ledger.now();
        Ok(node.vault.fund_rewards(&req.funder, amount, now)?)
    })?;
    let response = ReceiptResponse::from(&receipt);
    state.publish(NodeEvent::Receipt(receipt));
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// Ledger Handlers
// ---------------------------------------------------------------------------

async fn transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let amount = parse_amount("amount", &req.amount, true)?;
    let moved = state.apply("transfer", |node| {
        Ok(node.ledger.transfer(&req.from, &req.to, amount)?)
    })?;
    Ok(Json(TransferResponse {
        amount: moved.to_string(),
    }))
}

async fn global_rate_handler(
    State(state): State<AppState>,
    Json(req): Json<GlobalRateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rate = parse_amount("rate", &req.rate, false)?;
    state.apply("set_global_rate", |node| {
        Ok(node.ledger.set_global_rate(&req.caller, rate)?)
    })?;
    Ok(Json(serde_json::json!({ "global_rate": rate.to_string() })))
}

async fn grant_handler(
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.apply("grant_mint_burn", |node| {
        Ok(node.ledger.grant_mint_burn(&req.caller, &req.account)?)
    })?;
    Ok(Json(
        serde_json::json!({ "account": req.account, "capability": "mint_burn" }),
    ))
}

// ---------------------------------------------------------------------------
// Bridge Handlers
// ---------------------------------------------------------------------------

async fn bridge_send_handler(
    State(state): State<AppState>,
    Json(req): Json<BridgeSendRequest>,
) -> Result<Json<BridgeSendResponse>, ApiError> {
    let amount = parse_amount("amount", &req.amount, true)?;
    let (message, bytes) = state.apply("bridge_send", |node| {
        let NodeState { ledger, pool, .. } = node;
        let message = pool.send(ledger, &req.sender, &req.receiver, amount, req.dest_chain)?;
        let bytes = message.encode()?;
        Ok((message, bytes))
    })?;
    let message_id = message.message_id_hex()?;
    state.metrics.bridge_sent_total.inc();
    state.publish(NodeEvent::BridgeSent {
        message_id: message_id.clone(),
        dest_chain: message.dest_chain,
        nonce: message.nonce,
    });
    Ok(Json(BridgeSendResponse {
        message: hex::encode(&bytes),
        message_id,
        nonce: message.nonce,
        amount: message.amount.to_string(),
        rate: message.rate()?.to_string(),
    }))
}

async fn bridge_receive_handler(
    State(state): State<AppState>,
    Json(req): Json<BridgeReceiveRequest>,
) -> Result<Json<BridgeReceiveResponse>, ApiError> {
    let raw = req.message.trim();
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| ApiError::BadRequest(format!("message is not hex: {e}")))?;
    let message = state.apply("bridge_receive", |node| {
        let NodeState { ledger, pool, .. } = node;
        Ok(pool.receive(ledger, &bytes)?)
    })?;
    let message_id = message.message_id_hex()?;
    state.metrics.bridge_received_total.inc();
    state.publish(NodeEvent::BridgeReceived {
        message_id: message_id.clone(),
        source_chain: message.source_chain,
        nonce: message.nonce,
    });
    Ok(Json(BridgeReceiveResponse {
        message_id,
        source_chain: message.source_chain,
        receiver: message.receiver,
        amount: message.amount.to_string(),
        rate: message.rate()?.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`] frames. Client messages are
/// ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Forwards broadcast events until the client disconnects or the channel
/// closes.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

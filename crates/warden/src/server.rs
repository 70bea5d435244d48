//! HTTP endpoint of the gateway.
//!
//! `POST /` takes dapp calls, the `/api` routes serve the operator UI and require the session
//! token in the `X-Session-Token` header.

use crate::{
    api::DappApi,
    approval::{ApprovalQueue, ApprovalRequest, ApprovalResponse, SidebarRequest},
    config::WardenConfig,
    delegation::DelegationChecker,
    provider::{ChainClients, DelegationRepository},
    risk::BlockaidClient,
    session::Session,
    signer::Keyring,
    tx::TransactionService,
};
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{
        HeaderMap, Method, StatusCode,
        header::{CONTENT_TYPE, ORIGIN},
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::{io, net::IpAddr, sync::Arc};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::Url;
use warden_core::response::DappResponse;
use warden_rpc::request::RpcCall;

/// Body of every `/api` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Ok { data: T },
    Error { message: String },
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::Ok { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

/// Lock state change requested by the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub unlocked: bool,
}

#[derive(Clone, Debug)]
struct ServerState {
    api: DappApi,
    approvals: ApprovalQueue,
    session_token: Arc<String>,
}

fn build_router(state: ServerState) -> Router {
    let api = Router::new()
        .route("/approval/request", get(get_next_approval_request))
        .route("/approval/response", post(post_approval_response))
        .route("/session", get(get_session).post(post_session_update))
        .route("/sidebar", get(get_sidebar_request))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session_token))
        .with_state(state.clone());

    Router::new()
        .route("/", post(post_dapp_request).layer(dapp_cors()))
        .nest("/api", api)
        .with_state(state)
}

/// Lets any page call `POST /`. The origin is echoed back since it identifies the dapp.
fn dapp_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE])
}

async fn require_session_token(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let ok = req
        .headers()
        .get("X-Session-Token")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.session_token.as_str());
    if !ok {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

/// Reduces an `Origin` header to `scheme://host[:port]`, `None` for opaque origins.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let origin = Url::parse(raw).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

async fn post_dapp_request(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(call): Json<RpcCall>,
) -> Json<DappResponse> {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok()).and_then(normalize_origin);
    Json(state.api.handle_call(call, origin).await)
}

async fn get_next_approval_request(
    State(state): State<ServerState>,
) -> Json<ApiResponse<ApprovalRequest>> {
    match state.approvals.next_request() {
        Some(request) => Json(ApiResponse::ok(request)),
        None => Json(ApiResponse::error("No pending approval request")),
    }
}

async fn post_approval_response(
    State(state): State<ServerState>,
    Json(response): Json<ApprovalResponse>,
) -> Json<ApiResponse<()>> {
    match state.approvals.respond(response) {
        Ok(()) => Json(ApiResponse::ok(())),
        Err(err) => Json(ApiResponse::error(err.to_string())),
    }
}

async fn get_session(State(state): State<ServerState>) -> Json<ApiResponse<SessionUpdate>> {
    Json(ApiResponse::ok(SessionUpdate { unlocked: state.api.session().is_unlocked() }))
}

async fn post_session_update(
    State(state): State<ServerState>,
    Json(update): Json<SessionUpdate>,
) -> Json<ApiResponse<SessionUpdate>> {
    let session = state.api.session();
    if update.unlocked {
        session.unlock();
    } else {
        session.lock();
    }
    Json(ApiResponse::ok(SessionUpdate { unlocked: session.is_unlocked() }))
}

async fn get_sidebar_request(
    State(state): State<ServerState>,
) -> Json<ApiResponse<Option<SidebarRequest>>> {
    Json(ApiResponse::ok(state.approvals.take_sidebar_request()))
}

/// The gateway's HTTP server.
#[derive(Debug)]
pub struct WardenServer {
    host: IpAddr,
    port: u16,
    state: ServerState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<io::Result<()>>>,
}

impl WardenServer {
    /// Creates a server for `api` whose prompts are answered through `approvals`.
    ///
    /// A port of `0` binds a random port, see [`Self::port`].
    pub fn new(api: DappApi, approvals: ApprovalQueue, config: &WardenConfig) -> Self {
        let session_token = config
            .session_token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        Self {
            host: config.host,
            port: config.port,
            state: ServerState { api, approvals, session_token: Arc::new(session_token) },
            shutdown: None,
            handle: None,
        }
    }

    /// Wires every service from the config.
    pub fn from_config(
        config: &WardenConfig,
        keyring: Arc<dyn Keyring>,
        session: Session,
    ) -> eyre::Result<Self> {
        let clients = ChainClients::from_config(config)?;
        let repository: Arc<dyn DelegationRepository> = Arc::new(clients.clone());
        let tx = TransactionService::new(clients, keyring, DelegationChecker::new(repository));

        let approvals = ApprovalQueue::new(config.approval_timeout());
        let mut api = DappApi::new(tx, Arc::new(approvals.clone()), session)
            .with_block_malicious(config.block_malicious);
        if let Some(blockaid) = &config.blockaid {
            api = api.with_scanner(Arc::new(BlockaidClient::new(blockaid)?));
        } else {
            warn!(target: "server", "no risk scanner configured, requests are not scanned");
        }
        Ok(Self::new(api, approvals, config))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn session_token(&self) -> &str {
        &self.state.session_token
    }

    pub fn api(&self) -> &DappApi {
        &self.state.api
    }

    pub fn approvals(&self) -> &ApprovalQueue {
        &self.state.approvals
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Binds the listener and starts serving in the background.
    pub async fn start(&mut self) -> io::Result<()> {
        let listener = TcpListener::bind((self.host, self.port)).await?;
        self.port = listener.local_addr()?.port();

        let router = build_router(self.state.clone());
        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });
        self.shutdown = Some(shutdown);
        self.handle = Some(handle);

        info!(target: "server", host = %self.host, port = self.port, "warden listening");
        Ok(())
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn stop(&mut self) -> io::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.map_err(io::Error::other)??;
            debug!(target: "server", "warden stopped");
        }
        Ok(())
    }
}

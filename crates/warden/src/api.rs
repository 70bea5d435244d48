//! Dapp request handling.

use crate::{
    analytics::{Analytics, AnalyticsEvent, TracingAnalytics},
    approval::{ApprovalDecision, ApprovalRequest, WalletPrompt},
    error::{Result, WardenError},
    provider::ChainClient,
    risk::{RiskScanner, ScanVerdict},
    session::Session,
    store::{BatchRecord, BatchState, BatchStore, DappStore},
    tx::{TransactionService, prepare_and_sign_dapp_transaction},
};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, ChainId, TxKind, U64};
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use std::{fmt, iter, sync::Arc};
use warden_core::{
    calls::{
        AtomicCapability, AtomicStatus, CALLS_API_VERSION, CallBatchStatus, CallReceipt,
        CallsStatus, ChainCapabilities, GetCapabilitiesParams, MAX_CALLS_PER_BATCH,
        SendCallsParams, WalletCapabilities,
    },
    chain::{SupportedChain, is_supported, to_hex_chain_id},
    delegation::DelegationMode,
    request::{ChainChangeParams, DappRequest, DappRequestKind, DappRequestType, InvalidDappRequest},
    response::{DappResponse, DappResponseKind, Permission},
    scan::{ScanParams, build_blockaid_scan_json_rpc_request},
};
use warden_rpc::{
    error::{ErrorCode, RpcError},
    request::RpcCall,
};

/// Chain a dapp is on until it switches.
pub const DEFAULT_CHAIN: SupportedChain = SupportedChain::Mainnet;

/// Per-request state the handler works with.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Account the dapp is connected to.
    pub active_address: Option<Address>,
    /// Client bound to the dapp for the chain the request targets, absent if the dapp is not
    /// connected.
    pub chain_provider: Option<Arc<dyn ChainClient>>,
    pub dapp_url: Option<String>,
}

/// Answers dapp requests, one [`DappResponse`] per request.
#[derive(Clone)]
pub struct DappApi {
    tx: TransactionService,
    prompt: Arc<dyn WalletPrompt>,
    session: Session,
    dapps: DappStore,
    batches: BatchStore,
    scanner: Option<Arc<dyn RiskScanner>>,
    analytics: Arc<dyn Analytics>,
    block_malicious: bool,
}

impl fmt::Debug for DappApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DappApi")
            .field("tx", &self.tx)
            .field("session", &self.session)
            .field("scanner", &self.scanner.is_some())
            .field("block_malicious", &self.block_malicious)
            .finish_non_exhaustive()
    }
}

impl DappApi {
    pub fn new(tx: TransactionService, prompt: Arc<dyn WalletPrompt>, session: Session) -> Self {
        Self {
            tx,
            prompt,
            session,
            dapps: Default::default(),
            batches: Default::default(),
            scanner: None,
            analytics: Arc::new(TracingAnalytics),
            block_malicious: true,
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn RiskScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_block_malicious(mut self, block_malicious: bool) -> Self {
        self.block_malicious = block_malicious;
        self
    }

    pub fn dapps(&self) -> &DappStore {
        &self.dapps
    }

    pub fn batches(&self) -> &BatchStore {
        &self.batches
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Classifies and answers an untyped call from the page at `origin`.
    pub async fn handle_call(&self, call: RpcCall, origin: Option<String>) -> DappResponse {
        match DappRequest::from_call(call, origin) {
            Ok(request) => {
                let context = self.context_for(&request);
                self.handle(request, context).await
            }
            Err(InvalidDappRequest { request_id, error }) => {
                debug!(target: "api", %request_id, %error, "invalid dapp request");
                DappResponse::error(request_id, error)
            }
        }
    }

    /// Builds the context of `request` from the stored dapp state.
    ///
    /// A chain change is bound to the client of the requested chain, anything else to the dapp's
    /// current chain.
    pub fn context_for(&self, request: &DappRequest) -> RequestContext {
        let dapp_url = request.dapp_url.clone();
        let active_address = dapp_url.as_deref().and_then(|url| self.dapps.connected_account(url));
        let chain_id = match &request.kind {
            DappRequestKind::ChangeChain(params) => params.updated_chain_id(),
            _ => Some(self.dapp_chain(dapp_url.as_deref())),
        };
        let chain_provider = active_address
            .and(chain_id)
            .and_then(|chain_id| self.tx.clients().get(chain_id).cloned());
        RequestContext { active_address, chain_provider, dapp_url }
    }

    /// Answers a request. Never fails, errors become an `ErrorResponse` with the request's id.
    pub async fn handle(&self, request: DappRequest, context: RequestContext) -> DappResponse {
        let request_id = request.request_id.clone();
        let request_type = request.request_type();
        trace!(target: "api", %request_id, %request_type, dapp = ?context.dapp_url, "request");

        match self.execute(request, &context).await {
            Ok(kind) => DappResponse::new(request_id, kind),
            Err(err) => {
                if err.is_user_rejection() {
                    debug!(target: "api", %request_id, %request_type, %err, "request rejected");
                } else {
                    warn!(target: "api", %request_id, %request_type, %err, "request failed");
                }
                DappResponse::error(request_id, err.to_rpc_error())
            }
        }
    }

    async fn execute(
        &self,
        request: DappRequest,
        ctx: &RequestContext,
    ) -> Result<DappResponseKind> {
        let DappRequest { method, params, kind, .. } = request;
        match kind {
            DappRequestKind::ChangeChain(change) => self.change_chain(&change, ctx),
            DappRequestKind::SendTransaction(tx) => {
                let connection = self.connected(ctx)?;
                self.send_transaction(*tx, connection, &method, &params).await
            }
            DappRequestKind::SignTransaction(tx) => {
                let connection = self.connected(ctx)?;
                self.sign_transaction(*tx, connection, &method, &params).await
            }
            DappRequestKind::SignMessage(message, address) => {
                let connection = self.connected(ctx)?;
                self.sign_message(message, address, connection, &method, &params).await
            }
            DappRequestKind::SignTypedData(address, data) => {
                let connection = self.connected(ctx)?;
                self.sign_typed_data(address, &data, connection, &method, &params).await
            }
            DappRequestKind::SendCalls(calls) => {
                let connection = self.connected(ctx)?;
                self.send_calls(*calls, connection, &method, &params).await
            }
            DappRequestKind::GetCallsStatus(id) => {
                let (url, _) = self.connected(ctx)?;
                self.get_calls_status(&id, url).await
            }
            DappRequestKind::RequestAccount(()) => self.request_account(&params, ctx).await,
            DappRequestKind::GetPermissions(()) => self.get_permissions(ctx),
            DappRequestKind::RevokePermissions(()) => {
                let (url, _) = self.connected(ctx)?;
                self.revoke_permissions(url)
            }
            DappRequestKind::UniswapOpenSidebar(sidebar) => {
                let (url, _) = self.connected(ctx)?;
                let tab = sidebar.as_ref().and_then(|s| s.tab.as_deref());
                self.prompt.open_sidebar(url, tab).await;
                Ok(DappResponseKind::UniswapOpenSidebarResponse)
            }
            DappRequestKind::GetCapabilities(capabilities) => {
                let (_, account) = self.connected(ctx)?;
                self.get_capabilities(&capabilities, account)
            }
            DappRequestKind::GetAccounts(()) => {
                let accounts = ctx.active_address.into_iter().collect();
                Ok(DappResponseKind::GetAccountsResponse { accounts })
            }
            DappRequestKind::GetChainId(()) => {
                let chain_id = self.dapp_chain(ctx.dapp_url.as_deref());
                Ok(DappResponseKind::GetChainIdResponse { chain_id: to_hex_chain_id(chain_id) })
            }
        }
    }

    /// Switches the dapp to another chain.
    ///
    /// The checks run in a fixed order: an unknown chain is reported even if the dapp is not
    /// connected. State is only touched on success.
    fn change_chain(
        &self,
        params: &ChainChangeParams,
        ctx: &RequestContext,
    ) -> Result<DappResponseKind> {
        let Some(chain_id) = params.updated_chain_id() else {
            return Err(RpcError::with_message(
                ErrorCode::UnrecognizedChain,
                format!("Unrecognized chain ID {:?}", params.chain_id),
            )
            .into());
        };
        let Some(provider) = &ctx.chain_provider else {
            return Err(RpcError::unauthorized().into());
        };
        let Some(dapp_url) = &ctx.dapp_url else {
            return Err(RpcError::unauthorized().into());
        };

        self.dapps.save_dapp_chain(dapp_url, chain_id);
        self.analytics.track(AnalyticsEvent::ChainChanged { dapp_url: dapp_url.clone(), chain_id });
        debug!(target: "api", dapp = %dapp_url, chain_id, "dapp switched chain");
        Ok(DappResponseKind::ChainChangeResponse {
            provider_url: provider.url().to_string(),
            chain_id: to_hex_chain_id(chain_id),
        })
    }

    async fn send_transaction(
        &self,
        tx: TransactionRequest,
        connection: (&str, Address),
        method: &str,
        params: &serde_json::Value,
    ) -> Result<DappResponseKind> {
        let (url, account) = self.signer(connection, tx.from)?;
        let chain_id = self.dapp_chain(Some(url));
        let request_type = DappRequestType::SendTransaction;
        self.approve(url, request_type, account, chain_id, method, params).await?;

        let signed =
            prepare_and_sign_dapp_transaction(&self.tx, account, chain_id, tx, None).await?;
        let transaction_hash = self.tx.submit(&signed).await?;
        self.analytics.track(AnalyticsEvent::TransactionSubmitted {
            dapp_url: url.to_string(),
            chain_id,
            hash: transaction_hash,
        });
        Ok(DappResponseKind::SendTransactionResponse { transaction_hash })
    }

    async fn sign_transaction(
        &self,
        tx: TransactionRequest,
        connection: (&str, Address),
        method: &str,
        params: &serde_json::Value,
    ) -> Result<DappResponseKind> {
        let (url, account) = self.signer(connection, tx.from)?;
        let chain_id = self.dapp_chain(Some(url));
        let request_type = DappRequestType::SignTransaction;
        self.approve(url, request_type, account, chain_id, method, params).await?;

        let signed =
            prepare_and_sign_dapp_transaction(&self.tx, account, chain_id, tx, None).await?;
        Ok(DappResponseKind::SignTransactionResponse { signed_transaction: signed.raw })
    }

    async fn sign_message(
        &self,
        message: Bytes,
        address: Address,
        connection: (&str, Address),
        method: &str,
        params: &serde_json::Value,
    ) -> Result<DappResponseKind> {
        let (url, account) = self.signer(connection, Some(address))?;
        let chain_id = self.dapp_chain(Some(url));
        self.approve(url, DappRequestType::SignMessage, account, chain_id, method, params).await?;

        let signature = self.tx.keyring().sign_message(account, &message).await?;
        Ok(DappResponseKind::SignMessageResponse {
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        })
    }

    async fn sign_typed_data(
        &self,
        address: Address,
        data: &TypedData,
        connection: (&str, Address),
        method: &str,
        params: &serde_json::Value,
    ) -> Result<DappResponseKind> {
        let (url, account) = self.signer(connection, Some(address))?;
        let chain_id = self.dapp_chain(Some(url));
        if let Some(domain_chain) = data.domain.chain_id
            && domain_chain != alloy_primitives::U256::from(chain_id)
        {
            return Err(WardenError::ChainMismatch {
                expected: chain_id,
                got: domain_chain.saturating_to::<u64>(),
            });
        }
        self.approve(url, DappRequestType::SignTypedData, account, chain_id, method, params).await?;

        let signature = self.tx.keyring().sign_typed_data(account, data).await?;
        Ok(DappResponseKind::SignTypedDataResponse {
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        })
    }

    /// Sends an EIP-5792 call batch as sequential transactions.
    async fn send_calls(
        &self,
        calls: SendCallsParams,
        connection: (&str, Address),
        method: &str,
        params: &serde_json::Value,
    ) -> Result<DappResponseKind> {
        let (url, account) = self.signer(connection, calls.from)?;
        let chain_id = calls.chain_id();

        if !is_supported(chain_id) || self.tx.clients().get(chain_id).is_none() {
            return Err(RpcError::new(ErrorCode::UnsupportedChainId).into());
        }
        if let Some(id) = &calls.id
            && self.batches.contains(id)
        {
            return Err(RpcError::new(ErrorCode::DuplicateId).into());
        }
        if calls.calls.is_empty() {
            return Err(RpcError::invalid_params("batch contains no calls").into());
        }
        if calls.calls.len() > MAX_CALLS_PER_BATCH {
            return Err(RpcError::with_message(
                ErrorCode::BundleTooLarge,
                format!("at most {MAX_CALLS_PER_BATCH} calls per batch"),
            )
            .into());
        }
        if calls.atomic_required {
            return Err(RpcError::new(ErrorCode::AtomicityNotSupported).into());
        }
        if let Some(capability) = calls.required_capabilities().next() {
            return Err(RpcError::with_message(
                ErrorCode::UnsupportedNonOptionalCapability,
                format!("unsupported capability: {capability}"),
            )
            .into());
        }

        self.approve(url, DappRequestType::SendCalls, account, chain_id, method, params).await?;

        let id = calls.id.clone().unwrap_or_else(BatchStore::new_batch_id);
        self.batches
            .reserve(BatchRecord {
                id: id.clone(),
                chain_id,
                account,
                dapp_url: url.to_string(),
                transaction_hashes: Vec::with_capacity(calls.calls.len()),
                call_count: calls.calls.len(),
                state: BatchState::Submitting,
            })
            .map_err(|_| RpcError::new(ErrorCode::DuplicateId))?;

        let requests = calls
            .calls
            .into_iter()
            .map(|call| TransactionRequest {
                from: Some(account),
                to: Some(call.to.map_or(TxKind::Create, TxKind::Call)),
                value: call.value,
                input: TransactionInput::new(call.data.unwrap_or_default()),
                ..Default::default()
            })
            .collect();

        if let Err(err) = self.submit_batch(&id, url, account, chain_id, requests).await {
            self.batches.set_state(&id, BatchState::Failed);
            warn!(target: "api", %id, chain_id, %err, "call batch stopped");
            return Err(err);
        }
        self.batches.set_state(&id, BatchState::Submitted);
        debug!(target: "api", %id, chain_id, "call batch submitted");
        Ok(DappResponseKind::SendCallsResponse { id })
    }

    /// Signs and broadcasts the calls of batch `id` in order, stopping at the first failure.
    async fn submit_batch(
        &self,
        id: &str,
        url: &str,
        account: Address,
        chain_id: ChainId,
        requests: Vec<TransactionRequest>,
    ) -> Result<()> {
        let prepared =
            self.tx.prepare_batch(account, chain_id, requests, DelegationMode::Auto).await?;
        for prepared in prepared {
            let signed = self.tx.sign(prepared).await?;
            let hash = self.tx.submit(&signed).await?;
            self.batches.push_transaction(id, hash);
            self.analytics.track(AnalyticsEvent::TransactionSubmitted {
                dapp_url: url.to_string(),
                chain_id,
                hash,
            });
        }
        Ok(())
    }

    /// Reports a batch of the dapp at `url`.
    ///
    /// A batch still being broadcast is pending. Calls dropped after a failed broadcast count as
    /// reverted, so a batch that stopped before anything was sent is an offchain failure.
    async fn get_calls_status(&self, id: &str, url: &str) -> Result<DappResponseKind> {
        let record = self
            .batches
            .get(id)
            .filter(|record| record.dapp_url == url)
            .ok_or(RpcError::new(ErrorCode::UnknownBundleId))?;

        let client = self.tx.clients().require(record.chain_id)?;
        let mut receipts = Vec::with_capacity(record.transaction_hashes.len());
        for hash in &record.transaction_hashes {
            receipts.push(client.receipt(*hash).await?);
        }

        let status = match record.state {
            BatchState::Submitting => CallBatchStatus::Pending,
            BatchState::Failed if record.transaction_hashes.is_empty() => {
                CallBatchStatus::OffchainFailure
            }
            _ => CallBatchStatus::from_outcomes(
                receipts
                    .iter()
                    .map(|receipt| receipt.as_ref().map(CallReceipt::succeeded))
                    .chain(iter::repeat_n(Some(false), record.dropped_calls())),
            ),
        };
        let receipts: Vec<_> = receipts.into_iter().flatten().collect();

        Ok(DappResponseKind::GetCallsStatusResponse {
            status: CallsStatus {
                version: CALLS_API_VERSION.to_string(),
                id: record.id,
                chain_id: U64::from(record.chain_id),
                status,
                atomic: false,
                receipts: (!receipts.is_empty()).then_some(receipts),
            },
        })
    }

    async fn request_account(
        &self,
        params: &serde_json::Value,
        ctx: &RequestContext,
    ) -> Result<DappResponseKind> {
        let url = self.origin(ctx)?;
        let account = match ctx.active_address {
            Some(account) => account,
            None => {
                if !self.session.is_unlocked() {
                    return Err(WardenError::Locked);
                }
                let account = self
                    .tx
                    .keyring()
                    .accounts()
                    .first()
                    .copied()
                    .ok_or(WardenError::Rpc(RpcError::unauthorized()))?;
                let chain_id = self.dapp_chain(Some(url));
                let approval = ApprovalRequest::new(url, DappRequestType::RequestAccount)
                    .with_account(account, chain_id)
                    .with_payload(params.clone());
                self.confirm(approval).await?;

                self.dapps.save_dapp_connection(url, account, chain_id);
                self.analytics
                    .track(AnalyticsEvent::DappConnected { dapp_url: url.to_string(), account });
                debug!(target: "api", dapp = %url, %account, "dapp connected");
                account
            }
        };

        let chain_id = self.dapp_chain(Some(url));
        let provider_url = self.tx.clients().require(chain_id)?.url().to_string();
        Ok(DappResponseKind::AccountResponse {
            connected_address: account,
            chain_id: to_hex_chain_id(chain_id),
            provider_url,
        })
    }

    fn get_permissions(&self, ctx: &RequestContext) -> Result<DappResponseKind> {
        let url = self.origin(ctx)?;
        let permissions = self
            .dapps
            .get(url)
            .and_then(|info| {
                let account = info.connected_account?;
                Some(Permission::eth_accounts(url, account, info.connected_at.unwrap_or_default()))
            })
            .into_iter()
            .collect();
        Ok(DappResponseKind::GetPermissionsResponse { permissions })
    }

    fn revoke_permissions(&self, url: &str) -> Result<DappResponseKind> {
        if self.dapps.remove_dapp_connection(url) {
            self.analytics.track(AnalyticsEvent::DappDisconnected { dapp_url: url.to_string() });
            debug!(target: "api", dapp = %url, "dapp disconnected");
        }
        Ok(DappResponseKind::RevokePermissionsResponse)
    }

    /// Batches run sequentially, so every supported chain reports atomic execution as unsupported.
    fn get_capabilities(
        &self,
        params: &GetCapabilitiesParams,
        account: Address,
    ) -> Result<DappResponseKind> {
        if params.address != account {
            return Err(RpcError::unauthorized().into());
        }
        let chains: Vec<ChainId> = match &params.chain_ids {
            Some(ids) => ids
                .iter()
                .map(|id| id.saturating_to::<u64>())
                .filter(|id| is_supported(*id))
                .collect(),
            None => SupportedChain::ALL.iter().map(|chain| chain.id()).collect(),
        };
        let unsupported =
            ChainCapabilities { atomic: AtomicCapability { status: AtomicStatus::Unsupported } };
        let capabilities: WalletCapabilities =
            chains.into_iter().map(|id| (to_hex_chain_id(id), unsupported)).collect();
        Ok(DappResponseKind::GetCapabilitiesResponse { capabilities })
    }

    fn origin<'a>(&self, ctx: &'a RequestContext) -> Result<&'a str> {
        ctx.dapp_url.as_deref().ok_or(WardenError::MissingOrigin)
    }

    /// The dapp's url and connected account.
    fn connected<'a>(&self, ctx: &'a RequestContext) -> Result<(&'a str, Address)> {
        let url = self.origin(ctx)?;
        let account = ctx.active_address.ok_or_else(|| WardenError::NotConnected(url.to_string()))?;
        Ok((url, account))
    }

    /// Checks a connection for signing: the wallet must be unlocked and the sender must match.
    fn signer<'a>(
        &self,
        (url, account): (&'a str, Address),
        from: Option<Address>,
    ) -> Result<(&'a str, Address)> {
        if !self.session.is_unlocked() {
            return Err(WardenError::Locked);
        }
        if let Some(from) = from
            && from != account
        {
            return Err(WardenError::SenderMismatch { from, account });
        }
        Ok((url, account))
    }

    fn dapp_chain(&self, url: Option<&str>) -> ChainId {
        url.and_then(|url| self.dapps.get(url))
            .and_then(|info| info.last_chain_id)
            .unwrap_or(DEFAULT_CHAIN.id())
    }

    /// Scans the request and asks the user to approve it.
    async fn approve(
        &self,
        url: &str,
        request_type: DappRequestType,
        account: Address,
        chain_id: ChainId,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<()> {
        let verdict = self.scan(url, account, chain_id, method, params).await?;
        let approval = ApprovalRequest::new(url, request_type)
            .with_account(account, chain_id)
            .with_payload(params.clone())
            .with_verdict(verdict);
        self.confirm(approval).await
    }

    /// Runs the risk scan, if a scanner is configured.
    ///
    /// A malicious verdict fails the request when blocking is enabled, a failed scan is reported
    /// as [`ScanVerdict::Unavailable`].
    async fn scan(
        &self,
        url: &str,
        account: Address,
        chain_id: ChainId,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<Option<ScanVerdict>> {
        let Some(scanner) = &self.scanner else { return Ok(None) };
        let request = build_blockaid_scan_json_rpc_request(ScanParams {
            chain_id,
            account,
            method,
            params,
            dapp_url: url,
        });
        let verdict = match scanner.scan(&request).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(target: "api", %err, method, "risk scan failed");
                ScanVerdict::Unavailable
            }
        };
        if let ScanVerdict::Malicious { reason } = &verdict
            && self.block_malicious
        {
            self.analytics.track(AnalyticsEvent::RequestBlocked {
                dapp_url: url.to_string(),
                method: method.to_string(),
            });
            return Err(WardenError::Blocked(reason.clone()));
        }
        Ok(Some(verdict))
    }

    async fn confirm(&self, approval: ApprovalRequest) -> Result<()> {
        match self.prompt.confirm(approval).await {
            ApprovalDecision::Approved => Ok(()),
            ApprovalDecision::Rejected => Err(WardenError::Rejected),
        }
    }
}

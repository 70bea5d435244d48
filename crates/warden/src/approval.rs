//! User approval of dapp requests.

use crate::risk::ScanVerdict;
use alloy_primitives::{Address, ChainId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::sync::oneshot;
use uuid::Uuid;
use warden_core::request::DappRequestType;

/// A prompt shown to the wallet user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub dapp_url: String,
    pub request_type: DappRequestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
    /// The params as sent by the dapp.
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ScanVerdict>,
}

impl ApprovalRequest {
    pub fn new(dapp_url: impl Into<String>, request_type: DappRequestType) -> Self {
        Self {
            id: Uuid::new_v4(),
            dapp_url: dapp_url.into(),
            request_type,
            account: None,
            chain_id: None,
            payload: serde_json::Value::Null,
            verdict: None,
        }
    }

    pub fn with_account(mut self, account: Address, chain_id: ChainId) -> Self {
        self.account = Some(account);
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_verdict(mut self, verdict: Option<ScanVerdict>) -> Self {
        self.verdict = verdict;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// The user's answer to an [`ApprovalRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub approved: bool,
}

/// Where prompts are shown.
#[async_trait::async_trait]
pub trait WalletPrompt: Send + Sync {
    /// Asks the user to approve a request. Never fails, anything but approval is a rejection.
    async fn confirm(&self, request: ApprovalRequest) -> ApprovalDecision;

    /// Opens the wallet sidebar for a dapp, optionally on a given tab.
    async fn open_sidebar(&self, dapp_url: &str, tab: Option<&str>);
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown approval id")]
pub struct UnknownApproval;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<ApprovalRequest>,
    waiters: HashMap<Uuid, oneshot::Sender<ApprovalDecision>>,
    sidebar: Option<SidebarRequest>,
}

/// A sidebar open request of a dapp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarRequest {
    pub dapp_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
}

/// Prompts queued for an operator UI that polls them over HTTP.
///
/// Prompts are answered by id, a prompt without answer after `timeout` counts as rejected.
#[derive(Clone, Debug)]
pub struct ApprovalQueue {
    state: Arc<Mutex<QueueState>>,
    timeout: Duration,
}

impl ApprovalQueue {
    pub fn new(timeout: Duration) -> Self {
        Self { state: Default::default(), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The oldest unanswered prompt.
    pub fn next_request(&self) -> Option<ApprovalRequest> {
        self.state.lock().pending.front().cloned()
    }

    pub fn has_request(&self, id: &Uuid) -> bool {
        self.state.lock().waiters.contains_key(id)
    }

    /// Answers a pending prompt.
    pub fn respond(&self, response: ApprovalResponse) -> Result<(), UnknownApproval> {
        let waiter = {
            let mut state = self.state.lock();
            let waiter = state.waiters.remove(&response.id).ok_or(UnknownApproval)?;
            state.pending.retain(|req| req.id != response.id);
            waiter
        };
        let decision =
            if response.approved { ApprovalDecision::Approved } else { ApprovalDecision::Rejected };
        // the requester may have timed out in the meantime
        let _ = waiter.send(decision);
        Ok(())
    }

    /// Takes the last sidebar request, if any.
    pub fn take_sidebar_request(&self) -> Option<SidebarRequest> {
        self.state.lock().sidebar.take()
    }

    fn remove(&self, id: &Uuid) {
        let mut state = self.state.lock();
        state.waiters.remove(id);
        state.pending.retain(|req| req.id != *id);
    }
}

#[async_trait::async_trait]
impl WalletPrompt for ApprovalQueue {
    async fn confirm(&self, request: ApprovalRequest) -> ApprovalDecision {
        let id = request.id;
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.waiters.insert(id, tx);
            state.pending.push_back(request);
        }
        trace!(target: "approval", %id, "queued approval request");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => ApprovalDecision::Rejected,
            Err(_) => {
                debug!(target: "approval", %id, "approval request timed out");
                self.remove(&id);
                ApprovalDecision::Rejected
            }
        }
    }

    async fn open_sidebar(&self, dapp_url: &str, tab: Option<&str>) {
        self.state.lock().sidebar =
            Some(SidebarRequest { dapp_url: dapp_url.to_string(), tab: tab.map(str::to_string) });
    }
}

/// Answers every prompt the same way and remembers what was asked.
#[derive(Clone, Debug)]
pub struct AutoApprove {
    decision: ApprovalDecision,
    prompts: Arc<Mutex<Vec<ApprovalRequest>>>,
    sidebars: Arc<Mutex<Vec<SidebarRequest>>>,
}

impl AutoApprove {
    pub fn approving() -> Self {
        Self::new(ApprovalDecision::Approved)
    }

    pub fn rejecting() -> Self {
        Self::new(ApprovalDecision::Rejected)
    }

    fn new(decision: ApprovalDecision) -> Self {
        Self { decision, prompts: Default::default(), sidebars: Default::default() }
    }

    pub fn prompts(&self) -> Vec<ApprovalRequest> {
        self.prompts.lock().clone()
    }

    pub fn sidebars(&self) -> Vec<SidebarRequest> {
        self.sidebars.lock().clone()
    }
}

#[async_trait::async_trait]
impl WalletPrompt for AutoApprove {
    async fn confirm(&self, request: ApprovalRequest) -> ApprovalDecision {
        self.prompts.lock().push(request);
        self.decision
    }

    async fn open_sidebar(&self, dapp_url: &str, tab: Option<&str>) {
        self.sidebars
            .lock()
            .push(SidebarRequest { dapp_url: dapp_url.to_string(), tab: tab.map(str::to_string) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "https://app.example.com";

    #[tokio::test]
    async fn answered_by_id() {
        let queue = ApprovalQueue::new(Duration::from_secs(5));
        assert!(queue.next_request().is_none());

        let request = ApprovalRequest::new(APP, DappRequestType::SignMessage);
        let id = request.id;
        let prompt = queue.clone();
        let handle = tokio::spawn(async move { prompt.confirm(request).await });
        tokio::task::yield_now().await;

        let pending = loop {
            if let Some(pending) = queue.next_request() {
                break pending;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(pending.id, id);
        assert!(queue.has_request(&id));

        queue.respond(ApprovalResponse { id, approved: true }).unwrap();
        assert_eq!(handle.await.unwrap(), ApprovalDecision::Approved);
        assert!(queue.next_request().is_none());
        assert!(queue.respond(ApprovalResponse { id, approved: true }).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_prompts_time_out() {
        let queue = ApprovalQueue::new(Duration::from_secs(30));
        let decision = queue.confirm(ApprovalRequest::new(APP, DappRequestType::SendTransaction)).await;
        assert_eq!(decision, ApprovalDecision::Rejected);
        assert!(queue.next_request().is_none());
    }

    #[tokio::test]
    async fn sidebar_requests() {
        let queue = ApprovalQueue::new(Duration::from_secs(1));
        queue.open_sidebar(APP, Some("swap")).await;
        let sidebar = queue.take_sidebar_request().unwrap();
        assert_eq!(sidebar.tab.as_deref(), Some("swap"));
        assert!(queue.take_sidebar_request().is_none());
    }
}

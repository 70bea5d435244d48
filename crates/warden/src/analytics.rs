//! Product events emitted by the pipeline.

use alloy_primitives::{Address, ChainId, TxHash};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalyticsEvent {
    ChainChanged { dapp_url: String, chain_id: ChainId },
    DappConnected { dapp_url: String, account: Address },
    DappDisconnected { dapp_url: String },
    TransactionSubmitted { dapp_url: String, chain_id: ChainId, hash: TxHash },
    RequestBlocked { dapp_url: String, method: String },
}

/// Sink of [`AnalyticsEvent`]s.
pub trait Analytics: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
}

/// Emits events as `analytics` tracing records.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        info!(target: "analytics", ?event, "analytics event");
    }
}

/// Keeps every event in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingAnalytics {
    events: Arc<Mutex<Vec<AnalyticsEvent>>>,
}

impl RecordingAnalytics {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().clone()
    }
}

impl Analytics for RecordingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        self.events.lock().push(event);
    }
}

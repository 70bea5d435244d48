//! # warden
//!
//! A dapp-facing wallet gateway: classifies requests coming from in-page providers, checks
//! connection and lock state, screens them with a risk scanner, asks the user for approval and
//! signs or broadcasts with the wallet's keys.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

pub mod analytics;
pub mod api;
pub mod approval;
pub mod config;
pub mod connect;
pub mod delegation;
pub mod error;
mod opts;
pub mod provider;
pub mod risk;
pub mod server;
pub mod session;
pub mod signer;
pub mod store;
pub mod tx;

pub use api::{DappApi, RequestContext};
pub use config::WardenConfig;
pub use connect::{ConnectParams, ConnectResult, ConnectionService, PlatformConnector};
pub use error::{TransactionFlowError, WardenError};
pub use opts::{Warden, run};
pub use server::WardenServer;
pub use session::Session;
pub use tx::{TransactionService, prepare_and_sign_dapp_transaction};

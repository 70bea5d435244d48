//! # warden-core
//!
//! Core types of the dapp request pipeline: the chain registry, the typed request and response
//! unions exchanged with in-page providers, and the pure transforms the services build on.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod calls;
pub mod chain;
pub mod connector;
pub mod delegation;
pub mod request;
pub mod response;
pub mod scan;

/// custom serde helpers for dapp params
pub mod serde_helpers;

pub use chain::{SupportedChain, to_hex_chain_id};
pub use request::{DappRequest, DappRequestKind, DappRequestType};
pub use response::{DappResponse, DappResponseKind};

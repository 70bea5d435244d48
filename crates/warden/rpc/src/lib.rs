//! # warden-rpc
//!
//! Wire-level types shared by the dapp request boundary: the untyped call envelope and the
//! provider error contract.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// JSON-RPC and provider error codes
pub mod error;

/// Untyped request envelope
pub mod request;

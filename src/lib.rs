//! # SxT
//!
//! Identity and capability SDK for the Space and Time gateway.
//!
//! This package re-exports [`sxt_sdk`]. It turns a long-lived Ed25519 keypair
//! into short-lived bearer tokens through the gateway's challenge-response
//! protocol, keeps those tokens fresh, and mints biscuit capability tokens
//! that grant specific SQL operations on specific tables.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sxt::{Gateway, MemoryCredentialStore, Method, Operation};
//!
//! # async fn example() -> Result<(), sxt::SdkError> {
//! let gateway = Gateway::builder()
//!     .base_url("https://api.spaceandtime.app/v1")
//!     .user_id("alice")
//!     .join_code("JOIN-1234")
//!     .store(Arc::new(MemoryCredentialStore::new()))
//!     .build()?;
//!
//! // Keep the session alive in the background until the handle is cancelled
//! let keep_alive = gateway.start_refresh();
//!
//! let capability = gateway.mint_batch(&["eth.blocks"], &[Operation::Select])?;
//! let request = gateway
//!     .authorized_request(Method::POST, "sql/dql", capability.first(), Some("my-app"))
//!     .await?;
//! # let _ = request;
//!
//! keep_alive.cancel().await;
//! gateway.logout().await?;
//! # Ok(())
//! # }
//! ```

pub use sxt_sdk::*;

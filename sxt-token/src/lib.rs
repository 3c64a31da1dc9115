//! # SxT Token
//!
//! Key management and capability tokens for the Space and Time gateway.
//!
//! This crate has no networking dependencies. It provides:
//!
//! - Ed25519 identity keys with base64/hex encodings and the 32-byte seed ⇄
//!   64-byte combined key conversions
//! - Resource identifier validation (`SCHEMA.TABLE`)
//! - Capability token minting: biscuit tokens carrying
//!   `sxt:capability(operation, resource)` facts, including the wildcard form
//! - Local verification of capability tokens with the matching public key
//!
//! ## Usage
//!
//! ```no_run
//! use sxt_token::{mint_wildcard, verify_capability, KeyPair, Operation};
//!
//! fn main() -> Result<(), sxt_token::TokenError> {
//!     let keys = KeyPair::generate();
//!     let token = mint_wildcard("eth.blocks", &keys.seed_hex())?;
//!
//!     verify_capability(
//!         token.as_str(),
//!         keys.biscuit_public_key()?,
//!         Operation::Select,
//!         "eth.blocks",
//!     )?;
//!     Ok(())
//! }
//! ```

mod error;
mod keys;
mod mint;
mod resource;
mod utils;
mod verify;

pub use error::TokenError;
pub use keys::{
    biscuit_public_key, combined_to_seed, seed_to_combined, KeyPair, COMBINED_LENGTH,
    PUBLIC_KEY_LENGTH, SEED_LENGTH, SIGNATURE_HEX_LENGTH,
};
pub use mint::{mint, mint_batch, mint_wildcard, CapabilityToken, CapabilityTokenBuilder};
pub use resource::{Capability, CommandType, Operation, ResourceId, DEFAULT_SCHEMA};
pub use utils::{decode_base64, decode_hex, encode_base64, encode_hex, is_hex};
pub use verify::{granted_capabilities, parse_token, verify_capability};

// Re-export biscuit types that are needed for public API
pub use biscuit_auth::{Biscuit, PublicKey};

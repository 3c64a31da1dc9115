//! Ed25519 identity keys and their encodings.
//!
//! The gateway stores and transports the 32-byte seed, while some signing
//! call sites want the 64-byte `seed ‖ public_key` form. Both are derived from
//! the same [`KeyPair`], so `combined()[..32] == seed()` always holds.

extern crate biscuit_auth as biscuit;

use std::fmt;

use biscuit::Algorithm as Alg;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::TokenError;
use crate::utils::{decode_base64, decode_base64_exact, decode_hex, encode_base64, is_hex};

pub const SEED_LENGTH: usize = 32;
pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const COMBINED_LENGTH: usize = SEED_LENGTH + PUBLIC_KEY_LENGTH;
/// Hex length of a detached Ed25519 signature
pub const SIGNATURE_HEX_LENGTH: usize = 128;

/// An Ed25519 identity keypair.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the operating system CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair from its 32-byte seed. The public key is derived.
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build a keypair from a 64-byte `seed ‖ public_key` buffer.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Crypto` if the public half does not belong to the seed.
    pub fn from_combined(combined: &[u8; COMBINED_LENGTH]) -> Result<Self, TokenError> {
        let signing_key = SigningKey::from_keypair_bytes(combined)
            .map_err(|e| TokenError::crypto(format!("combined key mismatch: {}", e)))?;
        Ok(Self { signing_key })
    }

    /// Load a keypair from its base64 transport form.
    ///
    /// `private_key` may be the 32-byte seed or the 64-byte combined form.
    /// The public key must match the one derived from the seed.
    pub fn from_base64(private_key: &str, public_key: &str) -> Result<Self, TokenError> {
        let private_bytes = decode_base64(private_key)
            .map_err(|e| TokenError::format(format!("private key is not valid base64: {}", e)))?;
        let keypair = Self::from_private_bytes(&private_bytes)?;

        let public: [u8; PUBLIC_KEY_LENGTH] = decode_base64_exact(public_key, "public key")?;
        if public != keypair.public_key() {
            return Err(TokenError::crypto(
                "public key does not match the private key seed",
            ));
        }
        Ok(keypair)
    }

    /// Parse a signing key given as hex or base64, either the seed or the
    /// combined form. Hex is tried first since every hex string is also
    /// valid base64 alphabet.
    pub fn from_signing_key_str(key: &str) -> Result<Self, TokenError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(TokenError::validation("signing key is empty"));
        }

        let bytes = if is_hex(key) {
            decode_hex(key)?
        } else {
            decode_base64(key).map_err(|_| {
                TokenError::validation("signing key must be hex or base64 encoded")
            })?
        };

        Self::from_private_bytes(&bytes).map_err(|e| match e {
            TokenError::Format(msg) => TokenError::Validation(msg),
            other => other,
        })
    }

    fn from_private_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        match bytes.len() {
            SEED_LENGTH => {
                let mut seed = [0u8; SEED_LENGTH];
                seed.copy_from_slice(bytes);
                Ok(Self::from_seed(&seed))
            }
            COMBINED_LENGTH => {
                let mut combined = [0u8; COMBINED_LENGTH];
                combined.copy_from_slice(bytes);
                Self::from_combined(&combined)
            }
            n => Err(TokenError::format(format!(
                "private key must be {} or {} bytes, got {}",
                SEED_LENGTH, COMBINED_LENGTH, n
            ))),
        }
    }

    pub fn seed(&self) -> [u8; SEED_LENGTH] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The 64-byte `seed ‖ public_key` form.
    pub fn combined(&self) -> [u8; COMBINED_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn seed_base64(&self) -> String {
        encode_base64(&self.seed())
    }

    pub fn public_key_base64(&self) -> String {
        encode_base64(&self.public_key())
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a message. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), TokenError> {
        self.signing_key
            .verifying_key()
            .verify(message, signature)
            .map_err(|e| TokenError::crypto(format!("signature verification failed: {}", e)))
    }

    /// The same key as a biscuit root keypair, for signing capability tokens.
    pub fn to_biscuit_keypair(&self) -> Result<biscuit::KeyPair, TokenError> {
        let private = biscuit::PrivateKey::from_bytes(&self.seed(), Alg::Ed25519)
            .map_err(|e| TokenError::crypto(e.to_string()))?;
        Ok(biscuit::KeyPair::from(&private))
    }

    /// The public key in biscuit form, for verifying capability tokens.
    pub fn biscuit_public_key(&self) -> Result<biscuit::PublicKey, TokenError> {
        biscuit_public_key(&self.public_key())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.seed() == other.seed()
    }
}

impl Eq for KeyPair {}

/// Parse a raw 32-byte Ed25519 public key into a biscuit public key.
pub fn biscuit_public_key(public_key: &[u8]) -> Result<biscuit::PublicKey, TokenError> {
    biscuit::PublicKey::from_bytes(public_key, Alg::Ed25519)
        .map_err(|e| TokenError::crypto(e.to_string()))
}

/// Concatenate a base64 seed and base64 public key into the 64-byte form.
///
/// # Errors
///
/// Returns `TokenError::Format` if either input is not base64 or does not
/// decode to exactly 32 bytes.
pub fn seed_to_combined(seed: &str, public_key: &str) -> Result<[u8; COMBINED_LENGTH], TokenError> {
    let seed: [u8; SEED_LENGTH] = decode_base64_exact(seed, "seed")?;
    let public: [u8; PUBLIC_KEY_LENGTH] = decode_base64_exact(public_key, "public key")?;

    let mut combined = [0u8; COMBINED_LENGTH];
    combined[..SEED_LENGTH].copy_from_slice(&seed);
    combined[SEED_LENGTH..].copy_from_slice(&public);
    Ok(combined)
}

/// Truncate a 64-byte combined private key to its 32-byte seed.
pub fn combined_to_seed(combined: &[u8]) -> Result<[u8; SEED_LENGTH], TokenError> {
    if combined.len() != COMBINED_LENGTH {
        return Err(TokenError::format(format!(
            "combined key must be {} bytes, got {}",
            COMBINED_LENGTH,
            combined.len()
        )));
    }
    let mut seed = [0u8; SEED_LENGTH];
    seed.copy_from_slice(&combined[..SEED_LENGTH]);
    Ok(seed)
}

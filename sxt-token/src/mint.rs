extern crate biscuit_auth as biscuit;

use std::collections::HashMap;
use std::fmt;

use biscuit::macros::fact;
use biscuit::Biscuit;
use tracing::{debug, info};

use crate::error::TokenError;
use crate::keys::KeyPair;
use crate::resource::{Capability, Operation, ResourceId};

/// A signed, base64-encoded biscuit carrying `sxt:capability` facts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityToken(String);

impl CapabilityToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CapabilityToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builder for capability tokens.
///
/// Every capability becomes one `sxt:capability(operation, resource)` fact in
/// the authority block, in insertion order, so the same inputs and key always
/// produce the same facts.
///
/// # Example
/// ```rust
/// use sxt_token::{Capability, CapabilityTokenBuilder, KeyPair, Operation};
///
/// let keys = KeyPair::generate();
/// let token = CapabilityTokenBuilder::new()
///     .capability(Capability::new(Operation::Select, "eth.blocks").unwrap())
///     .capability(Capability::new(Operation::Insert, "eth.blocks").unwrap())
///     .issue(&keys)
///     .expect("Failed to mint token");
/// assert!(!token.as_str().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapabilityTokenBuilder {
    capabilities: Vec<Capability>,
}

impl CapabilityTokenBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one capability fact.
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Append several capability facts, keeping their order.
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Grant every operation on `resource`.
    pub fn wildcard(self, resource: ResourceId) -> Self {
        self.capability(Capability {
            operation: Operation::Wildcard,
            resource,
        })
    }

    /// Builds and signs the token.
    ///
    /// # Errors
    ///
    /// `TokenError::Validation` if no capability was added or a wildcard and
    /// an explicit operation target the same resource.
    pub fn issue(self, keys: &KeyPair) -> Result<CapabilityToken, TokenError> {
        if self.capabilities.is_empty() {
            return Err(TokenError::validation(
                "at least one capability is required",
            ));
        }
        check_wildcard_exclusive(&self.capabilities)?;

        let mut biscuit_builder = Biscuit::builder();
        for capability in &self.capabilities {
            let operation = capability.operation.as_str();
            let resource = capability.resource.to_string();
            biscuit_builder = biscuit_builder.fact(fact!(
                r#"sxt:capability({operation}, {resource})"#
            ))?;
        }

        let biscuit = biscuit_builder.build(&keys.to_biscuit_keypair()?)?;
        debug!("biscuit (authority): {}", biscuit);

        Ok(CapabilityToken(biscuit.to_base64()?))
    }
}

// A wildcard fact next to explicit facts for the same resource makes the
// grant ambiguous, so it is rejected. `BLOCKS` and `PUBLIC.BLOCKS` are the
// same resource.
fn check_wildcard_exclusive(capabilities: &[Capability]) -> Result<(), TokenError> {
    let mut seen: HashMap<String, (bool, bool)> = HashMap::new();
    for capability in capabilities {
        let entry = seen.entry(capability.resource.qualified()).or_default();
        if capability.operation.is_wildcard() {
            entry.0 = true;
        } else {
            entry.1 = true;
        }
        if entry.0 && entry.1 {
            return Err(TokenError::validation(format!(
                "wildcard and explicit capabilities cannot be mixed for {}",
                capability.resource
            )));
        }
    }
    Ok(())
}

/// Mint one token carrying every capability in `capabilities`.
///
/// `signing_key` is the hex or base64 encoded private key (seed or combined form).
pub fn mint(capabilities: &[Capability], signing_key: &str) -> Result<CapabilityToken, TokenError> {
    let keys = KeyPair::from_signing_key_str(signing_key)?;
    let token = CapabilityTokenBuilder::new()
        .capabilities(capabilities.iter().cloned())
        .issue(&keys)?;
    info!(facts = capabilities.len(), "minted capability token");
    Ok(token)
}

/// Mint a token granting every operation on `resource`.
///
/// The token holds exactly one fact, `sxt:capability("*", resource)`.
pub fn mint_wildcard(resource: &str, signing_key: &str) -> Result<CapabilityToken, TokenError> {
    let resource = ResourceId::parse(resource)?;
    let keys = KeyPair::from_signing_key_str(signing_key)?;
    let token = CapabilityTokenBuilder::new()
        .wildcard(resource.clone())
        .issue(&keys)?;
    info!(%resource, "minted wildcard capability token");
    Ok(token)
}

/// Mint one independent token per resource, each carrying `operations × {resource}`.
pub fn mint_batch<S: AsRef<str>>(
    resources: &[S],
    operations: &[Operation],
    signing_key: &str,
) -> Result<Vec<CapabilityToken>, TokenError> {
    if resources.is_empty() {
        return Err(TokenError::validation("at least one resource is required"));
    }
    if operations.is_empty() {
        return Err(TokenError::validation("at least one operation is required"));
    }
    let keys = KeyPair::from_signing_key_str(signing_key)?;

    resources
        .iter()
        .map(|resource| {
            let resource = ResourceId::parse(resource.as_ref())?;
            let capabilities = operations.iter().map(|operation| Capability {
                operation: *operation,
                resource: resource.clone(),
            });
            CapabilityTokenBuilder::new()
                .capabilities(capabilities)
                .issue(&keys)
        })
        .collect()
}

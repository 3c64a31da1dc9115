extern crate biscuit_auth as biscuit;

use biscuit::macros::{authorizer, rule};
use biscuit::{Biscuit, PublicKey};

use crate::error::TokenError;
use crate::resource::{Capability, Operation, ResourceId, DEFAULT_SCHEMA};

/// Parse a base64 capability token and check its signature against `public_key`.
pub fn parse_token(token: &str, public_key: PublicKey) -> Result<Biscuit, TokenError> {
    Ok(Biscuit::from_base64(token, public_key)?)
}

/// Lists the capability facts carried by a token's authority block.
///
/// The order of the returned capabilities is unspecified.
///
/// # Errors
///
/// Returns an error if the token is malformed, signed by another key, or
/// carries a fact that is not a valid `(operation, resource)` pair.
pub fn granted_capabilities(
    token: &str,
    public_key: PublicKey,
) -> Result<Vec<Capability>, TokenError> {
    let biscuit = parse_token(token, public_key)?;

    let mut authorizer = authorizer!(r#"allow if true;"#).build(&biscuit)?;
    let facts: Vec<(String, String)> = authorizer.query(rule!(
        r#"granted($op, $res) <- sxt:capability($op, $res)"#
    ))?;

    facts
        .into_iter()
        .map(|(operation, resource)| {
            let operation = Operation::parse(&operation).map_err(|_| {
                TokenError::verification(format!("unknown operation in token: {}", operation))
            })?;
            Ok(Capability {
                operation,
                resource: ResourceId::parse(&resource)?,
            })
        })
        .collect()
}

/// Verifies locally that a capability token authorizes `operation` on `resource`.
///
/// Either an explicit `sxt:capability(operation, resource)` fact or a wildcard
/// fact for the resource grants access. Facts naming a `PUBLIC` table with or
/// without its schema both match.
pub fn verify_capability(
    token: &str,
    public_key: PublicKey,
    operation: Operation,
    resource: &str,
) -> Result<(), TokenError> {
    let resource = ResourceId::parse(resource)?;
    let biscuit = parse_token(token, public_key)?;

    let denied = TokenError::verification(format!(
        "token does not grant {} on {}",
        operation,
        resource.qualified()
    ));
    let operation = operation.as_str();
    let qualified = resource.qualified();
    let short = if resource.schema() == DEFAULT_SCHEMA {
        resource.table().to_string()
    } else {
        resource.qualified()
    };

    let authz = authorizer!(
        r#"
            operation({operation});
            resource({qualified});
            resource({short});
            allow if operation($op), resource($res), sxt:capability($op, $res);
            allow if resource($res), sxt:capability("*", $res);
        "#
    );
    if authz.build(&biscuit)?.authorize().is_ok() {
        Ok(())
    } else {
        Err(denied)
    }
}

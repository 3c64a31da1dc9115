use std::fmt;
use std::str::FromStr;

use crate::error::TokenError;

pub const DEFAULT_SCHEMA: &str = "PUBLIC";
const INVALID_RESOURCE_ID: &str = "Invalid resourceId";

/// A `SCHEMA.TABLE` resource identifier, upper-cased.
///
/// Unqualified names resolve to the `PUBLIC` schema. The identifier keeps the
/// form it was given in (`TABLE` stays `TABLE`) so that capability facts match
/// the resourceId the gateway receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    schema: Option<String>,
    table: String,
}

impl ResourceId {
    /// Parse and normalize a resource identifier.
    ///
    /// Each part must match `^[A-Z_][A-Z0-9_]+$` after upper-casing and there
    /// can be at most one dot.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        let upper = input.trim().to_uppercase();
        let parts: Vec<&str> = upper.split('.').collect();

        let (schema, table) = match parts.as_slice() {
            [table] => (None, *table),
            [schema, table] => (Some(*schema), *table),
            _ => {
                return Err(TokenError::format(format!(
                    "{}: provided table identifier format is invalid",
                    INVALID_RESOURCE_ID
                )))
            }
        };

        if !is_valid_identifier(schema.unwrap_or(DEFAULT_SCHEMA)) || !is_valid_identifier(table) {
            return Err(TokenError::format(format!(
                "{}: either schema or table identifier is invalid",
                INVALID_RESOURCE_ID
            )));
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }

    /// The schema, `PUBLIC` when the identifier was unqualified.
    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_qualified(&self) -> bool {
        self.schema.is_some()
    }

    /// Fully qualified `SCHEMA.TABLE` form.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema(), self.table)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => f.write_str(&self.table),
        }
    }
}

impl FromStr for ResourceId {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ^[A-Z_][A-Z0-9_]+$
fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// SQL command class an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Ddl,
    Dml,
    Dql,
}

/// A capability operation: one SQL operation, or every operation (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Alter,
    Drop,
    Insert,
    Update,
    Merge,
    Delete,
    Select,
    Wildcard,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Create,
        Operation::Alter,
        Operation::Drop,
        Operation::Insert,
        Operation::Update,
        Operation::Merge,
        Operation::Delete,
        Operation::Select,
    ];

    /// The identifier used for this operation inside capability facts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "ddl_create",
            Operation::Alter => "ddl_alter",
            Operation::Drop => "ddl_drop",
            Operation::Insert => "dml_insert",
            Operation::Update => "dml_update",
            Operation::Merge => "dml_merge",
            Operation::Delete => "dml_delete",
            Operation::Select => "dql_select",
            Operation::Wildcard => "*",
        }
    }

    /// Parse a fact identifier (`ddl_create`) or a keyword (`CREATE`, `select`, `*`).
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        let op = match s.trim().to_lowercase().as_str() {
            "ddl_create" | "create" => Operation::Create,
            "ddl_alter" | "alter" => Operation::Alter,
            "ddl_drop" | "drop" => Operation::Drop,
            "dml_insert" | "insert" => Operation::Insert,
            "dml_update" | "update" => Operation::Update,
            "dml_merge" | "merge" => Operation::Merge,
            "dml_delete" | "delete" => Operation::Delete,
            "dql_select" | "select" => Operation::Select,
            "*" => Operation::Wildcard,
            other => {
                return Err(TokenError::validation(format!(
                    "unknown operation: {}",
                    other
                )))
            }
        };
        Ok(op)
    }

    /// `None` for the wildcard, which spans every class.
    pub fn command_type(&self) -> Option<CommandType> {
        match self {
            Operation::Create | Operation::Alter | Operation::Drop => Some(CommandType::Ddl),
            Operation::Insert | Operation::Update | Operation::Merge | Operation::Delete => {
                Some(CommandType::Dml)
            }
            Operation::Select => Some(CommandType::Dql),
            Operation::Wildcard => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Operation::Wildcard)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One `(operation, resource)` fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
    pub operation: Operation,
    pub resource: ResourceId,
}

impl Capability {
    /// Validate and normalize the resource identifier.
    pub fn new(operation: Operation, resource: &str) -> Result<Self, TokenError> {
        Ok(Self {
            operation,
            resource: ResourceId::parse(resource)?,
        })
    }

    pub fn wildcard(resource: &str) -> Result<Self, TokenError> {
        Self::new(Operation::Wildcard, resource)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sxt:capability({}, {})", self.operation, self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_upper_cased() {
        let id = ResourceId::parse("eth.testeth12").unwrap();
        assert_eq!(id.to_string(), "ETH.TESTETH12");
        assert_eq!(id.schema(), "ETH");
        assert_eq!(id.table(), "TESTETH12");
        assert!(id.is_qualified());
    }

    #[test]
    fn test_unqualified_identifier_defaults_to_public() {
        let id = ResourceId::parse("blocks").unwrap();
        assert_eq!(id.to_string(), "BLOCKS");
        assert_eq!(id.schema(), DEFAULT_SCHEMA);
        assert_eq!(id.qualified(), "PUBLIC.BLOCKS");
        assert!(!id.is_qualified());
    }

    #[test]
    fn test_invalid_identifiers() {
        for bad in ["3bad!", "", "a.b.c", "eth.", ".block", "X", "eth.9block", "my-table"] {
            let err = ResourceId::parse(bad).unwrap_err();
            match err {
                TokenError::Format(msg) => assert!(msg.starts_with("Invalid resourceId"), "{msg}"),
                other => panic!("expected format error for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_underscore_identifiers() {
        assert!(ResourceId::parse("_private._t1").is_ok());
        assert!(ResourceId::parse("sxt_schema.table_2024").is_ok());
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Create.as_str(), "ddl_create");
        assert_eq!(Operation::Select.as_str(), "dql_select");
        assert_eq!(Operation::Wildcard.as_str(), "*");
        assert_eq!(Operation::parse("SELECT").unwrap(), Operation::Select);
        assert_eq!(Operation::parse("dml_merge").unwrap(), Operation::Merge);
        assert_eq!(Operation::parse("*").unwrap(), Operation::Wildcard);
        assert!(Operation::parse("truncate").is_err());

        for op in Operation::ALL {
            assert_eq!(Operation::parse(op.as_str()).unwrap(), op);
        }
    }

    #[test]
    fn test_command_types() {
        assert_eq!(Operation::Drop.command_type(), Some(CommandType::Ddl));
        assert_eq!(Operation::Delete.command_type(), Some(CommandType::Dml));
        assert_eq!(Operation::Select.command_type(), Some(CommandType::Dql));
        assert_eq!(Operation::Wildcard.command_type(), None);
    }

    #[test]
    fn test_capability_display() {
        let cap = Capability::new(Operation::Insert, "eth.block").unwrap();
        assert_eq!(cap.to_string(), "sxt:capability(dml_insert, ETH.BLOCK)");
    }
}

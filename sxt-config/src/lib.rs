//! # SxT Config
//!
//! Configuration for the Space and Time gateway SDK.
//!
//! All settings live in one explicit [`GatewayConfig`], built once through
//! [`GatewayConfigBuilder`] or loaded from a JSON/TOML file or from a set of
//! prefixed environment variables. Loaders read exactly the fields they are
//! given; there is no fallback from one source to another.
//!
//! ```
//! use sxt_config::{GatewayConfig, SignatureScheme};
//!
//! let config = GatewayConfig::builder()
//!     .base_url("https://api.spaceandtime.app/v1")
//!     .user_id("alice")
//!     .join_code("JOIN-1234")
//!     .scheme(SignatureScheme::Ed25519)
//!     .build()
//!     .expect("valid configuration");
//! assert_eq!(config.refresh_interval().as_secs(), 25 * 60);
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default interval of the background keep-alive refresh
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 25 * 60;

/// Signature scheme presented to the gateway when exchanging a signed auth code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    #[default]
    Ed25519,
}

impl SignatureScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ed25519" => Ok(SignatureScheme::Ed25519),
            other => Err(ConfigError::ParseError(format!(
                "Unsupported signature scheme: {}",
                other
            ))),
        }
    }
}

/// Errors that can occur when working with gateway configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Base URL is required but was not provided")]
    MissingBaseUrl,

    #[error("Invalid base URL '{0}': it must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("User ID is required but was not provided")]
    MissingUserId,

    #[error("Public and private key must be provided together")]
    IncompleteKeypair,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("I/O error occurred while reading configuration: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Failed to parse configuration data: {0}")]
    ParseError(String),

    #[error("Environment variable error: {0}")]
    EnvVarError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

/// Configuration for a gateway client
///
/// `public_key` and `private_key` are the base64 encoded Ed25519 public key
/// and 32-byte seed of a pre-provisioned identity. When both are absent the
/// SDK generates a fresh keypair.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub user_id: String,
    #[serde(default)]
    pub join_code: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub scheme: SignatureScheme,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("join_code", &self.join_code)
            .field("prefix", &self.prefix)
            .field("scheme", &self.scheme)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_id: user_id.into(),
            join_code: None,
            prefix: None,
            scheme: SignatureScheme::default(),
            public_key: None,
            private_key: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }

    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> GatewayConfigBuilder {
        GatewayConfigBuilder::from_config(self)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// The pre-provisioned `(private_key, public_key)` pair, if any.
    pub fn keypair(&self) -> Option<(&str, &str)> {
        match (&self.private_key, &self.public_key) {
            (Some(private), Some(public)) => Some((private.as_str(), public.as_str())),
            _ => None,
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::MissingUserId);
        }
        if matches!(&self.join_code, Some(code) if code.is_empty()) {
            return Err(ConfigError::InvalidValue("join code is empty".to_string()));
        }
        if matches!(&self.prefix, Some(prefix) if prefix.is_empty()) {
            return Err(ConfigError::InvalidValue("prefix is empty".to_string()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "refresh interval must be greater than zero".to_string(),
            ));
        }

        match (&self.private_key, &self.public_key) {
            (None, None) => {}
            (Some(private), Some(public)) => {
                validate_key("private key", private, &[32, 64])?;
                validate_key("public key", public, &[32])?;
            }
            _ => return Err(ConfigError::IncompleteKeypair),
        }

        Ok(())
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: GatewayConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from environment variables
    ///
    /// With the prefix `SXT` the variables are:
    /// - `SXT_BASE_URL` (required)
    /// - `SXT_USER_ID` (required)
    /// - `SXT_JOIN_CODE`
    /// - `SXT_AUTH_PREFIX`
    /// - `SXT_SCHEME` (defaults to `ed25519`)
    /// - `SXT_PUBLIC_KEY` and `SXT_PRIVATE_KEY` (base64, both or neither)
    /// - `SXT_REFRESH_INTERVAL` (seconds)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let base_url = required_var(prefix, "BASE_URL")?;
        let user_id = required_var(prefix, "USER_ID")?;

        let scheme = match optional_var(prefix, "SCHEME")? {
            Some(scheme) => scheme.parse()?,
            None => SignatureScheme::default(),
        };

        let refresh_interval_secs = match optional_var(prefix, "REFRESH_INTERVAL")? {
            Some(secs) => secs.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("refresh interval '{}' is not a number", secs))
            })?,
            None => DEFAULT_REFRESH_INTERVAL_SECS,
        };

        let config = GatewayConfig {
            base_url,
            user_id,
            join_code: optional_var(prefix, "JOIN_CODE")?,
            prefix: optional_var(prefix, "AUTH_PREFIX")?,
            scheme,
            public_key: optional_var(prefix, "PUBLIC_KEY")?,
            private_key: optional_var(prefix, "PRIVATE_KEY")?,
            refresh_interval_secs,
        };

        config.validate()?;
        Ok(config)
    }

    /// `~/.sxt`, the directory holding the default config and session files
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".sxt"))
            .ok_or_else(|| ConfigError::InvalidValue("could not determine home directory".into()))
    }

    /// `~/.sxt/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load `~/.sxt/config.toml`
    #[cfg(feature = "toml")]
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::from_toml(Self::default_config_path()?)
    }
}

fn validate_key(what: &str, encoded: &str, lengths: &[usize]) -> Result<(), ConfigError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ConfigError::InvalidKey(format!("{} is not valid base64: {}", what, e)))?;
    if !lengths.contains(&bytes.len()) {
        return Err(ConfigError::InvalidKey(format!(
            "{} has {} bytes, expected one of {:?}",
            what,
            bytes.len(),
            lengths
        )));
    }
    Ok(())
}

fn required_var(prefix: &str, name: &str) -> Result<String, ConfigError> {
    let key = format!("{}_{}", prefix, name);
    env::var(&key).map_err(|e| ConfigError::EnvVarError(format!("{}: {}", key, e)))
}

fn optional_var(prefix: &str, name: &str) -> Result<Option<String>, ConfigError> {
    let key = format!("{}_{}", prefix, name);
    match env::var(&key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVarError(format!("{}: {}", key, e))),
    }
}

/// Builder for GatewayConfig
#[derive(Default, Debug)]
pub struct GatewayConfigBuilder {
    base_url: Option<String>,
    user_id: Option<String>,
    join_code: Option<String>,
    prefix: Option<String>,
    scheme: Option<SignatureScheme>,
    public_key: Option<String>,
    private_key: Option<String>,
    refresh_interval_secs: Option<u64>,
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            base_url: Some(config.base_url.clone()),
            user_id: Some(config.user_id.clone()),
            join_code: config.join_code.clone(),
            prefix: config.prefix.clone(),
            scheme: Some(config.scheme),
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
            refresh_interval_secs: Some(config.refresh_interval_secs),
        }
    }

    /// Set the gateway base URL, e.g. `https://api.spaceandtime.app/v1`
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn join_code(mut self, join_code: impl Into<String>) -> Self {
        self.join_code = Some(join_code.into());
        self
    }

    /// Set the prefix sent along with the auth code request
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Use a pre-provisioned identity (base64 seed and base64 public key)
    pub fn keypair(mut self, private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self.public_key = Some(public_key.into());
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_secs = Some(interval.as_secs());
        self
    }

    /// Build the GatewayConfig
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is missing or invalid
    pub fn build(self) -> Result<GatewayConfig, ConfigError> {
        let config = GatewayConfig {
            base_url: self.base_url.ok_or(ConfigError::MissingBaseUrl)?,
            user_id: self.user_id.ok_or(ConfigError::MissingUserId)?,
            join_code: self.join_code,
            prefix: self.prefix,
            scheme: self.scheme.unwrap_or_default(),
            public_key: self.public_key,
            private_key: self.private_key,
            refresh_interval_secs: self
                .refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
    const PUBLIC_B64: &str = "O2onvM62pC1io6jQKm8Nc2UyFXcd4kOmOsBIoYtZ2ik=";

    #[test]
    fn test_builder_defaults() {
        let config = GatewayConfig::builder()
            .base_url("https://api.example.com/v1/")
            .user_id("alice")
            .build()
            .unwrap();

        assert_eq!(config.base_url(), "https://api.example.com/v1");
        assert_eq!(config.scheme, SignatureScheme::Ed25519);
        assert_eq!(config.refresh_interval(), Duration::from_secs(1500));
        assert!(config.keypair().is_none());
    }

    #[test]
    fn test_builder_missing_fields() {
        assert!(matches!(
            GatewayConfig::builder().user_id("alice").build(),
            Err(ConfigError::MissingBaseUrl)
        ));
        assert!(matches!(
            GatewayConfig::builder().base_url("https://x.io").build(),
            Err(ConfigError::MissingUserId)
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = GatewayConfig::new("ftp://x.io", "alice");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))));

        config.base_url = "https://x.io".to_string();
        assert!(config.validate().is_ok());

        config.public_key = Some(PUBLIC_B64.to_string());
        assert!(matches!(config.validate(), Err(ConfigError::IncompleteKeypair)));

        config.private_key = Some("not base64!".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKey(_))));

        config.private_key = Some(SEED_B64.to_string());
        assert!(config.validate().is_ok());

        config.join_code = Some(String::new());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_to_builder_round_trip() {
        let config = GatewayConfig::builder()
            .base_url("https://x.io")
            .user_id("alice")
            .join_code("JOIN")
            .prefix("pfx")
            .keypair(SEED_B64, PUBLIC_B64)
            .refresh_interval(Duration::from_secs(60))
            .build()
            .unwrap();

        let copy = config.to_builder().build().unwrap();
        assert_eq!(config, copy);
        assert_eq!(copy.keypair(), Some((SEED_B64, PUBLIC_B64)));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = GatewayConfig::builder()
            .base_url("https://x.io")
            .user_id("alice")
            .keypair(SEED_B64, PUBLIC_B64)
            .build()
            .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains(SEED_B64));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "base_url": "https://json.example.com/v1",
                "user_id": "json-user",
                "join_code": "J1",
                "scheme": "ed25519"
            }"#,
        )
        .unwrap();

        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config.user_id, "json-user");
        assert_eq!(config.join_code.as_deref(), Some("J1"));
        assert_eq!(config.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
                base_url = "https://toml.example.com/v1"
                user_id = "toml-user"
                refresh_interval_secs = 600
            "#,
        )
        .unwrap();

        let config = GatewayConfig::from_toml(&path).unwrap();
        assert_eq!(config.user_id, "toml-user");
        assert_eq!(config.refresh_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_from_env() {
        env::set_var("SXTCFGTEST_BASE_URL", "https://env.example.com/v1");
        env::set_var("SXTCFGTEST_USER_ID", "env-user");
        env::set_var("SXTCFGTEST_JOIN_CODE", "ENVJOIN");
        env::set_var("SXTCFGTEST_REFRESH_INTERVAL", "90");

        let config = GatewayConfig::from_env("SXTCFGTEST").unwrap();
        assert_eq!(config.base_url, "https://env.example.com/v1");
        assert_eq!(config.user_id, "env-user");
        assert_eq!(config.join_code.as_deref(), Some("ENVJOIN"));
        assert_eq!(config.prefix, None);
        assert_eq!(config.refresh_interval_secs, 90);

        assert!(matches!(
            GatewayConfig::from_env("SXTCFGMISSING"),
            Err(ConfigError::EnvVarError(_))
        ));
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("ED25519".parse::<SignatureScheme>().unwrap(), SignatureScheme::Ed25519);
        assert!("secp256k1".parse::<SignatureScheme>().is_err());
        assert_eq!(SignatureScheme::Ed25519.to_string(), "ed25519");
    }
}

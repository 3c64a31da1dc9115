use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sxt::{
    ConfigError, CredentialStore, FileCredentialStore, Gateway, GatewayConfig, KeyPair,
    SignatureScheme,
};

#[test]
fn test_toml_config_with_provisioned_keys() {
    let keys = KeyPair::generate();
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
base_url = "https://api.spaceandtime.app/v1"
user_id = "alice"
join_code = "JOIN-1234"
scheme = "ed25519"
private_key = "{}"
public_key = "{}"
refresh_interval_secs = 900
"#,
            keys.seed_base64(),
            keys.public_key_base64()
        ),
    )
    .unwrap();

    let config = GatewayConfig::from_toml(&config_path).unwrap();
    assert_eq!(config.scheme, SignatureScheme::Ed25519);
    assert_eq!(config.refresh_interval(), Duration::from_secs(900));

    let store = FileCredentialStore::new(dir.path().join("session.txt"));
    let gateway = Gateway::with_store(config, Arc::new(store)).unwrap();
    assert_eq!(gateway.identity().keys, keys);
}

#[test]
fn test_invalid_config_files() {
    let dir = tempdir().unwrap();

    let missing_user = dir.path().join("missing_user.json");
    fs::write(&missing_user, r#"{"base_url": "https://x.io", "user_id": ""}"#).unwrap();
    assert!(matches!(
        GatewayConfig::from_file(&missing_user),
        Err(ConfigError::MissingUserId)
    ));

    let half_keypair = dir.path().join("half.json");
    fs::write(
        &half_keypair,
        r#"{"base_url": "https://x.io", "user_id": "alice", "public_key": "AAAA"}"#,
    )
    .unwrap();
    assert!(matches!(
        GatewayConfig::from_file(&half_keypair),
        Err(ConfigError::IncompleteKeypair)
    ));

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "not json").unwrap();
    assert!(matches!(
        GatewayConfig::from_file(&garbage),
        Err(ConfigError::ParseError(_))
    ));
}

#[tokio::test]
async fn test_session_survives_restart_through_file_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authCode": "code-9"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-9",
            "refreshToken": "refresh-9",
            "accessTokenExpires": 1800,
            "refreshTokenExpires": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session_path = dir.path().join("session.txt");
    let config = GatewayConfig::new(server.uri(), "alice");

    let first = Gateway::with_store(
        config.clone(),
        Arc::new(FileCredentialStore::new(&session_path)),
    )
    .unwrap();
    assert_eq!(first.access_token().await.unwrap(), "access-9");

    let persisted = fs::read_to_string(&session_path).unwrap();
    assert_eq!(
        persisted.lines().collect::<Vec<_>>(),
        vec!["access-9", "refresh-9", "1800", "7200"]
    );

    // a new process picks the session up without authenticating again
    let second = Gateway::with_store(config, Arc::new(FileCredentialStore::new(&session_path)))
        .unwrap();
    assert!(second.restore().await.unwrap());
    assert_eq!(second.access_token().await.unwrap(), "access-9");

    let store = FileCredentialStore::new(&session_path);
    assert!(store.load().unwrap().is_some());
}

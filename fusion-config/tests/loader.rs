use std::fs;
use std::time::Duration;

use fusion_config::{ConfigLoadError, ConfigLoader, EnvConfig};
use fusion_core::auth::BackendStrategy;
use tempfile::TempDir;

const DIGEST: &str = "$argon2id$v=19$m=65536,t=3,p=4$20W54XzvJwLt5nS5XzE5Iw$1LX+eQRy+QtlmdMb62xrvu72dDZ0JaG6QnCqLsFGZ1Y";

fn base_toml() -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = 9100

[session]
ttl = "30m"
cookie_name = "sid"
secure_cookie = true

[auth]
seal_key = "test"
groups = ["TEST", "OPS"]

[auth.backend]
strategy = "basic"

[[auth.backend.users]]
username = "test"
digest = "{DIGEST}"
groups = ["TEST"]

[[auth.clients]]
name = "collector"
key_digest = "{key}"
groups = ["OPS"]

[info]
api = "test"
version = "x.y.z"

[resources.case]
required_groups = ["TEST"]

[resources.notes]
auth_required = false
"#,
        key = "ab".repeat(32)
    )
}

fn loader() -> ConfigLoader {
    ConfigLoader::new().with_env(EnvConfig::default())
}

fn load(contents: &str) -> Result<fusion_config::ConfigLoad, ConfigLoadError> {
    loader().load_str(contents)
}

fn invalid_path(contents: &str) -> String {
    match load(contents) {
        Err(ConfigLoadError::Invalid { path, .. }) => path,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn loads_a_complete_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fusion.toml");
    fs::write(&path, base_toml()).unwrap();

    let load = loader().with_config_path(&path).load().unwrap();
    let config = load.config;

    assert_eq!(config.bind_address(), "127.0.0.1:9100");
    assert_eq!(config.session.ttl, Duration::from_secs(30 * 60));
    assert_eq!(config.session.cookie_name, "sid");
    assert!(config.session.secure_cookie);
    assert_eq!(config.auth.backend.strategy, BackendStrategy::Basic);
    assert_eq!(config.auth.backend.users.len(), 1);
    assert_eq!(config.auth.clients[0].name, "collector");
    assert_eq!(config.info.api, "test");
    assert_eq!(config.info.version, "x.y.z");
    assert!(!config.info.access.auth_required);
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));

    let case = config.resource("case");
    assert!(case.auth_required);
    assert!(case.required_groups.contains("TEST"));
    assert!(!config.resource("notes").auth_required);
    // Unlisted resources default to authenticated access.
    assert!(config.resource("other").auth_required);

    // No redis and a short seal key both warn.
    assert_eq!(load.warnings.len(), 2);
}

#[test]
fn environment_overrides_the_file() {
    let env = EnvConfig {
        server_port: Some(9200),
        redis_url: Some("redis://cache:6379".to_string()),
        seal_key: Some("k".repeat(40)),
        ..EnvConfig::default()
    };
    let load = ConfigLoader::new()
        .with_env(env)
        .load_str(&base_toml())
        .unwrap();

    assert_eq!(load.config.server.port, 9200);
    assert_eq!(load.config.server.host, "127.0.0.1");
    assert_eq!(load.config.redis.unwrap().url, "redis://cache:6379");
    assert_eq!(load.config.auth.seal_key.as_str(), "k".repeat(40));
    assert!(load.warnings.is_empty());
}

#[test]
fn unknown_strategy_is_rejected() {
    let toml = base_toml().replace(r#"strategy = "basic""#, r#"strategy = "ldap""#);
    let err = load(&toml).unwrap_err();
    assert_eq!(err.key_path(), Some("auth.backend.strategy"));
    assert!(err.to_string().contains("unknown strategy `ldap`"));
}

#[test]
fn malformed_digest_is_rejected_with_its_index() {
    let toml = base_toml().replace(DIGEST, "not-a-digest");
    let err = load(&toml).unwrap_err();
    assert_eq!(err.key_path(), Some("auth.backend.users[0].digest"));
    assert!(err.to_string().starts_with("auth.backend.users[0].digest: invalid format"));
}

#[test]
fn empty_seal_key_is_rejected() {
    let toml = base_toml().replace(r#"seal_key = "test""#, r#"seal_key = """#);
    assert_eq!(invalid_path(&toml), "auth.seal_key");

    let toml = base_toml().replace(r#"seal_key = "test""#, "");
    assert_eq!(invalid_path(&toml), "auth.seal_key");
}

#[test]
fn unknown_groups_are_rejected_everywhere() {
    let toml = base_toml().replace(r#"groups = ["TEST"]"#, r#"groups = ["ADMIN"]"#);
    assert_eq!(invalid_path(&toml), "auth.backend.users[0].groups[0]");

    let toml = base_toml().replace(r#"groups = ["OPS"]"#, r#"groups = ["NOPE"]"#);
    assert_eq!(invalid_path(&toml), "auth.clients[0].groups[0]");

    let toml = base_toml().replace(
        r#"required_groups = ["TEST"]"#,
        r#"required_groups = ["GHOST"]"#,
    );
    assert_eq!(invalid_path(&toml), "resources.case.required_groups[0]");
}

#[test]
fn bad_client_digest_is_rejected() {
    let toml = base_toml().replace(&"ab".repeat(32), "xyz");
    assert_eq!(invalid_path(&toml), "auth.clients[0].key_digest");
}

#[test]
fn bad_durations_are_rejected() {
    let toml = base_toml().replace(r#"ttl = "30m""#, r#"ttl = "eventually""#);
    assert_eq!(invalid_path(&toml), "session.ttl");
}

#[test]
fn session_ttl_beyond_the_limit_is_rejected() {
    let toml = base_toml().replace(r#"ttl = "30m""#, r#"ttl = "1000000years""#);
    match load(&toml) {
        Err(ConfigLoadError::Invalid { path, reason }) => {
            assert_eq!(path, "session.ttl");
            assert!(reason.contains("session ttl"), "{reason}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }

    let toml = base_toml().replace(r#"ttl = "30m""#, r#"ttl = "366days""#);
    assert!(load(&toml).is_ok());
}

#[test]
fn a_backend_without_users_is_rejected() {
    let toml = format!(
        "[auth]\nseal_key = \"{}\"\ngroups = [\"TEST\"]\n",
        "k".repeat(40)
    );
    assert_eq!(invalid_path(&toml), "auth.backend.users");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = loader()
        .with_config_path(dir.path().join("absent.toml"))
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn syntax_errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fusion.toml");
    fs::write(&path, "[server\nport = ").unwrap();

    let err = loader().with_config_path(&path).load().unwrap_err();
    match err {
        ConfigLoadError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other:?}"),
    }
}

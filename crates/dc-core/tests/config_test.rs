use dc_core::config::{ConfigError, DecreeConfig};
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_minimal_config_with_defaults() {
    let file = write_config(
        r#"
[github]
owner = "acme"
repo = "widgets"
"#,
    );

    let cfg = DecreeConfig::load_from(file.path()).expect("load");
    assert_eq!(cfg.github.owner, "acme");
    assert_eq!(cfg.github.repo, "widgets");
    assert_eq!(cfg.github.default_branch, "main");
    assert_eq!(cfg.sync.poll_interval_secs, 30);
    assert_eq!(cfg.sync.spec_dir, "specs");
}

#[test]
fn rejects_missing_owner() {
    let file = write_config(
        r#"
[github]
owner = ""
repo = "widgets"
"#,
    );

    match DecreeConfig::load_from(file.path()) {
        Err(ConfigError::Invalid(msg)) => assert!(msg.contains("owner")),
        other => panic!("expected invalid config, got {:?}", other),
    }
}

#[test]
fn rejects_zero_poll_interval() {
    let file = write_config(
        r#"
[github]
owner = "acme"
repo = "widgets"

[sync]
poll_interval_secs = 0
"#,
    );

    assert!(matches!(
        DecreeConfig::load_from(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn token_is_never_serialized() {
    let mut cfg = DecreeConfig::default();
    cfg.github.owner = "acme".to_string();
    cfg.github.repo = "widgets".to_string();
    cfg.github.token = Some("ghp_secret".to_string());

    let toml = toml::to_string(&cfg).expect("serialize");
    assert!(!toml.contains("ghp_secret"));
    assert!(!toml.contains("token"));
}

#[test]
fn parse_error_surfaces_as_parse_variant() {
    let file = write_config("this is not toml [");
    assert!(matches!(
        DecreeConfig::load_from(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

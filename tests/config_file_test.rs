//! Configuration loading from files on disk

use std::io::Write;

use teleburn::config::{Config, ConfigError};
use teleburn::tx_builder::{FeeTier, RetireMethod};

#[test]
fn example_config_matches_defaults() {
    let parsed = Config::from_toml(include_str!("../config.example.toml")).unwrap();
    assert_eq!(parsed, Config::default());
    parsed.validate().unwrap();
}

#[test]
fn load_reads_and_validates_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[rpc.endpoints]]
url = "https://rpc.example.org"
provider = "example"

[fees]
default_tier = "high"

[retire]
method = "burn"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.rpc.endpoints.len(), 1);
    assert_eq!(config.rpc.endpoints[0].provider, "example");
    assert_eq!(config.fees.default_tier, FeeTier::High);
    assert_eq!(config.retire.method, RetireMethod::Burn);
    assert_eq!(config.content, Config::default().content);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.fees, Config::default().fees);
    assert_eq!(config.derivation, Config::default().derivation);
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[content]
cache_ttl_secs = 0
"#
    )
    .unwrap();

    assert!(matches!(
        Config::load(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn unreadable_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::from_file(dir.path()),
        Err(ConfigError::Io { .. })
    ));
}

//! Loading configuration files from disk.

use std::io::Write;

use sluice_config::prelude::*;
use sluice_core::error::ErrorKind;
use sluice_core::types::Tier;

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[tiers]
fast_secs = 1
medium_secs = 10

[data_quality]
min_quality = 0.5
"#
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.tiers.cadence(Tier::Fast).as_secs(), 1);
    assert_eq!(config.tiers.cadence(Tier::Slow).as_secs(), 600);
    assert!((config.data_quality.min_quality - 0.5).abs() < 1e-12);
    assert!(config.is_valid());
}

#[test]
fn test_missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_invalid_tranches_rejected_at_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[pool.tranches]]
id = "senior"
seniority_rank = 1
attachment = 0.5
detachment = 0.4
"#
    )
    .unwrap();
    let err = EngineConfig::from_file(file.path()).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.subject().starts_with("pool.tranches"));
}

#![cfg(not(feature = "loom-tests"))]

mod common;

use common::{init_logging, session};
use std::io::{ErrorKind, Write};
use std::sync::Arc;
use styrene_trust::{
    BoundaryManager, CreationParams, ManagerConfig, NullListener, Session, TrustError,
};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_limits_from_file() {
    let file = write_config(
        r#"
max_participants_per_boundary = 2
max_waiting_per_boundary = 8
"#,
    );
    let config = ManagerConfig::from_path(file.path()).expect("load config");
    assert_eq!(config.max_participants_per_boundary, 2);
    assert_eq!(config.max_waiting_per_boundary, 8);
    let defaults = ManagerConfig::default();
    assert_eq!(config.max_boundaries_per_helper, defaults.max_boundaries_per_helper);
}

#[test]
fn malformed_file_is_invalid_data() {
    let file = write_config("max_participants_per_boundary = \"lots\"\n");
    let err = ManagerConfig::from_path(file.path()).expect_err("bad value");
    assert_eq!(err.kind(), ErrorKind::InvalidData);

    let file = write_config("max_sessions = 3\n");
    let err = ManagerConfig::from_path(file.path()).expect_err("unknown key");
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = ManagerConfig::from_path(dir.path().join("trust.toml")).expect_err("no file");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn loaded_limits_govern_the_manager() {
    init_logging();
    let file = write_config("max_participants_per_boundary = 1\nmax_boundaries_per_helper = 1\n");
    let config = ManagerConfig::from_path(file.path()).expect("load config");
    let manager = BoundaryManager::with_config(config, Arc::new(NullListener));

    let helper = session(100, "helper");
    let none: Vec<Arc<dyn Session>> = Vec::new();
    let boundary = manager.start_for(&helper, CreationParams::trust(1), &none).expect("start");
    let err = manager
        .start_for(&helper, CreationParams::trust(2), &none)
        .expect_err("second boundary");
    assert_eq!(
        err,
        TrustError::LimitExceeded { limit: "max_boundaries_per_helper", max: 1 }
    );

    let first = session(10, "first");
    let second = session(11, "second");
    assert!(manager.add_participant(&boundary, &first).expect("first"));
    let err = manager.add_participant(&boundary, &second).expect_err("over limit");
    assert!(matches!(err, TrustError::LimitExceeded { max: 1, .. }));
}

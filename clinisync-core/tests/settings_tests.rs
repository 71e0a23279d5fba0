//! Settings error-message, atomic-write-safety, and init integration tests.
//! Storage: ~/.clinisync/settings.yaml

use assert_fs::prelude::*;
use clinisync_core::{
    settings::{self, DEFAULT_PERIOD_LABEL_TEMPLATE},
    PatientMatch, SettingsError,
};
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_settings_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = settings::load_file_at(home.path()).unwrap_err();
    assert!(matches!(err, SettingsError::SettingsNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("settings.yaml"));
    assert!(err.to_string().contains("clinisync init"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".clinisync/settings.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = settings::load_file_at(home.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("settings.yaml"));
}

#[rstest]
#[case("layout:\n  header_row: \"seven\"\n")]
#[case("sync:\n  cutoff_date: 2023-13-40\n")]
#[case("layout:\n  patient_match: by_phone\n")]
fn load_wrong_typed_values_returns_parse_error(#[case] yaml: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".clinisync/settings.yaml")
        .write_str(yaml)
        .expect("write");

    let err = settings::load_file_at(home.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    settings::save_at(home.path(), &Default::default()).expect("save");

    home.child(".clinisync/settings.yaml")
        .assert(predicate::path::exists());
    home.child(".clinisync/settings.yaml.tmp")
        .assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn saved_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    settings::save_at(home.path(), &Default::default()).expect("save");
    let path = settings::settings_path_at(home.path());
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let created = settings::init_at(home.path()).expect("init");
    assert_eq!(created.layout.period_label_template, DEFAULT_PERIOD_LABEL_TEMPLATE);

    home.child(".clinisync/settings.yaml")
        .assert(predicate::str::contains("patient_match: code"));
}

#[test]
fn init_is_idempotent_and_preserves_edits() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut first = settings::init_at(home.path()).expect("init");
    first.layout.patient_match = PatientMatch::FullName;
    first.clinic_cards.api_key = "kept".into();
    settings::save_at(home.path(), &first).expect("save");

    let second = settings::init_at(home.path()).expect("re-init");
    assert_eq!(second.layout.patient_match, PatientMatch::FullName);
    assert_eq!(second.clinic_cards.api_key, "kept");
}

#[test]
fn save_and_load_roundtrip_keeps_layout() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut s = settings::init_at(home.path()).expect("init");
    s.layout.code_column = 5;
    s.throttle.max_requests = 30;
    settings::save_at(home.path(), &s).expect("save");

    let loaded = settings::load_file_at(home.path()).expect("load");
    assert_eq!(loaded, s);
}

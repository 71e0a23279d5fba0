use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use clinisync_core::settings::{self, Settings};

const CREDENTIAL_VARS: [&str; 4] = [
    "CLINICS_CARD_API_KEY",
    "GOOGLE_SPREADSHEET_KEY",
    "GOOGLE_WORKSHEET_NAME",
    "GOOGLE_ACCESS_TOKEN",
];

fn clinisync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clinisync"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn init_writes_default_settings_once() {
    let home = TempDir::new().expect("home");

    clinisync_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Wrote default settings"));

    let path = settings::settings_path_at(home.path());
    assert!(path.exists(), "settings.yaml should exist after init");
    let loaded = settings::load_file_at(home.path()).expect("load");
    assert_eq!(loaded, Settings::default());

    clinisync_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("already present"));
}

#[test]
fn sync_before_init_points_at_init() {
    let home = TempDir::new().expect("home");

    clinisync_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("clinisync init"));
}

#[test]
fn sync_without_credentials_fails_before_any_request() {
    let home = TempDir::new().expect("home");
    settings::init_at(home.path()).expect("init");

    clinisync_cmd(home.path())
        .args(["sync", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("missing setting"));
}

#[test]
fn preview_only_needs_clinic_credentials() {
    let home = TempDir::new().expect("home");
    settings::init_at(home.path()).expect("init");

    clinisync_cmd(home.path())
        .arg("preview")
        .assert()
        .failure()
        .stderr(contains("clinic_cards"));
}

#[test]
fn invalid_throttle_is_rejected() {
    let home = TempDir::new().expect("home");
    let mut s = Settings::default();
    s.clinic_cards.base_url = "http://127.0.0.1:9".into();
    s.clinic_cards.api_key = "key".into();
    s.sheet.spreadsheet_key = "sheet".into();
    s.sheet.worksheet_name = "Report".into();
    s.sheet.access_token = "token".into();
    s.throttle.max_requests = 0;
    settings::save_at(home.path(), &s).expect("save");

    clinisync_cmd(home.path())
        .arg("daemon")
        .assert()
        .failure()
        .stderr(contains("throttle.max_requests"));
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().expect("home");

    clinisync_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("sync"))
        .stdout(contains("preview"))
        .stdout(contains("daemon"));
}

//! Integration tests for the `powerplay` CLI binary.
//!
//! Everything here runs offline: settings commands write to a temp config
//! file, and rides use the simulated sensor with `--dry-run`.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `powerplay` binary with env isolation.
fn powerplay_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("powerplay");
    cmd.env("HOME", "/tmp/powerplay-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/powerplay-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("POWERPLAY_CONFIG")
        .env_remove("POWERPLAY_RIDE__FTP")
        .env_remove("POWERPLAY_SPOTIFY__CLIENT_ID")
        .env_remove("RUST_LOG");
    cmd
}

/// Same, pointed at `config.toml` inside `dir`.
fn with_config(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = powerplay_cmd();
    cmd.arg("--config").arg(config_file(dir.path()));
    cmd
}

fn config_file(dir: &Path) -> std::path::PathBuf {
    dir.join("config.toml")
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = powerplay_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    powerplay_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ride")
            .and(predicate::str::contains("zones"))
            .and(predicate::str::contains("login")),
    );
}

#[test]
fn test_unknown_subcommand() {
    powerplay_cmd().arg("pedal").assert().code(2);
}

// ── FTP ─────────────────────────────────────────────────────────────

#[test]
fn test_ftp_defaults_to_250() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .args(["ftp", "show", "-o", "plain"])
        .assert()
        .success()
        .stdout("250\n");
}

#[test]
fn test_ftp_set_persists() {
    let dir = TempDir::new().unwrap();
    with_config(&dir).args(["ftp", "set", "280"]).assert().success();

    with_config(&dir)
        .args(["ftp", "-o", "plain"])
        .assert()
        .success()
        .stdout("280\n");
    let written = std::fs::read_to_string(config_file(dir.path())).unwrap();
    assert!(written.contains("ftp = 280"), "{written}");
}

#[test]
fn test_ftp_rejects_non_positive() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .args(["ftp", "set", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("FTP must be a positive"));
}

#[test]
fn test_env_overrides_ftp() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .env("POWERPLAY_RIDE__FTP", "310")
        .args(["ftp", "-o", "plain"])
        .assert()
        .success()
        .stdout("310\n");
}

// ── Zones ───────────────────────────────────────────────────────────

#[test]
fn test_zones_add_list_remove() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .args(["zones", "add", "75", "-p", "tempo"])
        .assert()
        .success();
    with_config(&dir)
        .args(["zones", "add", "105", "--playlist", "spotify:playlist:climb"])
        .assert()
        .success();

    // Highest threshold first, default catch-all last.
    with_config(&dir)
        .args(["zones", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("105\tspotify:playlist:climb\n75\ttempo\n0\t\n");

    with_config(&dir)
        .args(["zones", "rm", "1"])
        .assert()
        .success();
    with_config(&dir)
        .args(["zones", "-o", "plain"])
        .assert()
        .success()
        .stdout("75\ttempo\n0\t\n");
}

#[test]
fn test_zones_table_marks_unassigned() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .args(["zones", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(unassigned)").and(predicate::str::contains("Min %")));
}

#[test]
fn test_zones_update_resorts() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .args(["zones", "add", "50", "-p", "warmup"])
        .assert()
        .success();
    with_config(&dir)
        .args(["zones", "update", "2", "120", "-p", "sprint"])
        .assert()
        .success();
    with_config(&dir)
        .args(["zones", "-o", "plain"])
        .assert()
        .success()
        .stdout("120\tsprint\n50\twarmup\n");
}

#[test]
fn test_zones_position_zero_is_usage_error() {
    let dir = TempDir::new().unwrap();
    with_config(&dir).args(["zones", "rm", "0"]).assert().code(2);
}

#[test]
fn test_zones_remove_out_of_range() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .args(["zones", "rm", "9"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no zone at position"));
}

#[test]
fn test_zones_json_output() {
    let dir = TempDir::new().unwrap();
    let output = with_config(&dir)
        .args(["zones", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["position"], 1);
    assert_eq!(parsed[0]["min_power_percent"], 0);
}

// ── Device and reset ────────────────────────────────────────────────

#[test]
fn test_device_forget() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        config_file(dir.path()),
        "[ride]\nftp = 240\ndevice_address = \"C4:7F:0E:11:22:33\"\n",
    )
    .unwrap();

    with_config(&dir)
        .args(["device", "-o", "plain"])
        .assert()
        .success()
        .stdout("C4:7F:0E:11:22:33\n");
    with_config(&dir).args(["device", "forget"]).assert().success();
    with_config(&dir)
        .args(["device", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sensor remembered"));
}

#[test]
fn test_reset_keeps_sensor() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        config_file(dir.path()),
        "[ride]\nftp = 240\ndevice_address = \"C4:7F\"\n\n[[ride.zones]]\nmin_power_percent = 90\nplaylist_id = \"fast\"\n",
    )
    .unwrap();

    with_config(&dir).args(["reset", "--yes"]).assert().success();

    with_config(&dir)
        .args(["ftp", "-o", "plain"])
        .assert()
        .stdout("250\n");
    with_config(&dir)
        .args(["zones", "-o", "plain"])
        .assert()
        .stdout("0\t\n");
    with_config(&dir)
        .args(["device", "-o", "plain"])
        .assert()
        .stdout("C4:7F\n");
}

// ── Ride ────────────────────────────────────────────────────────────

fn ride_config(dir: &TempDir) {
    std::fs::write(
        config_file(dir.path()),
        "[ride]\nftp = 200\n\n\
         [[ride.zones]]\nmin_power_percent = 0\nplaylist_id = \"easy\"\n\n\
         [[ride.zones]]\nmin_power_percent = 100\nplaylist_id = \"hard\"\n",
    )
    .unwrap();
}

#[test]
fn test_simulated_dry_run_switches_on_zone_change() {
    let dir = TempDir::new().unwrap();
    ride_config(&dir);

    let output = with_config(&dir)
        .args(["ride", "--simulate", "100,200,300,120", "--interval-ms", "0"])
        .arg("--dry-run")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let switches: Vec<&str> = stdout.lines().filter(|l| l.contains("->")).collect();
    assert_eq!(switches.len(), 3, "{stdout}");
    assert!(switches[0].ends_with("-> easy"));
    assert!(switches[1].ends_with("-> hard"));
    assert!(switches[2].ends_with("-> easy"));
    assert!(stdout.contains("switches: 3"), "{stdout}");
    assert!(stdout.contains("max:      300 W"), "{stdout}");
}

#[test]
fn test_simulated_ride_summary_json() {
    let dir = TempDir::new().unwrap();
    ride_config(&dir);

    let output = with_config(&dir)
        .args(["-q", "ride", "--simulate=-5,210", "--interval-ms", "0", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    // Quiet suppresses both the switch lines and the summary.
    assert!(output.stdout.is_empty());

    let output = with_config(&dir)
        .args(["ride", "--simulate=-5,210", "--interval-ms", "0", "--dry-run"])
        .args(["-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout.find('{').unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout[json_start..]).unwrap();
    assert_eq!(summary["samples"], 2);
    assert_eq!(summary["switches"], 2);
    assert_eq!(summary["max_watts"], 210);
    assert_eq!(summary["last_playlist"], "hard");
}

#[test]
fn test_simulated_ride_does_not_remember_sensor() {
    let dir = TempDir::new().unwrap();
    ride_config(&dir);
    with_config(&dir)
        .args(["ride", "--simulate", "100", "--interval-ms", "0", "--dry-run"])
        .assert()
        .success();
    let written = std::fs::read_to_string(config_file(dir.path())).unwrap();
    assert!(!written.contains("SIM-0001"));
}

// ── Spotify commands without setup ──────────────────────────────────

#[test]
fn test_playlists_without_client_id() {
    let dir = TempDir::new().unwrap();
    with_config(&dir)
        .arg("playlists")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("client id"));
}

#[test]
fn test_ride_without_client_id_needs_setup() {
    let dir = TempDir::new().unwrap();
    ride_config(&dir);
    with_config(&dir)
        .args(["ride", "--simulate", "100", "--interval-ms", "0"])
        .assert()
        .code(3);
}

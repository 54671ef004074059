use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// `bpr decide` checks the confirmation phrase before it touches the
/// database, so these run without BPR_DATABASE_URL.
fn bpr() -> Command {
    let mut cmd = Command::cargo_bin("bpr").unwrap();
    cmd.env_remove(bpr_config::ENV_CONFIG_PATHS)
        .env_remove(bpr_db::ENV_DB_URL);
    cmd
}

#[test]
fn decide_without_confirm_prints_expected_phrase() {
    bpr()
        .args([
            "decide", "--bid", "B1", "--phone", "+91 99999-99999", "--decision", "confirmed",
            "--admin", "admin-7",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manual confirmation required"))
        .stderr(predicate::str::contains("CONFIRMED B1 9999999999"));
}

#[test]
fn decide_with_mismatched_confirm_is_refused() {
    bpr()
        .args([
            "decide", "--bid", "B1", "--phone", "9999999999", "--decision", "REJECTED",
            "--admin", "admin-7", "--confirm", "CONFIRMED B1 9999999999",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manual confirmation mismatch"));
}

#[test]
fn decide_rejects_unknown_decision_and_phone_without_digits() {
    bpr()
        .args([
            "decide", "--bid", "B1", "--phone", "9999999999", "--decision", "maybe",
            "--admin", "a",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --decision"));

    bpr()
        .args([
            "decide", "--bid", "B1", "--phone", "n/a", "--decision", "confirmed", "--admin", "a",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("n/a"));
}

#[test]
fn config_hash_is_stable_across_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    std::fs::write(&a, "window:\n  timezone: Asia/Kolkata\n  listing_days: 7\n").unwrap();
    std::fs::write(&b, "window:\n  listing_days: 7\n  timezone: Asia/Kolkata\n").unwrap();

    let out_a = bpr().args(["config-hash", a.to_str().unwrap()]).output().unwrap();
    let out_b = bpr().args(["config-hash", b.to_str().unwrap()]).output().unwrap();
    assert!(out_a.status.success());

    let first_line = |o: &std::process::Output| {
        String::from_utf8_lossy(&o.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    };
    assert!(first_line(&out_a).starts_with("config_hash="));
    assert_eq!(first_line(&out_a), first_line(&out_b));
}

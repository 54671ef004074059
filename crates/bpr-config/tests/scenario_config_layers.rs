//! Layering, hashing and the unused-key guard.

use bpr_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

const BASE_YAML: &str = r#"
identity:
  phone_width: 10
window:
  timezone: "Asia/Kolkata"
  listing_days: 7
  notification_days: 1
notifications:
  count_rejected: true
"#;

const BASE_YAML_REORDERED: &str = r#"
notifications:
  count_rejected: true
window:
  notification_days: 1
  listing_days: 7
  timezone: "Asia/Kolkata"
identity:
  phone_width: 10
"#;

const OVERLAY_YAML: &str = r#"
window:
  listing_days: 14
"#;

#[test]
fn hash_is_stable_across_key_order() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn overlay_overrides_one_leaf_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_eq!(merged.config_json["window"]["listing_days"], 14);
    assert_eq!(merged.config_json["window"]["timezone"], "Asia/Kolkata");
    assert_ne!(base.config_hash, merged.config_hash);
}

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = format!("{BASE_YAML}\nlegacy:\n  captcha: true\n");
    let loaded = load_layered_yaml_from_strings(&[yaml.as_str()]).unwrap();

    let report = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");
    assert_eq!(report.unused_leaf_pointers, vec!["/legacy/captcha".to_string()]);
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = format!("{BASE_YAML}\ndaemon:\n  bind_addr: \"127.0.0.1:8787\"\n");
    let loaded = load_layered_yaml_from_strings(&[yaml.as_str()]).unwrap();

    // The daemon reads bind_addr; the CLI does not.
    report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
        .expect("daemon consumes every key");
    let err = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn shipped_base_layer_is_fully_consumed_by_the_daemon() {
    let base = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config/defaults/base.yaml");
    let base = base.to_string_lossy().to_string();
    let loaded = bpr_config::load_layered_yaml(&[base.as_str()]).unwrap();

    let report =
        report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());

    let cli = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(cli.unused_leaf_pointers, vec!["/daemon/bind_addr".to_string()]);
}

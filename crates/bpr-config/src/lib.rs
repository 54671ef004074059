//! bpr-config
//!
//! Layered YAML configuration. Later layers override earlier ones; the merged
//! document is rendered to canonical JSON and hashed (SHA-256) so every
//! process can report exactly which configuration it runs with.
//!
//! Two guards run on every load or on request:
//! - secret-looking string literals are refused (credentials come from env)
//! - keys no consumer reads can be reported or refused per mode

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// Environment variable holding comma-separated config paths in merge order.
pub const ENV_CONFIG_PATHS: &str = "BPR_CONFIG";

/// Leaf strings starting with any of these abort the load.
const SECRET_PREFIXES: &[&str] = &[
    "postgres://", // connection strings carry passwords
    "postgresql://",
    "sk-",
    "sk_live",
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

// ---------------------------------------------------------------------------
// Consumption registry
// ---------------------------------------------------------------------------

/// Which process is reading the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Daemon,
    Cli,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Daemon => "DAEMON",
            ConfigMode::Cli => "CLI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes actually read per mode.
///
/// Keep in step with `EngineSettings::from_config_json` (bpr-engine),
/// `DaemonSettings` (bpr-daemon) and `AuditSettings` (bpr-audit).
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Daemon => &[
            "/identity/phone_width",
            "/window/timezone",
            "/window/listing_days",
            "/window/notification_days",
            "/notifications/count_rejected",
            "/daemon/bind_addr",
            "/audit/path",
            "/audit/hash_chain",
        ],
        ConfigMode::Cli => &[
            "/identity/phone_width",
            "/window/timezone",
            "/window/listing_days",
            "/window/notification_days",
            "/notifications/count_rejected",
            "/audit/path",
            "/audit/hash_chain",
        ],
    }
}

/// Produce an unused-key report for a given mode.
/// `Fail` turns a non-clean report into an error; `Warn` always returns it.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let mut consumed: BTreeSet<String> = BTreeSet::new();
    for p in consumed_pointers_for_mode(mode) {
        consumed.insert(normalize_pointer(p));
    }
    let consumed_prefixes: Vec<String> = consumed.iter().cloned().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = Vec::new();
    'leaf: for lp in leaves {
        for cp in &consumed_prefixes {
            if is_prefix_pointer(cp, &lp) {
                continue 'leaf;
            }
        }
        unused.push(lp);
    }

    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.mode,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.starts_with(prefix)
        && leaf
            .get(prefix.len()..prefix.len() + 1)
            .map(|c| c == "/")
            .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// No layers: every consumer falls back to its defaults.
    pub fn empty() -> Self {
        let config_json = serde_json::json!({});
        let canonical_json = config_json.to_string();
        let config_hash = sha256_hex(canonical_json.as_bytes());
        Self {
            config_hash,
            canonical_json,
            config_json,
        }
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Load the layers named by `BPR_CONFIG`; an unset or blank variable
/// yields [`LoadedConfig::empty`].
pub fn load_from_env() -> Result<LoadedConfig> {
    match std::env::var(ENV_CONFIG_PATHS) {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            load_layered_yaml(&paths)
        }
        _ => Ok(LoadedConfig::empty()),
    }
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses to null; it overrides nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys in sorted order.
pub fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is BTreeMap-backed here (no preserve_order), so keys
    // serialize sorted.
    serde_json::to_string(v).context("canonical json serialize failed")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Typed readers
// ---------------------------------------------------------------------------

/// Optional unsigned integer at `ptr`; accepts numbers and numeric strings.
pub fn read_u64(cfg: &Value, ptr: &str) -> Result<Option<u64>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .with_context(|| format!("{ptr} must be a non-negative integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{ptr} must be a non-negative integer (got {s:?})")),
        Some(other) => bail!("{ptr} must be a non-negative integer (got {other})"),
    }
}

pub fn read_bool(cfg: &Value, ptr: &str) -> Result<Option<bool>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => bail!("{ptr} must be a boolean (got {other})"),
    }
}

pub fn read_str<'a>(cfg: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => bail!("{ptr} must be a string (got {other})"),
    }
}

//! bpr-audit
//!
//! Append-only decision trail. One JSON line per recorded decision, with an
//! optional SHA-256 chain linking each line to the previous one.

use anyhow::{Context, Result};
use bpr_config::{canonicalize_json, read_bool, read_str, sha256_hex};
use bpr_schemas::{Confirmation, DecisionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for trail record ids (uuid v5 over bid, phone and sequence).
const TRAIL_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x52, 0x0e, 0x94, 0x2d, 0x4c, 0x3a, 0x8e, 0x17, 0x0c, 0x55, 0xd2, 0x61, 0xa9, 0x40,
]);

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSettings {
    /// `None` disables the trail.
    pub path: Option<PathBuf>,
    pub hash_chain: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

impl AuditSettings {
    /// Reads `/audit/path` and `/audit/hash_chain` (default true).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let path = read_str(cfg, "/audit/path")?
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let hash_chain = read_bool(cfg, "/audit/hash_chain")?.unwrap_or(true);
        Ok(Self { path, hash_chain })
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// What was decided, by whom, and the snapshot the admin saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub confirmation_id: String,
    pub bid_id: String,
    pub phone_key: String,
    pub status: DecisionStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub seller_name: String,
    pub rate: f64,
    pub quantity: f64,
}

impl DecisionEntry {
    pub fn from_confirmation(c: &Confirmation, phone_key: impl Into<String>) -> Self {
        Self {
            confirmation_id: c.id.clone(),
            bid_id: c.bid_id.clone(),
            phone_key: phone_key.into(),
            status: c.status,
            decided_by: c.decided_by.clone(),
            decided_at: c.decided_at,
            seller_name: c.seller_name.clone(),
            rate: c.rate,
            quantity: c.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailRecord {
    pub record_id: Uuid,
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub entry: DecisionEntry,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Hash over the canonical JSON of the record with `hash_self` cleared.
pub fn record_hash(rec: &TrailRecord) -> Result<String> {
    let mut bare = rec.clone();
    bare.hash_self = None;
    Ok(sha256_hex(canonical_line(&bare)?.as_bytes()))
}

fn canonical_line<T: Serialize>(v: &T) -> Result<String> {
    let value = serde_json::to_value(v).context("serialize trail record failed")?;
    canonicalize_json(&value)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub struct DecisionTrail {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    next_seq: u64,
}

impl DecisionTrail {
    /// Open (or create) the trail at `path`, resuming the chain from the last
    /// line already on disk.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
        }

        let (last_hash, next_seq) = match fs::read_to_string(&path) {
            Ok(content) => match content.lines().rev().find(|l| !l.trim().is_empty()) {
                Some(last) => {
                    let rec: TrailRecord = serde_json::from_str(last.trim())
                        .with_context(|| format!("parse last trail line of {path:?}"))?;
                    (rec.hash_self, rec.seq + 1)
                }
                None => (None, 0),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (None, 0),
            Err(e) => return Err(e).with_context(|| format!("read trail {path:?}")),
        };

        Ok(Self {
            path,
            hash_chain,
            last_hash,
            next_seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn record(&mut self, entry: DecisionEntry) -> Result<TrailRecord> {
        let seq = self.next_seq;
        let name = format!("{}|{}|{}", entry.bid_id, entry.phone_key, seq);

        let mut rec = TrailRecord {
            record_id: Uuid::new_v5(&TRAIL_NAMESPACE, name.as_bytes()),
            seq,
            recorded_at: Utc::now(),
            entry,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = self.last_hash.clone();
            rec.hash_self = Some(record_hash(&rec)?);
        }

        append_line(&self.path, &canonical_line(&rec)?)?;

        self.next_seq += 1;
        if self.hash_chain {
            self.last_hash = rec.hash_self.clone();
        }
        Ok(rec)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open trail {path:?}"))?;
    f.write_all(line.as_bytes())
        .and_then(|_| f.write_all(b"\n"))
        .context("write trail line failed")
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCheck {
    Intact { records: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_trail(path: impl AsRef<Path>) -> Result<ChainCheck> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read trail {:?}", path.as_ref()))?;
    verify_trail_str(&content)
}

/// Checks linkage, self hashes and sequence continuity.
pub fn verify_trail_str(content: &str) -> Result<ChainCheck> {
    let mut prev: Option<String> = None;
    let mut expected_seq: Option<u64> = None;
    let mut records = 0usize;

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        let rec: TrailRecord = match serde_json::from_str(line.trim()) {
            Ok(r) => r,
            Err(e) => {
                return Ok(ChainCheck::Broken {
                    line: line_no,
                    reason: format!("unparseable record: {e}"),
                })
            }
        };

        if let Some(want) = expected_seq {
            if rec.seq != want {
                return Ok(ChainCheck::Broken {
                    line: line_no,
                    reason: format!("seq gap: expected {want}, got {}", rec.seq),
                });
            }
        }

        if rec.hash_prev != prev {
            return Ok(ChainCheck::Broken {
                line: line_no,
                reason: format!("hash_prev mismatch: expected {prev:?}, got {:?}", rec.hash_prev),
            });
        }

        if let Some(claimed) = &rec.hash_self {
            let actual = record_hash(&rec)?;
            if *claimed != actual {
                return Ok(ChainCheck::Broken {
                    line: line_no,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {actual}"),
                });
            }
        }

        prev = rec.hash_self.clone();
        expected_seq = Some(rec.seq + 1);
        records += 1;
    }

    Ok(ChainCheck::Intact { records })
}

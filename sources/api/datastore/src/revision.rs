//! The records the revision store keeps and hands back.

use chrono::{DateTime, Utc};
use model::Tree;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An immutable, identified configuration snapshot staged by an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub revision_id: String,
    pub actor: String,
    pub changes: Tree,
    pub created_at: DateTime<Utc>,
}

/// One successful promotion of a staged revision to active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: String,
    pub revision_id: String,
    pub actor: String,
    pub committed_at: DateTime<Utc>,
}

/// What a caller gets back from staging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReceipt {
    pub revision_id: String,
    pub status: &'static str,
    pub validated: bool,
    pub timestamp: DateTime<Utc>,
}

/// A read-only snapshot of the whole store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateView {
    pub staged: Option<Revision>,
    pub active: Option<Revision>,
    pub last_commit: Option<CommitRecord>,
    pub history_size: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
    Configure,
    Commit,
    Recover,
}

/// A single line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Builds an identifier like `rev_1718000000_0a1b2c3d4e5f`: a type prefix, the Unix time, and
/// 48 random bits.
pub(crate) fn generate_id(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u64 = rand::thread_rng().gen_range(0..1 << 48);
    format!("{}_{}_{:012x}", prefix, now.timestamp(), suffix)
}

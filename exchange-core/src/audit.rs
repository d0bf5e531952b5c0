//! Tamper-evident audit chain
//!
//! Every [`AuditLogEntry`] stores the SHA-256 of its own content concatenated
//! with the previous entry's hash. Rewriting or dropping any entry breaks
//! every hash after it, which [`verify_chain`] detects.

use crate::types::{AccountId, AuditAction, AuditLogEntry};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash used as `previous_hash` for the first entry
pub fn genesis_hash() -> String {
    hex::encode([0u8; 32])
}

/// Audit entry content before it is linked into the chain
#[derive(Debug, Clone)]
pub struct AuditDraft {
    /// Entry ID
    pub entry_id: Uuid,
    /// Admin who performed the action
    pub acting_admin: AccountId,
    /// Affected account, if any
    pub target: Option<AccountId>,
    /// Action tag
    pub action: AuditAction,
    /// Free-text detail
    pub details: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl AuditDraft {
    /// New draft stamped with the current time
    pub fn new(
        acting_admin: AccountId,
        target: Option<AccountId>,
        action: AuditAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            acting_admin,
            target,
            action,
            details: details.into(),
            created_at: Utc::now(),
        }
    }

    /// Link this draft after `previous_hash`
    pub fn seal(self, previous_hash: &str) -> AuditLogEntry {
        let entry_hash = compute_hash(
            previous_hash,
            &self.entry_id,
            &self.acting_admin,
            self.target.as_ref(),
            self.action,
            &self.details,
            &self.created_at,
        );

        AuditLogEntry {
            entry_id: self.entry_id,
            acting_admin: self.acting_admin,
            target: self.target,
            action: self.action,
            details: self.details,
            created_at: self.created_at,
            previous_hash: previous_hash.to_string(),
            entry_hash,
        }
    }
}

fn compute_hash(
    previous_hash: &str,
    entry_id: &Uuid,
    acting_admin: &AccountId,
    target: Option<&AccountId>,
    action: AuditAction,
    details: &str,
    created_at: &DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(entry_id.as_bytes());
    hasher.update(acting_admin.as_uuid().as_bytes());
    match target {
        Some(t) => {
            hasher.update([1u8]);
            hasher.update(t.as_uuid().as_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update(action.as_str().as_bytes());
    hasher.update((details.len() as u64).to_be_bytes());
    hasher.update(details.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Verify an audit trail in append order
pub fn verify_chain(entries: &[AuditLogEntry]) -> Result<()> {
    let mut previous = genesis_hash();

    for (index, entry) in entries.iter().enumerate() {
        if entry.previous_hash != previous {
            return Err(Error::Storage(format!(
                "Audit chain broken at entry {} ({}): previous hash mismatch",
                index, entry.entry_id
            )));
        }

        let expected = compute_hash(
            &entry.previous_hash,
            &entry.entry_id,
            &entry.acting_admin,
            entry.target.as_ref(),
            entry.action,
            &entry.details,
            &entry.created_at,
        );
        if entry.entry_hash != expected {
            return Err(Error::Storage(format!(
                "Audit chain broken at entry {} ({}): content hash mismatch",
                index, entry.entry_id
            )));
        }

        previous = entry.entry_hash.clone();
    }

    Ok(())
}

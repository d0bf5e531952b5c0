//! Document store for the exchange
//!
//! # Tables
//!
//! - `accounts` - Accounts with embedded balances (key: account_id)
//! - `courses` - Course catalog and rosters (key: course_id)
//! - `ledger` - Append-only ledger entries per account
//! - `audit` - Append-only, hash-chained audit trail
//! - `email_index` - Unique e-mail lookup
//!
//! Every mutation goes through [`Storage::apply`], which checks each
//! document's expected version and then applies the whole [`WriteBatch`]
//! under one write lock, or nothing at all.

use crate::{
    audit::{genesis_hash, AuditDraft},
    error::{Error, Result},
    types::{Account, AccountId, AuditLogEntry, Course, CourseId, LedgerEntry, PlatformStats},
    Config,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "exchange.snapshot";
const SNAPSHOT_TMP_FILE: &str = "exchange.snapshot.tmp";

/// One mutation inside a [`WriteBatch`]
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert (`version == 0`) or replace (`version` == stored version) an account
    PutAccount(Account),
    /// Insert (`version == 0`) or replace (`version` == stored version) a course
    PutCourse(Course),
    /// Delete a course at the expected version
    DeleteCourse {
        /// Course to delete
        id: CourseId,
        /// Version the caller read
        expected_version: u64,
    },
    /// Append a ledger entry
    AppendLedger(LedgerEntry),
    /// Append an audit entry, linked into the chain at apply time
    AppendAudit(AuditDraft),
}

/// Ordered set of mutations committed atomically
#[derive(Debug, Clone)]
pub struct WriteBatch {
    label: &'static str,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// New empty batch, `label` names the orchestration for logs
    pub fn new(label: &'static str) -> Self {
        Self { label, ops: Vec::new() }
    }

    /// Orchestration name
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stage an account write
    pub fn put_account(&mut self, account: Account) -> &mut Self {
        self.ops.push(WriteOp::PutAccount(account));
        self
    }

    /// Stage a course write
    pub fn put_course(&mut self, course: Course) -> &mut Self {
        self.ops.push(WriteOp::PutCourse(course));
        self
    }

    /// Stage a course deletion
    pub fn delete_course(&mut self, id: CourseId, expected_version: u64) -> &mut Self {
        self.ops.push(WriteOp::DeleteCourse { id, expected_version });
        self
    }

    /// Stage a ledger entry
    pub fn append_ledger(&mut self, entry: LedgerEntry) -> &mut Self {
        self.ops.push(WriteOp::AppendLedger(entry));
        self
    }

    /// Stage an audit entry
    pub fn append_audit(&mut self, draft: AuditDraft) -> &mut Self {
        self.ops.push(WriteOp::AppendAudit(draft));
        self
    }

    /// Staged operations
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of staged operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Outcome of a committed batch
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    /// Store-wide commit sequence number
    pub commit_seq: u64,
    /// Audit entries as sealed into the chain
    pub audit_entries: Vec<AuditLogEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    courses: BTreeMap<CourseId, Course>,
    ledger: BTreeMap<AccountId, Vec<LedgerEntry>>,
    audit: Vec<AuditLogEntry>,
    email_index: HashMap<String, AccountId>,
    commit_seq: u64,
}

/// Storage wrapper around the in-process tables
pub struct Storage {
    tables: RwLock<Tables>,
    data_dir: PathBuf,
    snapshots_enabled: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("data_dir", &self.data_dir)
            .field("snapshots_enabled", &self.snapshots_enabled)
            .finish()
    }
}

impl Storage {
    /// Open the store, reloading the last snapshot when present
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let snapshots_enabled = config.snapshot.enabled;

        let tables = if snapshots_enabled {
            std::fs::create_dir_all(&data_dir)?;
            Self::load_snapshot(&data_dir.join(SNAPSHOT_FILE))?
        } else {
            Tables::default()
        };

        tracing::info!(
            data_dir = ?data_dir,
            accounts = tables.accounts.len(),
            courses = tables.courses.len(),
            commit_seq = tables.commit_seq,
            "Opened exchange store"
        );

        Ok(Self {
            tables: RwLock::new(tables),
            data_dir,
            snapshots_enabled,
        })
    }

    fn load_snapshot(path: &Path) -> Result<Tables> {
        if !path.exists() {
            return Ok(Tables::default());
        }
        let bytes = std::fs::read(path)?;
        let tables: Tables = bincode::deserialize(&bytes)?;
        Ok(tables)
    }

    // Account reads

    /// Get account by ID
    pub fn get_account(&self, id: AccountId) -> Result<Account> {
        self.tables
            .read()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::account_not_found(id))
    }

    /// Find account by e-mail (case-insensitive)
    pub fn find_account_by_email(&self, email: &str) -> Option<Account> {
        let tables = self.tables.read();
        tables
            .email_index
            .get(&normalize_email(email))
            .and_then(|id| tables.accounts.get(id))
            .cloned()
    }

    /// All accounts in store iteration order (creation order)
    pub fn list_accounts(&self) -> Vec<Account> {
        self.tables.read().accounts.values().cloned().collect()
    }

    // Course reads

    /// Get course by ID
    pub fn get_course(&self, id: CourseId) -> Result<Course> {
        self.tables
            .read()
            .courses
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::course_not_found(id))
    }

    /// Fetch the courses that still exist among `ids`, preserving order
    pub fn get_courses(&self, ids: &[CourseId]) -> Vec<Course> {
        let tables = self.tables.read();
        ids.iter().filter_map(|id| tables.courses.get(id).cloned()).collect()
    }

    /// All courses in creation order
    pub fn list_courses(&self) -> Vec<Course> {
        self.tables.read().courses.values().cloned().collect()
    }

    // Ledger and audit reads

    /// Ledger history for an account, newest first
    pub fn ledger_entries(&self, user: AccountId) -> Vec<LedgerEntry> {
        let mut entries = self
            .tables
            .read()
            .ledger
            .get(&user)
            .cloned()
            .unwrap_or_default();
        entries.reverse();
        entries
    }

    /// Latest audit entries, newest first
    pub fn audit_entries(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.tables
            .read()
            .audit
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Entire audit trail in append order
    pub fn audit_chain(&self) -> Vec<AuditLogEntry> {
        self.tables.read().audit.clone()
    }

    /// Platform totals
    pub fn stats(&self) -> PlatformStats {
        let tables = self.tables.read();
        PlatformStats {
            users: tables.accounts.len() as u64,
            courses: tables.courses.len() as u64,
            circulating_credits: tables
                .accounts
                .values()
                .fold(0i64, |total, a| total.saturating_add(a.credits)),
        }
    }

    /// Last committed sequence number
    pub fn commit_seq(&self) -> u64 {
        self.tables.read().commit_seq
    }

    // Writes

    /// Validate and apply a batch atomically
    ///
    /// Fails with `Conflict` when any document changed since it was read,
    /// and with `InvalidOperation` on a unique e-mail violation. On failure
    /// nothing is written.
    pub fn apply(&self, batch: WriteBatch) -> Result<CommitReceipt> {
        let mut tables = self.tables.write();

        Self::validate(&tables, &batch)?;

        let mut receipt = CommitReceipt::default();
        for op in batch.ops {
            match op {
                WriteOp::PutAccount(mut account) => {
                    let email = normalize_email(&account.email);
                    let old_email = tables
                        .accounts
                        .get(&account.id)
                        .map(|previous| normalize_email(&previous.email));
                    if let Some(old_email) = old_email.filter(|old| *old != email) {
                        tables.email_index.remove(&old_email);
                    }
                    tables.email_index.insert(email, account.id);
                    account.version += 1;
                    tables.accounts.insert(account.id, account);
                }
                WriteOp::PutCourse(mut course) => {
                    course.version += 1;
                    tables.courses.insert(course.id, course);
                }
                WriteOp::DeleteCourse { id, .. } => {
                    tables.courses.remove(&id);
                }
                WriteOp::AppendLedger(entry) => {
                    tables.ledger.entry(entry.user).or_default().push(entry);
                }
                WriteOp::AppendAudit(draft) => {
                    let previous = tables
                        .audit
                        .last()
                        .map(|e| e.entry_hash.clone())
                        .unwrap_or_else(genesis_hash);
                    let entry = draft.seal(&previous);
                    receipt.audit_entries.push(entry.clone());
                    tables.audit.push(entry);
                }
            }
        }

        tables.commit_seq += 1;
        receipt.commit_seq = tables.commit_seq;

        tracing::debug!(
            batch = batch.label,
            commit_seq = receipt.commit_seq,
            "Batch committed"
        );

        Ok(receipt)
    }

    fn validate(tables: &Tables, batch: &WriteBatch) -> Result<()> {
        let mut touched_accounts = HashSet::new();
        let mut touched_courses = HashSet::new();

        for op in &batch.ops {
            match op {
                WriteOp::PutAccount(account) => {
                    if !touched_accounts.insert(account.id) {
                        return Err(Error::Storage(format!(
                            "Account {} written twice in batch {}",
                            account.id, batch.label
                        )));
                    }
                    let stored = tables.accounts.get(&account.id).map(|a| a.version).unwrap_or(0);
                    if stored != account.version {
                        return Err(Error::Conflict(format!(
                            "Account {} changed (expected version {}, found {})",
                            account.id, account.version, stored
                        )));
                    }
                    let email = normalize_email(&account.email);
                    if let Some(owner) = tables.email_index.get(&email) {
                        if *owner != account.id {
                            return Err(Error::InvalidOperation("User already exists".to_string()));
                        }
                    }
                }
                WriteOp::PutCourse(course) => {
                    if !touched_courses.insert(course.id) {
                        return Err(Error::Storage(format!(
                            "Course {} written twice in batch {}",
                            course.id, batch.label
                        )));
                    }
                    let stored = tables.courses.get(&course.id).map(|c| c.version).unwrap_or(0);
                    if stored != course.version {
                        return Err(Error::Conflict(format!(
                            "Course {} changed (expected version {}, found {})",
                            course.id, course.version, stored
                        )));
                    }
                }
                WriteOp::DeleteCourse { id, expected_version } => {
                    if !touched_courses.insert(*id) {
                        return Err(Error::Storage(format!(
                            "Course {} written twice in batch {}",
                            id, batch.label
                        )));
                    }
                    match tables.courses.get(id) {
                        Some(course) if course.version == *expected_version => {}
                        Some(course) => {
                            return Err(Error::Conflict(format!(
                                "Course {} changed (expected version {}, found {})",
                                id, expected_version, course.version
                            )))
                        }
                        None => {
                            return Err(Error::Conflict(format!("Course {} already deleted", id)))
                        }
                    }
                }
                WriteOp::AppendLedger(_) | WriteOp::AppendAudit(_) => {}
            }
        }

        Ok(())
    }

    // Snapshots

    /// Persist all tables (temp file + rename)
    pub fn save_snapshot(&self) -> Result<()> {
        if !self.snapshots_enabled {
            return Ok(());
        }

        let bytes = {
            let tables = self.tables.read();
            bincode::serialize(&*tables)?
        };

        let tmp = self.data_dir.join(SNAPSHOT_TMP_FILE);
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, self.data_dir.join(SNAPSHOT_FILE))?;

        tracing::debug!(bytes = bytes.len(), "Snapshot written");
        Ok(())
    }

    /// Flush a final snapshot (graceful shutdown)
    pub fn close(&self) -> Result<()> {
        self.save_snapshot()?;
        tracing::info!("Exchange store closed gracefully");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditAction, EntryKind, Role};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_account(email: &str) -> Account {
        Account {
            id: AccountId::generate(),
            name: "Grace".to_string(),
            email: email.to_string(),
            credential_hash: "opaque".to_string(),
            google_id: None,
            facebook_id: None,
            bio: None,
            credits: 5,
            role: Role::User,
            enrolled_courses: vec![],
            completed_courses: vec![],
            created_courses: vec![],
            skills_to_teach: vec![],
            skills_to_learn: vec![],
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn insert(storage: &Storage, account: &Account) {
        let mut batch = WriteBatch::new("test");
        batch.put_account(account.clone());
        storage.apply(batch).unwrap();
    }

    #[test]
    fn test_insert_and_get_account() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account("grace@example.com");
        insert(&storage, &account);

        let stored = storage.get_account(account.id).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(
            storage.find_account_by_email("GRACE@example.com").unwrap().id,
            account.id
        );
    }

    #[test]
    fn test_stale_version_rejected() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account("grace@example.com");
        insert(&storage, &account);

        let first = storage.get_account(account.id).unwrap();
        let second = first.clone();

        let mut batch = WriteBatch::new("first");
        batch.put_account(Account { credits: 4, ..first });
        storage.apply(batch).unwrap();

        let mut batch = WriteBatch::new("second");
        batch.put_account(Account { credits: 3, ..second });
        assert!(matches!(storage.apply(batch), Err(Error::Conflict(_))));

        assert_eq!(storage.get_account(account.id).unwrap().credits, 4);
    }

    #[test]
    fn test_failed_batch_writes_nothing() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account("grace@example.com");
        insert(&storage, &account);
        let seq = storage.commit_seq();

        let mut stale = storage.get_account(account.id).unwrap();
        stale.version = 0;

        let mut batch = WriteBatch::new("partial");
        batch
            .append_ledger(LedgerEntry::new(account.id, -1, EntryKind::Spend, "x"))
            .put_account(stale);
        assert!(storage.apply(batch).is_err());

        assert!(storage.ledger_entries(account.id).is_empty());
        assert_eq!(storage.commit_seq(), seq);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        insert(&storage, &test_account("dup@example.com"));

        let mut batch = WriteBatch::new("register");
        batch.put_account(test_account("Dup@Example.com"));
        assert!(matches!(storage.apply(batch), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_audit_entries_are_chained() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let admin = AccountId::generate();

        for i in 0..3 {
            let mut batch = WriteBatch::new("audit");
            batch.append_audit(AuditDraft::new(
                admin,
                None,
                AuditAction::CourseDelete,
                format!("Deleted course {}", i),
            ));
            storage.apply(batch).unwrap();
        }

        let chain = storage.audit_chain();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].previous_hash, genesis_hash());
        assert_eq!(chain[1].previous_hash, chain[0].entry_hash);
        assert!(crate::audit::verify_chain(&chain).is_ok());

        let latest = storage.audit_entries(2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].entry_id, chain[2].entry_id);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (config, _temp) = test_config();
        let account = test_account("persist@example.com");

        {
            let storage = Storage::open(&config).unwrap();
            insert(&storage, &account);
            let mut batch = WriteBatch::new("ledger");
            batch.append_ledger(LedgerEntry::new(account.id, 5, EntryKind::Bonus, "Welcome"));
            storage.apply(batch).unwrap();
            storage.close().unwrap();
        }

        let reopened = Storage::open(&config).unwrap();
        assert_eq!(reopened.get_account(account.id).unwrap().credits, 5);
        assert_eq!(reopened.ledger_entries(account.id).len(), 1);
        assert_eq!(reopened.commit_seq(), 2);
    }

    #[test]
    fn test_stats() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        insert(&storage, &test_account("a@example.com"));
        insert(&storage, &test_account("b@example.com"));

        let stats = storage.stats();
        assert_eq!(stats.users, 2);
        assert_eq!(stats.courses, 0);
        assert_eq!(stats.circulating_credits, 10);
    }

    #[test]
    fn test_stats_saturate_on_huge_balances() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        for email in ["a@example.com", "b@example.com"] {
            let mut account = test_account(email);
            account.credits = i64::MAX - 1;
            insert(&storage, &account);
        }

        assert_eq!(storage.stats().circulating_credits, i64::MAX);
    }
}

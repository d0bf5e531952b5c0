//! Core types for the exchange
//!
//! All types are designed for:
//! - Deterministic serialization (bincode snapshots, JSON over the wire)
//! - Exact integer arithmetic for credits
//! - Optimistic concurrency (every stored document carries a `version`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh, time-ordered account ID
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Course identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseId(Uuid);

impl CourseId {
    /// Generate a fresh, time-ordered course ID
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CourseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Platform role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular learner / mentor
    User,
    /// Platform administrator
    Admin,
    /// Root administrator, immutable to every admin pathway
    Superadmin,
}

impl Role {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Admins and superadmins administer; they never learn
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }

    /// True when this role satisfies a minimum-role requirement
    pub fn satisfies(&self, minimum: Role) -> bool {
        *self >= minimum
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(crate::Error::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated caller, passed explicitly into every operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account the caller authenticated as
    pub id: AccountId,
    /// Role carried by the caller's credential
    pub role: Role,
}

impl Identity {
    /// Create a new identity
    pub fn new(id: AccountId, role: Role) -> Self {
        Self { id, role }
    }

    /// Fail with `Forbidden` unless the identity holds at least `minimum`
    pub fn require(&self, minimum: Role) -> crate::Result<()> {
        if self.role.satisfies(minimum) {
            Ok(())
        } else {
            Err(crate::Error::Forbidden(format!(
                "This action requires the {} role",
                minimum
            )))
        }
    }
}

/// Self-declared skill level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proficiency {
    /// Beginner
    Beginner,
    /// Intermediate
    Intermediate,
    /// Expert
    Expert,
}

/// A skill an account offers to teach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillOffer {
    /// Skill name, matched exactly against want-lists
    pub skill_name: String,
    /// Declared proficiency
    pub proficiency: Proficiency,
}

/// Derived membership of a learner in a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentState {
    /// Never enrolled
    NotEnrolled,
    /// Paid and in progress
    Enrolled,
    /// Finished, mentor rewarded (terminal)
    Completed,
}

/// Registered account with its embedded credit balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// Unique e-mail address
    pub email: String,
    /// Opaque credential produced by the authentication provider
    pub credential_hash: String,
    /// Federated Google subject
    pub google_id: Option<String>,
    /// Federated Facebook subject
    pub facebook_id: Option<String>,
    /// Free-form biography
    pub bio: Option<String>,
    /// Credit balance
    pub credits: i64,
    /// Role
    pub role: Role,
    /// Courses paid for and in progress
    pub enrolled_courses: Vec<CourseId>,
    /// Courses finished
    pub completed_courses: Vec<CourseId>,
    /// Courses this account instructs
    pub created_courses: Vec<CourseId>,
    /// Teach-list
    pub skills_to_teach: Vec<SkillOffer>,
    /// Want-list
    pub skills_to_learn: Vec<String>,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter (0 = never stored)
    pub version: u64,
}

impl Account {
    /// Current relation of this account to `course`
    pub fn enrollment_state(&self, course: CourseId) -> EnrollmentState {
        if self.completed_courses.contains(&course) {
            EnrollmentState::Completed
        } else if self.enrolled_courses.contains(&course) {
            EnrollmentState::Enrolled
        } else {
            EnrollmentState::NotEnrolled
        }
    }

    /// True when this account teaches `skill`
    pub fn teaches(&self, skill: &str) -> bool {
        self.skills_to_teach.iter().any(|s| s.skill_name == skill)
    }

    /// True when this account wants to learn `skill`
    pub fn wants(&self, skill: &str) -> bool {
        self.skills_to_learn.iter().any(|s| s == skill)
    }
}

/// Lesson within a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson title
    pub title: String,
    /// Video or other media reference
    #[serde(default)]
    pub media_ref: Option<String>,
    /// Markdown or plain-text body
    #[serde(default)]
    pub content: Option<String>,
    /// Human-readable duration
    #[serde(default)]
    pub duration: Option<String>,
}

/// Course in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Course ID
    pub id: CourseId,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Thumbnail URL
    pub thumbnail: String,
    /// Category
    pub category: String,
    /// Owning instructor
    pub instructor: AccountId,
    /// Ordered lessons
    pub lessons: Vec<Lesson>,
    /// Roster of learners who paid for this course
    pub enrolled_students: Vec<AccountId>,
    /// Enrollment price in credits
    pub cost: i64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter (0 = never stored)
    pub version: u64,
}

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Mentor reward
    Earn,
    /// Enrollment payment
    Spend,
    /// Completion marker, purchase, grant or adjustment
    Bonus,
}

/// Immutable record of a balance-affecting event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,
    /// Account the entry belongs to
    pub user: AccountId,
    /// Signed credit delta
    pub amount: i64,
    /// Entry kind
    pub kind: EntryKind,
    /// Human-readable description
    pub description: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a new entry stamped with the current time
    pub fn new(user: AccountId, amount: i64, kind: EntryKind, description: impl Into<String>) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            user,
            amount,
            kind,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Privileged action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Balance changed by an admin
    CreditAdjustment,
    /// Role changed by a superadmin
    RoleUpdate,
    /// Course removed by an admin
    CourseDelete,
}

impl AuditAction {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreditAdjustment => "CREDIT_ADJUSTMENT",
            AuditAction::RoleUpdate => "ROLE_UPDATE",
            AuditAction::CourseDelete => "COURSE_DELETE",
        }
    }
}

/// Immutable audit trail record, hash-chained to its predecessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
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
    /// Hash of the previous entry (hex, all zeros for the first)
    pub previous_hash: String,
    /// Hash of this entry (hex)
    pub entry_hash: String,
}

/// Aggregated platform numbers for administrators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    /// Registered accounts
    pub users: u64,
    /// Courses in the catalog
    pub courses: u64,
    /// Sum of all balances
    pub circulating_credits: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: AccountId::generate(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            credential_hash: String::new(),
            google_id: None,
            facebook_id: None,
            bio: None,
            credits: 5,
            role: Role::User,
            enrolled_courses: vec![],
            completed_courses: vec![],
            created_courses: vec![],
            skills_to_teach: vec![SkillOffer {
                skill_name: "Rust".to_string(),
                proficiency: Proficiency::Expert,
            }],
            skills_to_learn: vec!["Guitar".to_string()],
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Superadmin.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(!Role::User.satisfies(Role::Admin));
        assert!(!Role::Admin.satisfies(Role::Superadmin));
        assert!(Role::Admin.is_privileged());
        assert!(!Role::User.is_privileged());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Superadmin).unwrap(), "\"superadmin\"");
        assert_eq!(
            serde_json::to_string(&AuditAction::CreditAdjustment).unwrap(),
            "\"CREDIT_ADJUSTMENT\""
        );
    }

    #[test]
    fn test_enrollment_state() {
        let mut acc = account();
        let course = CourseId::generate();
        assert_eq!(acc.enrollment_state(course), EnrollmentState::NotEnrolled);

        acc.enrolled_courses.push(course);
        assert_eq!(acc.enrollment_state(course), EnrollmentState::Enrolled);

        acc.enrolled_courses.clear();
        acc.completed_courses.push(course);
        assert_eq!(acc.enrollment_state(course), EnrollmentState::Completed);
    }

    #[test]
    fn test_identity_require() {
        let admin = Identity::new(AccountId::generate(), Role::Admin);
        assert!(admin.require(Role::Admin).is_ok());
        assert!(matches!(
            admin.require(Role::Superadmin),
            Err(crate::Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_skill_predicates() {
        let acc = account();
        assert!(acc.teaches("Rust"));
        assert!(!acc.teaches("Guitar"));
        assert!(acc.wants("Guitar"));
    }
}

//! SkillSwap Exchange Core
//!
//! Credit ledger and course lifecycle for a skill-exchange platform.
//!
//! # Architecture
//!
//! - **Single Writer**: One commit actor applies every mutation
//! - **Optimistic Concurrency**: Versioned documents, conflicts retried against fresh state
//! - **Atomic Batches**: Each orchestration commits one batch or nothing
//! - **Audit Chain**: Admin overrides are hash-chained in the same batch as the change
//!
//! # Invariants
//!
//! - No learner pathway drives a balance negative
//! - A learner is enrolled in or has completed a course, never both
//! - A mentor is rewarded exactly once per completion
//! - No admin pathway alters a superadmin's role or balance

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accounts;
pub mod actor;
pub mod admin;
pub mod audit;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod exchange;
pub mod matching;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use exchange::Exchange;
pub use metrics::Metrics;
pub use types::{
    Account, AccountId, AuditAction, AuditLogEntry, Course, CourseId, EntryKind, EnrollmentState,
    Identity, LedgerEntry, Lesson, PlatformStats, Proficiency, Role, SkillOffer,
};

//! Admin override layer
//!
//! Privileged mutations of balances, roles and courses. Every successful
//! override stages exactly one audit draft in the same batch as the change
//! it records, so the mutation and its audit entry commit together or not
//! at all. Superadmin accounts are out of reach of every override.

use crate::{
    accounts::AccountView,
    audit::{verify_chain, AuditDraft},
    exchange::Exchange,
    storage::WriteBatch,
    types::{
        AccountId, AuditAction, AuditLogEntry, CourseId, EnrollmentState, EntryKind, Identity,
        LedgerEntry, PlatformStats, Role,
    },
    Error, Result,
};
use serde::Serialize;

/// Audit entries returned by the log listing
pub const AUDIT_LOG_LIMIT: usize = 100;

/// Outcome of a credit adjustment
#[derive(Debug, Clone, Serialize)]
pub struct CreditAdjustment {
    /// Adjusted account
    pub target: AccountId,
    /// Target display name
    pub name: String,
    /// Balance after the adjustment
    pub new_balance: i64,
}

/// Account reference embedded in audit views
#[derive(Debug, Clone, Serialize)]
pub struct PartyRef {
    /// Account ID
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// E-mail
    pub email: String,
}

/// Audit entry with acting admin and target resolved
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogView {
    /// Stored entry
    #[serde(flatten)]
    pub entry: AuditLogEntry,
    /// Acting admin, when the account still exists
    pub admin: Option<PartyRef>,
    /// Target account, when present and still existing
    pub target_account: Option<PartyRef>,
}

fn protect_superadmin(role: Role) -> Result<()> {
    if role == Role::Superadmin {
        return Err(Error::Forbidden("Superadmin accounts cannot be modified".to_string()));
    }
    Ok(())
}

impl Exchange {
    fn party(&self, id: AccountId) -> Option<PartyRef> {
        self.storage.get_account(id).ok().map(|a| PartyRef {
            id: a.id,
            name: a.name,
            email: a.email,
        })
    }

    /// Add `amount` (possibly negative) to a user's balance
    ///
    /// Requires admin. Rejects superadmin targets, zero amounts and results
    /// below zero; nothing is clamped.
    pub async fn adjust_credits(
        &self,
        identity: &Identity,
        target: AccountId,
        amount: i64,
        reason: Option<&str>,
    ) -> Result<CreditAdjustment> {
        identity.require(Role::Admin)?;
        if amount == 0 {
            return Err(Error::InvalidOperation("Adjustment amount cannot be zero".to_string()));
        }
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("No reason provided");

        let (outcome, _) = self
            .commit_planned("adjust_credits", |storage| {
                let mut account = storage.get_account(target)?;
                protect_superadmin(account.role)?;

                let new_balance = account
                    .credits
                    .checked_add(amount)
                    .ok_or_else(|| Error::InvalidOperation("Balance overflow".to_string()))?;
                if new_balance < 0 {
                    return Err(Error::InvalidOperation(format!(
                        "Adjustment would leave a negative balance ({})",
                        new_balance
                    )));
                }
                account.credits = new_balance;

                let outcome = CreditAdjustment {
                    target,
                    name: account.name.clone(),
                    new_balance,
                };

                let mut batch = WriteBatch::new("adjust_credits");
                batch
                    .append_ledger(LedgerEntry::new(
                        target,
                        amount,
                        EntryKind::Bonus,
                        format!("Admin adjustment: {}", reason),
                    ))
                    .append_audit(AuditDraft::new(
                        identity.id,
                        Some(target),
                        AuditAction::CreditAdjustment,
                        format!("Adjusted credits by {}. Reason: {}", amount, reason),
                    ))
                    .put_account(account);
                Ok((outcome, batch))
            })
            .await?;

        self.metrics.record_override(AuditAction::CreditAdjustment.as_str());
        tracing::info!(
            admin = %identity.id,
            target = %target,
            amount,
            new_balance = outcome.new_balance,
            "Credits adjusted"
        );
        Ok(outcome)
    }

    /// Change a user's role
    ///
    /// Requires superadmin. Nobody can be promoted to superadmin and an
    /// existing superadmin cannot be changed. Accounts with courses in
    /// progress cannot be promoted, since admins never hold enrollments.
    pub async fn update_role(
        &self,
        identity: &Identity,
        target: AccountId,
        new_role: Role,
    ) -> Result<AccountView> {
        identity.require(Role::Superadmin)?;
        if new_role == Role::Superadmin {
            return Err(Error::Forbidden("Cannot promote to superadmin".to_string()));
        }

        let (previous, _) = self
            .commit_planned("update_role", |storage| {
                let mut account = storage.get_account(target)?;
                protect_superadmin(account.role)?;

                if new_role.is_privileged() && !account.enrolled_courses.is_empty() {
                    return Err(Error::InvalidOperation(format!(
                        "User has {} course(s) in progress",
                        account.enrolled_courses.len()
                    )));
                }

                let previous = account.role;
                account.role = new_role;

                let mut batch = WriteBatch::new("update_role");
                batch
                    .append_audit(AuditDraft::new(
                        identity.id,
                        Some(target),
                        AuditAction::RoleUpdate,
                        format!("Changed role to {}", new_role),
                    ))
                    .put_account(account);
                Ok((previous, batch))
            })
            .await?;

        self.metrics.record_override(AuditAction::RoleUpdate.as_str());
        tracing::info!(
            admin = %identity.id,
            target = %target,
            from = %previous,
            to = %new_role,
            "Role updated"
        );
        self.storage.get_account(target).map(AccountView::from)
    }

    /// Remove a course from the catalog and from its instructor's list
    ///
    /// Learners still enrolled are dropped from the course and refunded its
    /// cost in the same commit. Completed learners keep the ID in their
    /// history; course lookups skip courses that no longer exist.
    pub async fn delete_course(&self, identity: &Identity, course_id: CourseId) -> Result<()> {
        identity.require(Role::Admin)?;

        let (title, _) = self
            .commit_planned("delete_course", |storage| {
                let course = storage.get_course(course_id)?;

                let mut batch = WriteBatch::new("delete_course");
                match storage.get_account(course.instructor) {
                    Ok(mut instructor) => {
                        instructor.created_courses.retain(|c| *c != course_id);
                        batch.put_account(instructor);
                    }
                    Err(Error::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }

                for student in &course.enrolled_students {
                    let mut learner = match storage.get_account(*student) {
                        Ok(learner) => learner,
                        Err(Error::NotFound(_)) => continue,
                        Err(e) => return Err(e),
                    };
                    if learner.enrollment_state(course_id) != EnrollmentState::Enrolled {
                        continue;
                    }

                    learner.enrolled_courses.retain(|c| *c != course_id);
                    learner.credits = learner.credits.checked_add(course.cost).ok_or_else(|| {
                        Error::InvalidOperation("Refund would overflow learner balance".to_string())
                    })?;
                    batch
                        .append_ledger(LedgerEntry::new(
                            learner.id,
                            course.cost,
                            EntryKind::Bonus,
                            format!("Refund for deleted course: {}", course.title),
                        ))
                        .put_account(learner);
                }

                batch
                    .delete_course(course_id, course.version)
                    .append_audit(AuditDraft::new(
                        identity.id,
                        None,
                        AuditAction::CourseDelete,
                        format!("Deleted course: {} (ID: {})", course.title, course_id),
                    ));
                Ok((course.title, batch))
            })
            .await?;

        self.metrics.record_override(AuditAction::CourseDelete.as_str());
        tracing::info!(admin = %identity.id, course_id = %course_id, %title, "Course deleted");
        Ok(())
    }

    /// Operator-only: make the account registered under `email` a superadmin
    ///
    /// Not reachable over HTTP. The audit entry names the account itself as
    /// the actor since no admin identity exists yet.
    pub async fn grant_superadmin(&self, email: &str) -> Result<AccountView> {
        let (id, _) = self
            .commit_planned("grant_superadmin", |storage| {
                let mut account = storage
                    .find_account_by_email(email)
                    .ok_or_else(|| Error::account_not_found(email))?;
                if account.role == Role::Superadmin {
                    return Err(Error::InvalidOperation("Already a superadmin".to_string()));
                }
                if !account.enrolled_courses.is_empty() {
                    return Err(Error::InvalidOperation(format!(
                        "User has {} course(s) in progress",
                        account.enrolled_courses.len()
                    )));
                }

                account.role = Role::Superadmin;
                let id = account.id;

                let mut batch = WriteBatch::new("grant_superadmin");
                batch
                    .append_audit(AuditDraft::new(
                        id,
                        Some(id),
                        AuditAction::RoleUpdate,
                        "Changed role to superadmin (operator grant)",
                    ))
                    .put_account(account);
                Ok((id, batch))
            })
            .await?;

        self.metrics.record_override(AuditAction::RoleUpdate.as_str());
        tracing::warn!(account_id = %id, "Superadmin granted by operator");
        self.storage.get_account(id).map(AccountView::from)
    }

    /// All accounts, newest first
    pub fn list_users(&self, identity: &Identity) -> Result<Vec<AccountView>> {
        identity.require(Role::Admin)?;
        let mut accounts = self.storage.list_accounts();
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(accounts.into_iter().map(AccountView::from).collect())
    }

    /// Users, courses and circulating credits
    pub fn platform_stats(&self, identity: &Identity) -> Result<PlatformStats> {
        identity.require(Role::Admin)?;
        Ok(self.storage.stats())
    }

    /// Latest audit entries, newest first
    pub fn audit_logs(&self, identity: &Identity) -> Result<Vec<AuditLogView>> {
        identity.require(Role::Superadmin)?;
        Ok(self
            .storage
            .audit_entries(AUDIT_LOG_LIMIT)
            .into_iter()
            .map(|entry| AuditLogView {
                admin: self.party(entry.acting_admin),
                target_account: entry.target.and_then(|t| self.party(t)),
                entry,
            })
            .collect())
    }

    /// Check the whole audit chain, returning its length
    pub fn verify_audit_chain(&self, identity: &Identity) -> Result<usize> {
        identity.require(Role::Superadmin)?;
        let chain = self.storage.audit_chain();
        verify_chain(&chain).map_err(|e| {
            tracing::error!("Audit chain verification failed: {}", e);
            e
        })?;
        Ok(chain.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::new_course;
    use crate::exchange::test_support::*;

    #[tokio::test]
    async fn test_adjust_credits() {
        let (exchange, _temp) = open_exchange().await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;
        let user = register(&exchange, "User").await;

        let outcome = exchange
            .adjust_credits(&admin, user.id, 10, Some("Workshop prize"))
            .await
            .unwrap();
        assert_eq!(outcome.new_balance, 15);

        let history = exchange.transactions(&identity(&user)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 10);

        let chain = exchange.storage().audit_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].action, AuditAction::CreditAdjustment);
        assert_eq!(chain[0].details, "Adjusted credits by 10. Reason: Workshop prize");
        assert_eq!(chain[0].target, Some(user.id));
    }

    #[tokio::test]
    async fn test_adjust_rejects_negative_result_and_zero() {
        let (exchange, _temp) = open_exchange().await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;
        let user = register(&exchange, "User").await;

        assert!(matches!(
            exchange.adjust_credits(&admin, user.id, -6, None).await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            exchange.adjust_credits(&admin, user.id, 0, None).await,
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(exchange.storage().get_account(user.id).unwrap().credits, 5);
        assert!(exchange.storage().audit_chain().is_empty());

        let outcome = exchange.adjust_credits(&admin, user.id, -5, None).await.unwrap();
        assert_eq!(outcome.new_balance, 0);
        assert_eq!(
            exchange.storage().audit_chain()[0].details,
            "Adjusted credits by -5. Reason: No reason provided"
        );
    }

    #[tokio::test]
    async fn test_superadmin_is_untouchable() {
        let (exchange, _temp) = open_exchange().await;
        let root = seed_with_role(&exchange, "Root", Role::Superadmin).await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;

        assert!(matches!(
            exchange.adjust_credits(&admin, root.id, 100, None).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            exchange.adjust_credits(&root, root.id, 100, None).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            exchange.update_role(&root, root.id, Role::User).await,
            Err(Error::Forbidden(_))
        ));

        assert!(exchange.storage().audit_chain().is_empty());
        assert!(exchange.storage().ledger_entries(root.id).is_empty());
        assert_eq!(exchange.storage().get_account(root.id).unwrap().credits, 5);
    }

    #[tokio::test]
    async fn test_update_role() {
        let (exchange, _temp) = open_exchange().await;
        let root = seed_with_role(&exchange, "Root", Role::Superadmin).await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;
        let user = register(&exchange, "User").await;

        // Admins cannot change roles
        assert!(matches!(
            exchange.update_role(&admin, user.id, Role::Admin).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            exchange.update_role(&root, user.id, Role::Superadmin).await,
            Err(Error::Forbidden(_))
        ));

        let promoted = exchange.update_role(&root, user.id, Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let chain = exchange.storage().audit_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].action, AuditAction::RoleUpdate);
        assert_eq!(chain[0].details, "Changed role to admin");
    }

    #[tokio::test]
    async fn test_cannot_promote_active_learner() {
        let (exchange, _temp) = open_exchange().await;
        let root = seed_with_role(&exchange, "Root", Role::Superadmin).await;
        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();
        exchange.enroll(&identity(&learner), course.id).await.unwrap();

        assert!(matches!(
            exchange.update_role(&root, learner.id, Role::Admin).await,
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(
            exchange.storage().get_account(learner.id).unwrap().role,
            Role::User
        );
    }

    #[tokio::test]
    async fn test_delete_course() {
        let (exchange, _temp) = open_exchange().await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;
        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();
        exchange.enroll(&identity(&learner), course.id).await.unwrap();

        exchange.delete_course(&admin, course.id).await.unwrap();

        // Enrolled learner is dropped from the course and refunded
        let stored_learner = exchange.storage().get_account(learner.id).unwrap();
        assert!(stored_learner.enrolled_courses.is_empty());
        assert_eq!(stored_learner.credits, 5);
        let history = exchange.transactions(&identity(&learner)).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .any(|e| e.amount == 1 && e.description == "Refund for deleted course: Rust 101"));
        assert!(matches!(
            exchange.complete(&identity(&learner), course.id).await,
            Err(Error::NotFound(_))
        ));

        assert!(matches!(
            exchange.storage().get_course(course.id),
            Err(Error::NotFound(_))
        ));
        assert!(exchange
            .storage()
            .get_account(mentor.id)
            .unwrap()
            .created_courses
            .is_empty());

        let chain = exchange.storage().audit_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].action, AuditAction::CourseDelete);
        assert_eq!(
            chain[0].details,
            format!("Deleted course: Rust 101 (ID: {})", course.id)
        );

        assert!(matches!(
            exchange.delete_course(&admin, course.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            exchange.delete_course(&identity(&mentor), course.id).await,
            Err(Error::Forbidden(_))
        ));

        // Nothing in progress any more, so promotion goes through
        let root = seed_with_role(&exchange, "Root", Role::Superadmin).await;
        exchange
            .update_role(&root, learner.id, Role::Admin)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_grant_superadmin() {
        let (exchange, _temp) = open_exchange().await;
        let owner = register(&exchange, "Owner").await;

        let granted = exchange.grant_superadmin("owner@example.com").await.unwrap();
        assert_eq!(granted.role, Role::Superadmin);
        assert!(matches!(
            exchange.grant_superadmin("owner@example.com").await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            exchange.grant_superadmin("nobody@example.com").await,
            Err(Error::NotFound(_))
        ));

        let chain = exchange.storage().audit_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].acting_admin, owner.id);
    }

    #[tokio::test]
    async fn test_introspection_and_chain() {
        let (exchange, _temp) = open_exchange().await;
        let root = seed_with_role(&exchange, "Root", Role::Superadmin).await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;
        let user = register(&exchange, "User").await;

        exchange.adjust_credits(&admin, user.id, 3, None).await.unwrap();
        exchange.adjust_credits(&admin, user.id, -1, None).await.unwrap();

        let users = exchange.list_users(&admin).unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].id, user.id);

        let stats = exchange.platform_stats(&admin).unwrap();
        assert_eq!(stats.users, 3);
        assert_eq!(stats.circulating_credits, 17);

        assert!(matches!(exchange.audit_logs(&admin), Err(Error::Forbidden(_))));
        let logs = exchange.audit_logs(&root).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].entry.details, "Adjusted credits by -1. Reason: No reason provided");
        assert_eq!(logs[0].admin.as_ref().unwrap().name, "Admin");
        assert_eq!(logs[0].target_account.as_ref().unwrap().id, user.id);

        assert_eq!(exchange.verify_audit_chain(&root).unwrap(), 2);
        assert!(matches!(
            exchange.list_users(&identity(&user)),
            Err(Error::Forbidden(_))
        ));
    }
}

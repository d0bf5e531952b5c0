//! Account lifecycle and self-service operations
//!
//! Registration (credential and federated), profile views and updates,
//! ledger history, trusted credit purchase and the opening-balance backfill.

use crate::{
    exchange::Exchange,
    storage::WriteBatch,
    types::{
        Account, AccountId, Course, CourseId, EntryKind, Identity, LedgerEntry, Role, SkillOffer,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ledger description of the opening-balance entry
pub const OPENING_BALANCE_DESCRIPTION: &str = "Initial Balance Migration";

/// Input for a credential registration
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Display name
    pub name: String,
    /// E-mail, unique across accounts
    pub email: String,
    /// Credential already hashed by the authentication provider
    pub credential_hash: String,
    /// Teach-list
    pub skills_to_teach: Vec<SkillOffer>,
    /// Want-list
    pub skills_to_learn: Vec<String>,
}

/// Federated identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedProvider {
    /// Google Sign-In
    Google,
    /// Facebook Login
    Facebook,
}

/// Verified profile returned by a federated provider
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    /// Provider that vouched for the profile
    pub provider: FederatedProvider,
    /// Provider subject ID
    pub subject: String,
    /// Verified e-mail
    pub email: String,
    /// Display name
    pub name: String,
}

/// Partial profile update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New display name
    pub name: Option<String>,
    /// New e-mail
    pub email: Option<String>,
    /// New biography
    pub bio: Option<String>,
    /// Replacement teach-list
    pub skills_to_teach: Option<Vec<SkillOffer>>,
    /// Replacement want-list
    pub skills_to_learn: Option<Vec<String>>,
}

/// Account as shown to its owner and to admins (no credential)
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct AccountView {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub credits: i64,
    pub role: Role,
    pub enrolled_courses: Vec<CourseId>,
    pub completed_courses: Vec<CourseId>,
    pub created_courses: Vec<CourseId>,
    pub skills_to_teach: Vec<SkillOffer>,
    pub skills_to_learn: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            bio: account.bio,
            credits: account.credits,
            role: account.role,
            enrolled_courses: account.enrolled_courses,
            completed_courses: account.completed_courses,
            created_courses: account.created_courses,
            skills_to_teach: account.skills_to_teach,
            skills_to_learn: account.skills_to_learn,
            created_at: account.created_at,
        }
    }
}

/// Public profile, visible without authentication
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct PublicProfile {
    pub id: AccountId,
    pub name: String,
    pub bio: Option<String>,
    pub role: Role,
    pub skills_to_teach: Vec<SkillOffer>,
    pub skills_to_learn: Vec<String>,
    pub created_courses: Vec<CourseId>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for PublicProfile {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            bio: account.bio,
            role: account.role,
            skills_to_teach: account.skills_to_teach,
            skills_to_learn: account.skills_to_learn,
            created_courses: account.created_courses,
            created_at: account.created_at,
        }
    }
}

/// Minimal course card used on dashboards
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub category: String,
    pub thumbnail: String,
    pub cost: i64,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            category: course.category.clone(),
            thumbnail: course.thumbnail.clone(),
            cost: course.cost,
        }
    }
}

/// Learner and mentor overview for the caller
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct Dashboard {
    pub credits: i64,
    pub enrolled: Vec<CourseSummary>,
    pub completed: Vec<CourseSummary>,
    pub teaching: Vec<CourseSummary>,
}

/// Self view: account plus the courses it references
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct SelfView {
    #[serde(flatten)]
    pub account: AccountView,
    pub enrolled_course_details: Vec<CourseSummary>,
    pub completed_course_details: Vec<CourseSummary>,
}

fn summaries(courses: &[Course]) -> Vec<CourseSummary> {
    courses.iter().map(CourseSummary::from).collect()
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_email(value: &str) -> Result<()> {
    require_text("email", value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(Error::Validation(format!("Invalid email: {}", value))),
    }
}

impl Exchange {
    fn fresh_account(&self, name: String, email: String, credential_hash: String) -> Account {
        Account {
            id: AccountId::generate(),
            name,
            email: email.trim().to_string(),
            credential_hash,
            google_id: None,
            facebook_id: None,
            bio: None,
            credits: self.config.economy.signup_credits,
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

    async fn insert_account(&self, account: Account) -> Result<Account> {
        let id = account.id;
        let mut batch = WriteBatch::new("register");
        batch.put_account(account);
        self.handle.commit(batch).await?;

        self.metrics.record_registration();
        tracing::info!(account_id = %id, "Account registered");

        self.storage.get_account(id)
    }

    /// Register a credential account
    ///
    /// Starts with the configured signup credits and the `user` role.
    /// Fails with `InvalidOperation("User already exists")` on a taken e-mail.
    pub async fn register(&self, new: NewAccount) -> Result<Account> {
        require_text("name", &new.name)?;
        require_email(&new.email)?;

        if self.storage.find_account_by_email(&new.email).is_some() {
            return Err(Error::InvalidOperation("User already exists".to_string()));
        }

        let mut account = self.fresh_account(new.name, new.email, new.credential_hash);
        account.skills_to_teach = new.skills_to_teach;
        account.skills_to_learn = new.skills_to_learn;

        self.insert_account(account).await
    }

    /// Resolve a federated profile to an account, creating it on first login
    ///
    /// `fallback_credential` is stored for newly created accounts so they
    /// cannot log in with a password until they set one.
    pub async fn federated_login(
        &self,
        profile: FederatedProfile,
        fallback_credential: String,
    ) -> Result<Account> {
        require_email(&profile.email)?;

        if let Some(existing) = self.storage.find_account_by_email(&profile.email) {
            tracing::debug!(account_id = %existing.id, provider = ?profile.provider, "Federated login");
            return Ok(existing);
        }

        let name = if profile.name.trim().is_empty() {
            profile.email.clone()
        } else {
            profile.name
        };
        let mut account = self.fresh_account(name, profile.email, fallback_credential);
        match profile.provider {
            FederatedProvider::Google => account.google_id = Some(profile.subject),
            FederatedProvider::Facebook => account.facebook_id = Some(profile.subject),
        }
        let email = account.email.clone();

        match self.insert_account(account).await {
            // A concurrent first login created it
            Err(Error::InvalidOperation(_)) => self
                .storage
                .find_account_by_email(&email)
                .ok_or_else(|| Error::account_not_found(email)),
            other => other,
        }
    }

    /// Look up an account by e-mail (credential login)
    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        self.storage.find_account_by_email(email)
    }

    /// Caller's own account with course details
    pub fn me(&self, identity: &Identity) -> Result<SelfView> {
        let account = self.storage.get_account(identity.id)?;
        let enrolled = self.storage.get_courses(&account.enrolled_courses);
        let completed = self.storage.get_courses(&account.completed_courses);

        Ok(SelfView {
            account: account.into(),
            enrolled_course_details: summaries(&enrolled),
            completed_course_details: summaries(&completed),
        })
    }

    /// Enrolled, completed and teaching courses plus balance
    pub fn dashboard(&self, identity: &Identity) -> Result<Dashboard> {
        let account = self.storage.get_account(identity.id)?;

        Ok(Dashboard {
            credits: account.credits,
            enrolled: summaries(&self.storage.get_courses(&account.enrolled_courses)),
            completed: summaries(&self.storage.get_courses(&account.completed_courses)),
            teaching: summaries(&self.storage.get_courses(&account.created_courses)),
        })
    }

    /// Public profile of any account
    pub fn public_profile(&self, id: AccountId) -> Result<PublicProfile> {
        self.storage.get_account(id).map(PublicProfile::from)
    }

    /// Update the caller's own profile
    pub async fn update_profile(&self, identity: &Identity, update: ProfileUpdate) -> Result<Account> {
        if let Some(name) = &update.name {
            require_text("name", name)?;
        }
        if let Some(email) = &update.email {
            require_email(email)?;
        }

        let (id, _) = self
            .commit_planned("update_profile", |storage| {
                let mut account = storage.get_account(identity.id)?;
                if let Some(name) = &update.name {
                    account.name = name.trim().to_string();
                }
                if let Some(email) = &update.email {
                    account.email = email.trim().to_string();
                }
                if let Some(bio) = &update.bio {
                    account.bio = Some(bio.clone());
                }
                if let Some(teach) = &update.skills_to_teach {
                    account.skills_to_teach = teach.clone();
                }
                if let Some(learn) = &update.skills_to_learn {
                    account.skills_to_learn = learn.clone();
                }

                let id = account.id;
                let mut batch = WriteBatch::new("update_profile");
                batch.put_account(account);
                Ok((id, batch))
            })
            .await?;

        tracing::debug!(account_id = %id, "Profile updated");
        self.storage.get_account(id)
    }

    /// Caller's ledger history, newest first
    pub fn transactions(&self, identity: &Identity) -> Result<Vec<LedgerEntry>> {
        // Surface NotFound for deleted or unknown callers
        self.storage.get_account(identity.id)?;
        Ok(self.storage.ledger_entries(identity.id))
    }

    /// Trusted top-up, returns the new balance
    pub async fn purchase_credits(
        &self,
        identity: &Identity,
        amount: i64,
        bundle_name: &str,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::Validation(format!(
                "Purchase amount must be positive, got {}",
                amount
            )));
        }
        require_text("bundle name", bundle_name)?;

        let (balance, _) = self
            .commit_planned("purchase_credits", |storage| {
                let mut account = storage.get_account(identity.id)?;
                account.credits = account
                    .credits
                    .checked_add(amount)
                    .ok_or_else(|| Error::Validation("Balance overflow".to_string()))?;
                let balance = account.credits;

                let mut batch = WriteBatch::new("purchase_credits");
                batch
                    .append_ledger(LedgerEntry::new(
                        account.id,
                        amount,
                        EntryKind::Bonus,
                        format!("Purchased {} Bundle", bundle_name),
                    ))
                    .put_account(account);
                Ok((balance, batch))
            })
            .await?;

        tracing::info!(account_id = %identity.id, amount, balance, "Credits purchased");
        Ok(balance)
    }

    /// Give every account without one an opening-balance ledger entry
    ///
    /// The entry equals the account's current balance, so ledger sums line
    /// up with balances for accounts created before the ledger existed.
    /// Re-running is a no-op. Returns the number of accounts migrated.
    pub async fn backfill_opening_balances(&self) -> Result<usize> {
        let mut migrated = 0;

        for account in self.storage.list_accounts() {
            // Account is read before the ledger; the re-put at that version
            // makes a concurrent run that wins the account force a re-read,
            // which then finds its entry and stages nothing.
            let result = self
                .commit_planned("backfill_opening_balance", |storage| {
                    let current = storage.get_account(account.id)?;
                    let mut batch = WriteBatch::new("backfill_opening_balance");
                    let already = storage
                        .ledger_entries(current.id)
                        .iter()
                        .any(|e| e.description == OPENING_BALANCE_DESCRIPTION);
                    if already {
                        return Ok((false, batch));
                    }

                    batch
                        .append_ledger(LedgerEntry::new(
                            current.id,
                            current.credits,
                            EntryKind::Bonus,
                            OPENING_BALANCE_DESCRIPTION,
                        ))
                        .put_account(current);
                    Ok((true, batch))
                })
                .await;

            match result {
                Ok((false, _)) => {}
                Ok((true, _)) => {
                    migrated += 1;
                    tracing::info!(account_id = %account.id, credits = account.credits, "Opening balance recorded");
                }
                Err(e) => {
                    tracing::error!(account_id = %account.id, "Error recording opening balance: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(migrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::test_support::*;
    use crate::types::Proficiency;

    #[tokio::test]
    async fn test_register_defaults() {
        let (exchange, _temp) = open_exchange().await;
        let account = register(&exchange, "Ada").await;

        assert_eq!(account.credits, 5);
        assert_eq!(account.role, Role::User);
        assert_eq!(account.version, 1);
        assert_eq!(exchange.metrics().registrations_total.get(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (exchange, _temp) = open_exchange().await;
        register(&exchange, "Ada").await;

        let err = exchange
            .register(NewAccount {
                name: "Other".to_string(),
                email: "ADA@example.com".to_string(),
                credential_hash: "x".to_string(),
                skills_to_teach: vec![],
                skills_to_learn: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(msg) if msg == "User already exists"));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let (exchange, _temp) = open_exchange().await;
        let err = exchange
            .register(NewAccount {
                name: "Bad".to_string(),
                email: "not-an-email".to_string(),
                credential_hash: "x".to_string(),
                skills_to_teach: vec![],
                skills_to_learn: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_federated_login_creates_once() {
        let (exchange, _temp) = open_exchange().await;
        let profile = FederatedProfile {
            provider: FederatedProvider::Google,
            subject: "g-123".to_string(),
            email: "fed@example.com".to_string(),
            name: "Fed".to_string(),
        };

        let first = exchange
            .federated_login(profile.clone(), "random".to_string())
            .await
            .unwrap();
        let second = exchange
            .federated_login(profile, "other".to_string())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.google_id.as_deref(), Some("g-123"));
        assert_eq!(exchange.storage().stats().users, 1);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (exchange, _temp) = open_exchange().await;
        let account = register(&exchange, "Ada").await;

        let updated = exchange
            .update_profile(
                &identity(&account),
                ProfileUpdate {
                    bio: Some("Systems programmer".to_string()),
                    skills_to_teach: Some(vec![SkillOffer {
                        skill_name: "Rust".to_string(),
                        proficiency: Proficiency::Expert,
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.bio.as_deref(), Some("Systems programmer"));
        assert!(updated.teaches("Rust"));
    }

    #[tokio::test]
    async fn test_update_profile_email_taken() {
        let (exchange, _temp) = open_exchange().await;
        let ada = register(&exchange, "Ada").await;
        register(&exchange, "Grace").await;

        let err = exchange
            .update_profile(
                &identity(&ada),
                ProfileUpdate {
                    email: Some("grace@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_purchase_credits() {
        let (exchange, _temp) = open_exchange().await;
        let account = register(&exchange, "Ada").await;
        let caller = identity(&account);

        let balance = exchange.purchase_credits(&caller, 10, "Starter").await.unwrap();
        assert_eq!(balance, 15);

        let history = exchange.transactions(&caller).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, EntryKind::Bonus);
        assert_eq!(history[0].description, "Purchased Starter Bundle");

        assert!(matches!(
            exchange.purchase_credits(&caller, 0, "Empty").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_backfill_is_idempotent() {
        let (exchange, _temp) = open_exchange().await;
        let ada = register(&exchange, "Ada").await;
        register(&exchange, "Grace").await;

        assert_eq!(exchange.backfill_opening_balances().await.unwrap(), 2);
        assert_eq!(exchange.backfill_opening_balances().await.unwrap(), 0);

        let history = exchange.transactions(&identity(&ada)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 5);
        assert_eq!(history[0].description, OPENING_BALANCE_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_public_profile_unknown() {
        let (exchange, _temp) = open_exchange().await;
        assert!(matches!(
            exchange.public_profile(AccountId::generate()),
            Err(Error::NotFound(_))
        ));
    }
}

//! Skill matching
//!
//! Pairs the caller's want-list against every other account's teach-list.
//! A match is reciprocal when the candidate also wants something the caller
//! teaches. Read-only.

use crate::{
    exchange::Exchange,
    types::{Account, AccountId, Identity, SkillOffer},
    Result,
};
use serde::Serialize;

/// A potential mentor for the caller
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    /// Candidate account
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// E-mail
    pub email: String,
    /// Candidate's teach-list
    pub skills_to_teach: Vec<SkillOffer>,
    /// Candidate's balance
    pub credits: i64,
    /// Candidate wants a skill the caller teaches
    pub reciprocal: bool,
}

/// True when `candidate` teaches something `learner` wants
pub fn is_match(learner: &Account, candidate: &Account) -> bool {
    learner.skills_to_learn.iter().any(|skill| candidate.teaches(skill))
}

/// True when `candidate` wants something `learner` teaches
pub fn is_reciprocal(learner: &Account, candidate: &Account) -> bool {
    learner
        .skills_to_teach
        .iter()
        .any(|offer| candidate.wants(&offer.skill_name))
}

impl Exchange {
    /// Accounts teaching a skill the caller wants, in store order
    pub fn find_matches(&self, identity: &Identity) -> Result<Vec<Match>> {
        let learner = self.storage.get_account(identity.id)?;
        if learner.skills_to_learn.is_empty() {
            return Ok(Vec::new());
        }

        let matches: Vec<Match> = self
            .storage
            .list_accounts()
            .into_iter()
            .filter(|candidate| candidate.id != learner.id && is_match(&learner, candidate))
            .map(|candidate| Match {
                reciprocal: is_reciprocal(&learner, &candidate),
                id: candidate.id,
                name: candidate.name,
                email: candidate.email,
                skills_to_teach: candidate.skills_to_teach,
                credits: candidate.credits,
            })
            .collect();

        tracing::debug!(learner = %identity.id, matches = matches.len(), "Matches computed");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewAccount;
    use crate::exchange::test_support::*;
    use crate::types::Proficiency;

    fn offer(skill: &str) -> SkillOffer {
        SkillOffer {
            skill_name: skill.to_string(),
            proficiency: Proficiency::Intermediate,
        }
    }

    async fn with_skills(exchange: &Exchange, name: &str, teach: &[&str], learn: &[&str]) -> Account {
        exchange
            .register(NewAccount {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                credential_hash: "opaque".to_string(),
                skills_to_teach: teach.iter().map(|s| offer(s)).collect(),
                skills_to_learn: learn.iter().map(|s| s.to_string()).collect(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matches_and_reciprocity() {
        let (exchange, _temp) = open_exchange().await;
        let me = with_skills(&exchange, "Me", &["Rust"], &["Guitar", "Chess"]).await;
        let mutual = with_skills(&exchange, "Mutual", &["Guitar"], &["Rust"]).await;
        let one_way = with_skills(&exchange, "OneWay", &["Chess"], &["Cooking"]).await;
        with_skills(&exchange, "Unrelated", &["Cooking"], &["Rust"]).await;

        let matches = exchange.find_matches(&identity(&me)).unwrap();
        let summary: Vec<(AccountId, bool)> = matches.iter().map(|m| (m.id, m.reciprocal)).collect();
        assert_eq!(summary, vec![(mutual.id, true), (one_way.id, false)]);
    }

    #[tokio::test]
    async fn test_never_matches_self() {
        let (exchange, _temp) = open_exchange().await;
        let me = with_skills(&exchange, "Me", &["Rust"], &["Rust"]).await;

        assert!(exchange.find_matches(&identity(&me)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exact_skill_names() {
        let (exchange, _temp) = open_exchange().await;
        let me = with_skills(&exchange, "Me", &[], &["rust"]).await;
        with_skills(&exchange, "Mentor", &["Rust"], &[]).await;

        assert!(exchange.find_matches(&identity(&me)).unwrap().is_empty());
    }
}

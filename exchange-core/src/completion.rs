//! Completion engine
//!
//! Moves a learner from enrolled to completed and pays the mentor, all in
//! one commit. The enrolled-set membership check runs inside the planned
//! commit, so a retried or concurrent second completion observes the first
//! one and is rejected before any reward is staged.

use crate::{
    exchange::Exchange,
    storage::WriteBatch,
    types::{CourseId, EntryKind, EnrollmentState, Identity, LedgerEntry},
    Error, Result,
};

/// Result of a successful completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Course completed
    pub course_id: CourseId,
    /// Credits paid to the mentor (0 when the mentor no longer exists)
    pub mentor_reward: i64,
}

impl Exchange {
    /// Mark a course completed for the caller and reward its mentor
    ///
    /// Fails with `NotFound` when the course is gone and `InvalidOperation`
    /// unless the caller is currently enrolled.
    pub async fn complete(&self, identity: &Identity, course_id: CourseId) -> Result<CompletionOutcome> {
        let reward = self.config.economy.completion_reward;

        let result = self
            .commit_planned("complete", |storage| {
                let course = storage.get_course(course_id)?;
                let mut learner = storage.get_account(identity.id)?;

                match learner.enrollment_state(course_id) {
                    EnrollmentState::Enrolled => {}
                    EnrollmentState::Completed => {
                        return Err(Error::InvalidOperation(
                            "Course already completed".to_string(),
                        ))
                    }
                    EnrollmentState::NotEnrolled => {
                        return Err(Error::InvalidOperation(
                            "You are not enrolled in this course".to_string(),
                        ))
                    }
                }

                learner.enrolled_courses.retain(|c| *c != course_id);
                learner.completed_courses.push(course_id);

                let mut batch = WriteBatch::new("complete");
                batch.append_ledger(LedgerEntry::new(
                    learner.id,
                    0,
                    EntryKind::Bonus,
                    format!("Completed Course: {}", course.title),
                ));

                let mut paid = 0;
                match storage.get_account(course.instructor) {
                    Ok(mut mentor) if mentor.id != learner.id => {
                        mentor.credits = mentor.credits.checked_add(reward).ok_or_else(|| {
                            Error::InvalidOperation(
                                "Mentor balance cannot hold the completion reward".to_string(),
                            )
                        })?;
                        paid = reward;
                        batch
                            .append_ledger(LedgerEntry::new(
                                mentor.id,
                                reward,
                                EntryKind::Earn,
                                format!("Reward for {} completing: {}", learner.name, course.title),
                            ))
                            .put_account(mentor);
                    }
                    Ok(_) => {}
                    Err(Error::NotFound(_)) => {
                        tracing::warn!(
                            course_id = %course_id,
                            instructor = %course.instructor,
                            "Instructor account missing, completion not rewarded"
                        );
                    }
                    Err(e) => return Err(e),
                }
                batch.put_account(learner);

                Ok((paid, batch))
            })
            .await;

        match result {
            Ok((paid, receipt)) => {
                self.metrics.record_completion(paid);
                tracing::info!(
                    learner = %identity.id,
                    course_id = %course_id,
                    mentor_reward = paid,
                    commit_seq = receipt.commit_seq,
                    "Course completed"
                );
                Ok(CompletionOutcome {
                    course_id,
                    mentor_reward: paid,
                })
            }
            Err(e) => {
                tracing::debug!(learner = %identity.id, course_id = %course_id, "Completion rejected: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::new_course;
    use crate::exchange::test_support::*;

    #[tokio::test]
    async fn test_complete_rewards_mentor() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();
        exchange.enroll(&identity(&learner), course.id).await.unwrap();

        let outcome = exchange.complete(&identity(&learner), course.id).await.unwrap();
        assert_eq!(outcome.mentor_reward, 2);

        let stored_learner = exchange.storage().get_account(learner.id).unwrap();
        assert!(stored_learner.enrolled_courses.is_empty());
        assert_eq!(stored_learner.completed_courses, vec![course.id]);
        assert_eq!(stored_learner.credits, 4);

        let stored_mentor = exchange.storage().get_account(mentor.id).unwrap();
        assert_eq!(stored_mentor.credits, 7);

        let learner_history = exchange.transactions(&identity(&learner)).unwrap();
        assert_eq!(learner_history[0].amount, 0);
        assert_eq!(learner_history[0].kind, EntryKind::Bonus);
        assert_eq!(learner_history[0].description, "Completed Course: Rust 101");

        let mentor_history = exchange.transactions(&identity(&mentor)).unwrap();
        assert_eq!(mentor_history.len(), 1);
        assert_eq!(mentor_history[0].kind, EntryKind::Earn);
        assert_eq!(
            mentor_history[0].description,
            "Reward for Learner completing: Rust 101"
        );
    }

    #[tokio::test]
    async fn test_second_completion_rejected() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();
        exchange.enroll(&identity(&learner), course.id).await.unwrap();
        exchange.complete(&identity(&learner), course.id).await.unwrap();

        let err = exchange.complete(&identity(&learner), course.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(exchange.storage().get_account(mentor.id).unwrap().credits, 7);
        assert_eq!(exchange.metrics().completions_total.get(), 1);

        // Completed is terminal
        assert!(matches!(
            exchange.enroll(&identity(&learner), course.id).await,
            Err(Error::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_without_enrollment() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();

        assert!(matches!(
            exchange.complete(&identity(&learner), course.id).await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            exchange.complete(&identity(&learner), CourseId::generate()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_reward() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = crate::Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.economy.completion_reward = 3;
        let exchange = Exchange::open(config).await.unwrap();

        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();
        exchange.enroll(&identity(&learner), course.id).await.unwrap();
        exchange.complete(&identity(&learner), course.id).await.unwrap();

        assert_eq!(exchange.storage().get_account(mentor.id).unwrap().credits, 8);
    }

    #[tokio::test]
    async fn test_reward_overflow_rejected() {
        let (exchange, _temp) = open_exchange().await;
        let admin = seed_with_role(&exchange, "Admin", crate::types::Role::Admin).await;
        let mentor = register(&exchange, "Mentor").await;
        let learner = register(&exchange, "Learner").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();
        exchange
            .adjust_credits(&admin, mentor.id, i64::MAX - 5, None)
            .await
            .unwrap();
        exchange.enroll(&identity(&learner), course.id).await.unwrap();

        let err = exchange.complete(&identity(&learner), course.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        // Nothing committed: learner still enrolled, mentor untouched
        let stored_learner = exchange.storage().get_account(learner.id).unwrap();
        assert_eq!(stored_learner.enrolled_courses, vec![course.id]);
        assert!(stored_learner.completed_courses.is_empty());
        assert_eq!(exchange.storage().get_account(mentor.id).unwrap().credits, i64::MAX);
        assert_eq!(exchange.storage().stats().circulating_credits, i64::MAX);
    }
}

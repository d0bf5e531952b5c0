//! Enrollment engine
//!
//! Debits the learner and adds them to the course roster in one commit:
//!
//! ```text
//! learner.credits       -= course.cost
//! learner.enrolled      += course
//! ledger(learner)       += spend(-cost, "Enrolled in <title>")
//! course.roster         += learner
//! ```

use crate::{
    exchange::Exchange,
    storage::WriteBatch,
    types::{CourseId, EntryKind, EnrollmentState, Identity, LedgerEntry},
    Error, Result,
};

impl Exchange {
    /// Enroll the caller in a course, returning the new balance
    ///
    /// # Errors
    ///
    /// - `Forbidden` for admin or superadmin callers (token or stored role)
    /// - `NotFound` when the course or the caller's account is missing
    /// - `InvalidOperation` when the caller instructs the course or is
    ///   already enrolled or completed
    /// - `InsufficientFunds` when the balance is below the course cost
    pub async fn enroll(&self, identity: &Identity, course_id: CourseId) -> Result<i64> {
        if identity.role.is_privileged() {
            return Err(Error::Forbidden("Admins cannot enroll in courses".to_string()));
        }

        let result = self
            .commit_planned("enroll", |storage| {
                let mut course = storage.get_course(course_id)?;
                let mut learner = storage.get_account(identity.id)?;

                if learner.role.is_privileged() {
                    return Err(Error::Forbidden("Admins cannot enroll in courses".to_string()));
                }
                if course.instructor == learner.id {
                    return Err(Error::InvalidOperation(
                        "You cannot enroll in your own course".to_string(),
                    ));
                }
                match learner.enrollment_state(course_id) {
                    EnrollmentState::NotEnrolled => {}
                    EnrollmentState::Enrolled => {
                        return Err(Error::InvalidOperation("Already enrolled".to_string()))
                    }
                    EnrollmentState::Completed => {
                        return Err(Error::InvalidOperation(
                            "Course already completed".to_string(),
                        ))
                    }
                }
                if learner.credits < course.cost {
                    return Err(Error::InsufficientFunds {
                        required: course.cost,
                        available: learner.credits,
                    });
                }

                learner.credits -= course.cost;
                learner.enrolled_courses.push(course_id);
                if !course.enrolled_students.contains(&learner.id) {
                    course.enrolled_students.push(learner.id);
                }
                let balance = learner.credits;

                let mut batch = WriteBatch::new("enroll");
                batch
                    .append_ledger(LedgerEntry::new(
                        learner.id,
                        -course.cost,
                        EntryKind::Spend,
                        format!("Enrolled in {}", course.title),
                    ))
                    .put_account(learner)
                    .put_course(course);
                Ok((balance, batch))
            })
            .await;

        match result {
            Ok((balance, receipt)) => {
                self.metrics.record_enrollment();
                tracing::info!(
                    learner = %identity.id,
                    course_id = %course_id,
                    balance,
                    commit_seq = receipt.commit_seq,
                    "Learner enrolled"
                );
                Ok(balance)
            }
            Err(e) => {
                tracing::debug!(learner = %identity.id, course_id = %course_id, "Enrollment rejected: {}", e);
                Err(e)
            }
        }
    }
}

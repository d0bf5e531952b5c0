//! Course catalog
//!
//! Creation, browsing and instructor-only edits. Enrollment and completion
//! live in their own engines.

use crate::{
    exchange::Exchange,
    storage::WriteBatch,
    types::{AccountId, Course, CourseId, Identity, Lesson},
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Thumbnail used when a course is created without one
pub const DEFAULT_THUMBNAIL: &str =
    "https://images.unsplash.com/photo-1516321318423-f06f85e504b3?q=80&w=1000&auto=format&fit=crop";

/// Input for course creation
#[derive(Debug, Clone)]
pub struct NewCourse {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Category
    pub category: String,
    /// Thumbnail URL, defaulted when absent
    pub thumbnail: Option<String>,
    /// Ordered lessons
    pub lessons: Vec<Lesson>,
}

/// Partial course update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct CourseUpdate {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New thumbnail
    pub thumbnail: Option<String>,
    /// Replacement lessons
    pub lessons: Option<Vec<Lesson>>,
}

/// Instructor reference embedded in catalog views
#[derive(Debug, Clone, Serialize)]
pub struct InstructorRef {
    /// Account ID
    pub id: AccountId,
    /// Display name (empty when the account no longer exists)
    pub name: String,
}

/// Course as shown in the catalog
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct CourseView {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub category: String,
    pub instructor: InstructorRef,
    pub lessons: Vec<Lesson>,
    pub enrolled_students: Vec<AccountId>,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

impl CourseView {
    fn new(course: Course, instructor_name: String) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            thumbnail: course.thumbnail,
            category: course.category,
            instructor: InstructorRef {
                id: course.instructor,
                name: instructor_name,
            },
            lessons: course.lessons,
            enrolled_students: course.enrolled_students,
            cost: course.cost,
            created_at: course.created_at,
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("Course {} must not be empty", field)));
    }
    Ok(())
}

fn validate_lessons(lessons: &[Lesson]) -> Result<()> {
    for (index, lesson) in lessons.iter().enumerate() {
        if lesson.title.trim().is_empty() {
            return Err(Error::Validation(format!("Lesson {} has no title", index + 1)));
        }
    }
    Ok(())
}

impl Exchange {
    fn instructor_names(&self, courses: &[Course]) -> HashMap<AccountId, String> {
        let mut names = HashMap::new();
        for course in courses {
            if !names.contains_key(&course.instructor) {
                let name = self
                    .storage
                    .get_account(course.instructor)
                    .map(|a| a.name)
                    .unwrap_or_default();
                names.insert(course.instructor, name);
            }
        }
        names
    }

    fn views(&self, courses: Vec<Course>) -> Vec<CourseView> {
        let names = self.instructor_names(&courses);
        courses
            .into_iter()
            .map(|course| {
                let name = names.get(&course.instructor).cloned().unwrap_or_default();
                CourseView::new(course, name)
            })
            .collect()
    }

    /// Create a course owned by the caller
    ///
    /// Admins and superadmins cannot teach. The course is priced at the
    /// configured default cost and recorded in the instructor's created list
    /// in the same commit.
    pub async fn create_course(&self, identity: &Identity, new: NewCourse) -> Result<Course> {
        if identity.role.is_privileged() {
            return Err(Error::Forbidden("Admins cannot create courses".to_string()));
        }
        require_text("title", &new.title)?;
        require_text("description", &new.description)?;
        require_text("category", &new.category)?;
        validate_lessons(&new.lessons)?;

        let course = Course {
            id: CourseId::generate(),
            title: new.title.trim().to_string(),
            description: new.description,
            thumbnail: new
                .thumbnail
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string()),
            category: new.category.trim().to_string(),
            instructor: identity.id,
            lessons: new.lessons,
            enrolled_students: vec![],
            cost: self.config.economy.default_course_cost,
            created_at: Utc::now(),
            version: 0,
        };
        let id = course.id;

        self.commit_planned("create_course", |storage| {
            let mut instructor = storage.get_account(identity.id)?;
            if instructor.role.is_privileged() {
                return Err(Error::Forbidden("Admins cannot create courses".to_string()));
            }
            instructor.created_courses.push(id);

            let mut batch = WriteBatch::new("create_course");
            batch.put_course(course.clone()).put_account(instructor);
            Ok(((), batch))
        })
        .await?;

        tracing::info!(course_id = %id, instructor = %identity.id, "Course created");
        self.storage.get_course(id)
    }

    /// Catalog, oldest first, excluding the viewer's own courses
    pub fn list_courses(&self, viewer: Option<&Identity>) -> Vec<CourseView> {
        let courses = self
            .storage
            .list_courses()
            .into_iter()
            .filter(|c| viewer.map_or(true, |v| c.instructor != v.id))
            .collect();
        self.views(courses)
    }

    /// One course with its instructor
    pub fn course(&self, id: CourseId) -> Result<CourseView> {
        let course = self.storage.get_course(id)?;
        Ok(self.views(vec![course]).remove(0))
    }

    /// Courses taught by `instructor`, newest first
    pub fn courses_by_instructor(&self, instructor: AccountId) -> Vec<CourseView> {
        let mut courses: Vec<Course> = self
            .storage
            .list_courses()
            .into_iter()
            .filter(|c| c.instructor == instructor)
            .collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.views(courses)
    }

    /// Edit a course; only its instructor may
    pub async fn update_course(
        &self,
        identity: &Identity,
        id: CourseId,
        update: CourseUpdate,
    ) -> Result<Course> {
        if let Some(title) = &update.title {
            require_text("title", title)?;
        }
        if let Some(description) = &update.description {
            require_text("description", description)?;
        }
        if let Some(category) = &update.category {
            require_text("category", category)?;
        }
        if let Some(lessons) = &update.lessons {
            validate_lessons(lessons)?;
        }

        self.commit_planned("update_course", |storage| {
            let mut course = storage.get_course(id)?;
            if course.instructor != identity.id {
                return Err(Error::Forbidden(
                    "Only the instructor can edit this course".to_string(),
                ));
            }

            if let Some(title) = &update.title {
                course.title = title.trim().to_string();
            }
            if let Some(description) = &update.description {
                course.description = description.clone();
            }
            if let Some(category) = &update.category {
                course.category = category.trim().to_string();
            }
            if let Some(thumbnail) = &update.thumbnail {
                course.thumbnail = thumbnail.clone();
            }
            if let Some(lessons) = &update.lessons {
                course.lessons = lessons.clone();
            }

            let mut batch = WriteBatch::new("update_course");
            batch.put_course(course);
            Ok(((), batch))
        })
        .await?;

        tracing::debug!(course_id = %id, "Course updated");
        self.storage.get_course(id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exchange::test_support::*;
    use crate::types::Role;

    pub(crate) fn new_course(title: &str) -> NewCourse {
        NewCourse {
            title: title.to_string(),
            description: "Hands-on introduction".to_string(),
            category: "Programming".to_string(),
            thumbnail: None,
            lessons: vec![Lesson {
                title: "Ownership".to_string(),
                media_ref: None,
                content: Some("Moves and borrows".to_string()),
                duration: Some("10m".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_course() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;

        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();

        assert_eq!(course.cost, 1);
        assert_eq!(course.thumbnail, DEFAULT_THUMBNAIL);
        assert_eq!(course.instructor, mentor.id);
        let stored = exchange.storage().get_account(mentor.id).unwrap();
        assert_eq!(stored.created_courses, vec![course.id]);
    }

    #[tokio::test]
    async fn test_admin_cannot_create_course() {
        let (exchange, _temp) = open_exchange().await;
        let admin = seed_with_role(&exchange, "Admin", Role::Admin).await;

        let err = exchange
            .create_course(&admin, new_course("Nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(exchange.storage().stats().courses, 0);
    }

    #[tokio::test]
    async fn test_list_excludes_own_courses() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;
        let other = register(&exchange, "Other").await;
        exchange
            .create_course(&identity(&mentor), new_course("Mine"))
            .await
            .unwrap();
        exchange
            .create_course(&identity(&other), new_course("Theirs"))
            .await
            .unwrap();

        let seen: Vec<String> = exchange
            .list_courses(Some(&identity(&mentor)))
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(seen, vec!["Theirs".to_string()]);
        assert_eq!(exchange.list_courses(None).len(), 2);
    }

    #[tokio::test]
    async fn test_courses_by_instructor_newest_first() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;
        for title in ["First", "Second", "Third"] {
            exchange
                .create_course(&identity(&mentor), new_course(title))
                .await
                .unwrap();
        }

        let listed = exchange.courses_by_instructor(mentor.id);
        let titles: Vec<&str> = listed.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Third", "Second", "First"]);
        assert_eq!(listed[0].instructor.name, "Mentor");
    }

    #[tokio::test]
    async fn test_update_course_instructor_only() {
        let (exchange, _temp) = open_exchange().await;
        let mentor = register(&exchange, "Mentor").await;
        let stranger = register(&exchange, "Stranger").await;
        let course = exchange
            .create_course(&identity(&mentor), new_course("Rust 101"))
            .await
            .unwrap();

        let err = exchange
            .update_course(
                &identity(&stranger),
                course.id,
                CourseUpdate {
                    title: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let updated = exchange
            .update_course(
                &identity(&mentor),
                course.id,
                CourseUpdate {
                    title: Some("Rust 102".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Rust 102");
        assert_eq!(updated.version, 2);

        assert!(matches!(
            exchange
                .update_course(&identity(&mentor), CourseId::generate(), CourseUpdate::default())
                .await,
            Err(Error::NotFound(_))
        ));
    }
}

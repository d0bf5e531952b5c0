use exchange_core::{
    accounts::{AccountView, NewAccount, ProfileUpdate},
    catalog::{CourseUpdate, NewCourse},
    AccountId, Lesson, Role, SkillOffer,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Credential registration request
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[serde(default, alias = "skillsToTeach")]
    pub skills_to_teach: Vec<SkillOffer>,
    #[serde(default, alias = "skillsToLearn")]
    pub skills_to_learn: Vec<String>,
}

impl RegisterRequest {
    /// Account input once the password has been hashed
    pub fn into_new_account(self, credential_hash: String) -> NewAccount {
        NewAccount {
            name: self.name,
            email: self.email,
            credential_hash,
            skills_to_teach: self.skills_to_teach,
            skills_to_learn: self.skills_to_learn,
        }
    }
}

/// Credential login request
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Google Sign-In request carrying an ID token
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct GoogleLoginRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Facebook Login request carrying an access token
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct FacebookLoginRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "accessToken")]
    pub access_token: String,
}

/// Token issued on login or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AccountView,
}

/// Profile update request; absent fields stay untouched
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[serde(alias = "skillsToTeach")]
    pub skills_to_teach: Option<Vec<SkillOffer>>,
    #[serde(alias = "skillsToLearn")]
    pub skills_to_learn: Option<Vec<String>>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        ProfileUpdate {
            name: request.name,
            email: request.email,
            bio: request.bio,
            skills_to_teach: request.skills_to_teach,
            skills_to_learn: request.skills_to_learn,
        }
    }
}

/// Credit purchase request
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct PurchaseCreditsRequest {
    #[validate(range(min = 1, max = 10000))]
    pub amount: i64,
    #[validate(length(min = 1, max = 100))]
    #[serde(alias = "bundleName")]
    pub bundle_name: String,
}

/// Course creation request
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(url)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl From<CreateCourseRequest> for NewCourse {
    fn from(request: CreateCourseRequest) -> Self {
        NewCourse {
            title: request.title,
            description: request.description,
            category: request.category,
            thumbnail: request.thumbnail,
            lessons: request.lessons,
        }
    }
}

/// Course edit request; absent fields stay untouched
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(url)]
    pub thumbnail: Option<String>,
    pub lessons: Option<Vec<Lesson>>,
}

impl From<UpdateCourseRequest> for CourseUpdate {
    fn from(request: UpdateCourseRequest) -> Self {
        CourseUpdate {
            title: request.title,
            description: request.description,
            category: request.category,
            thumbnail: request.thumbnail,
            lessons: request.lessons,
        }
    }
}

/// Admin credit adjustment request
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct AdjustCreditsRequest {
    #[serde(alias = "userId")]
    pub user_id: AccountId,
    pub amount: i64,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Superadmin role change request
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateRoleRequest {
    #[serde(alias = "userId")]
    pub user_id: AccountId,
    #[serde(alias = "newRole")]
    pub new_role: Role,
}

/// Enrollment outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub message: String,
    pub remaining_credits: i64,
}

/// Balance after a purchase or adjustment
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub message: String,
    pub new_balance: i64,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

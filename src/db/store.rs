use serde::{Deserialize, Serialize};

use crate::core::Result;

/// User row as returned to clients (never carries credentials)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub school: Option<String>,
    pub city: Option<String>,
    pub age: Option<i64>,
    pub source: Option<String>,
    pub avatar: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperienceRecord {
    pub experience_id: i64,
    pub user_id: i64,
    pub role: String,
    pub company: Option<String>,
    pub year: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationRecord {
    pub education_id: i64,
    pub user_id: i64,
    pub school: String,
    pub degree: Option<String>,
    pub year: Option<String>,
    pub created_at: Option<String>,
}

/// User with the lists shown on the profile page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserRecord,
    pub experience: Vec<ExperienceRecord>,
    pub education: Vec<EducationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    pub user_id: i64,
    pub lesson_id: String,
    pub completed: bool,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Partial profile update; `None` keeps the stored value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserUpdate {
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewExperience {
    pub user_id: i64,
    pub role: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEducation {
    pub user_id: i64,
    pub school: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

/// Relational store behind the `{action, data}` API.
///
/// Every method maps to one parameterised statement (login also reads the
/// experience and education lists). Implementations do not retry.
#[cfg_attr(test, mockall::automock)]
pub trait UserStore: Send + Sync {
    fn signup(&self, user: &NewUser) -> Result<UserRecord>;

    /// `Ok(None)` when the email/password pair does not match
    fn login(&self, email: &str, password: &str) -> Result<Option<UserProfile>>;

    /// `Ok(None)` when no user has this id
    fn update_user(&self, update: &UserUpdate) -> Result<Option<UserRecord>>;

    fn save_progress(&self, user_id: i64, lesson_id: &str, completed: bool) -> Result<ProgressRecord>;

    /// Ids of the lessons currently marked completed
    fn get_progress(&self, user_id: i64) -> Result<Vec<String>>;

    fn add_experience(&self, experience: &NewExperience) -> Result<ExperienceRecord>;

    fn delete_experience(&self, experience_id: i64) -> Result<()>;

    fn add_education(&self, education: &NewEducation) -> Result<EducationRecord>;

    fn delete_education(&self, education_id: i64) -> Result<()>;
}

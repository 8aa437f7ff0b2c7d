use std::sync::Arc;

use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::metrics;
use crate::core::{DataSphereError, Result};
use crate::db::store::{
    NewEducation, NewExperience, NewUser, UserProfile, UserRecord, UserStore, UserUpdate,
};
use crate::services::progress::remote_user_id;
use crate::services::storage::{user_record_key, ClientStore, USER_ID_KEY, USER_KEY};
use crate::utils::avatar_url;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex");
}

pub const MIN_AGE: i64 = 14;
pub const MAX_AGE: i64 = 100;
pub const MIN_PASSWORD_LEN: usize = 6;

const DEFAULT_NAME: &str = "Utilisateur";
const DEFAULT_CITY: &str = "Maroc";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub description: String,
    /// Row id in the user store, when the entry was mirrored there
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: String,
    #[serde(default)]
    pub degree: String,
    pub school: String,
    #[serde(default)]
    pub year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
}

/// Profile of the signed-in visitor as kept in session storage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
}

impl User {
    fn from_record(record: UserRecord) -> Self {
        Self {
            name: record.name,
            email: record.email,
            school: record.school.unwrap_or_default(),
            city: record.city.unwrap_or_default(),
            age: record.age.map(|a| a.to_string()),
            source: record.source,
            avatar: record.avatar,
            bio: record.bio,
            headline: record.headline,
            experience: Vec::new(),
            education: Vec::new(),
        }
    }

    fn from_profile(profile: UserProfile) -> Self {
        let experience = profile
            .experience
            .into_iter()
            .map(|e| Experience {
                id: e.experience_id.to_string(),
                role: e.role,
                company: e.company.unwrap_or_default(),
                year: e.year.unwrap_or_default(),
                description: e.description.unwrap_or_default(),
                remote_id: Some(e.experience_id),
            })
            .collect();
        let education = profile
            .education
            .into_iter()
            .map(|e| Education {
                id: e.education_id.to_string(),
                degree: e.degree.unwrap_or_default(),
                school: e.school,
                year: e.year.unwrap_or_default(),
                remote_id: Some(e.education_id),
            })
            .collect();

        Self {
            experience,
            education,
            ..Self::from_record(profile.user)
        }
    }

    /// Account handed out when nothing is known about `email`
    pub fn demo(email: &str) -> Self {
        Self {
            name: "Étudiant Data".to_string(),
            email: email.to_string(),
            school: "ESTEM".to_string(),
            city: "Casablanca".to_string(),
            avatar: Some(avatar_url("Etudiant Data")),
            ..Default::default()
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Fields of the signup page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl SignupForm {
    /// Checks run in page order; the first failure is reported
    pub fn validate(&self) -> Result<i64> {
        let age = self.age.trim();
        if age.is_empty() {
            return Err(invalid("L'âge est requis."));
        }
        let age = match age.parse::<i64>() {
            Ok(age) if age >= MIN_AGE => age,
            _ => return Err(invalid("Vous devez avoir au moins 14 ans pour vous inscrire.")),
        };
        if age > MAX_AGE {
            return Err(invalid("Veuillez entrer un âge valide."));
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(invalid("Format d'email invalide."));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(invalid("Le mot de passe doit contenir au moins 6 caractères."));
        }
        if self.school.trim().is_empty() {
            return Err(invalid("L'établissement scolaire est requis."));
        }
        Ok(age)
    }

    fn display_name(&self) -> String {
        match self.name.trim() {
            "" => DEFAULT_NAME.to_string(),
            name => name.to_string(),
        }
    }

    fn city(&self) -> String {
        non_blank(&self.city).unwrap_or_else(|| DEFAULT_CITY.to_string())
    }
}

fn invalid(message: &str) -> DataSphereError {
    DataSphereError::ValidationError(message.to_string())
}

/// Editable profile fields; `None` or blank keeps the current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperienceForm {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EducationForm {
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub year: String,
}

/// Account operations for one visitor session.
///
/// The user store is consulted first; when it fails the session falls back to
/// the profile kept in its own storage. Every write to the profile lands in
/// session storage first and is then mirrored to the store when the session
/// carries a remote user id. Mirror failures are logged, never returned.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub fn current_user(&self, store: &ClientStore) -> Option<User> {
        match store.get_json::<User>(USER_KEY) {
            Ok(user) => user,
            Err(e) => {
                warn!("Ignoring unreadable session user: {}", e);
                None
            }
        }
    }

    pub fn signup(&self, store: &ClientStore, form: &SignupForm) -> Result<User> {
        let age = form.validate()?;
        let email = form.email.trim().to_string();

        let new_user = NewUser {
            name: form.display_name(),
            email: email.clone(),
            password: form.password.clone(),
            school: Some(form.school.trim().to_string()),
            age: Some(age),
            source: non_blank(&form.source),
            city: Some(form.city()),
        };

        match self.users.signup(&new_user) {
            Ok(record) => {
                let user_id = record.user_id;
                let user = User::from_record(record);
                self.remember(store, &user)?;
                store.set_item(USER_ID_KEY, user_id.to_string())?;
                info!("New account {} stored with id {}", user.email, user_id);
                metrics::record_account_event("signup", "remote");
                Ok(user)
            }
            Err(e) => {
                error!("Database signup failed, using local mode: {}", e);
                let name = new_user.name;
                let user = User {
                    avatar: Some(avatar_url(&name)),
                    name,
                    email,
                    school: form.school.trim().to_string(),
                    city: form.city(),
                    age: Some(age.to_string()),
                    source: new_user.source,
                    ..Default::default()
                };
                store.remove_item(USER_ID_KEY)?;
                self.remember(store, &user)?;
                metrics::record_account_event("signup", "local");
                Ok(user)
            }
        }
    }

    /// Sign in. The store is tried first; any failure or rejection falls back to
    /// the locally known profile for `email`, or to a demo profile.
    pub fn login(&self, store: &ClientStore, email: &str, password: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() {
            return Err(invalid("L'email est requis."));
        }

        match self.users.login(email, password) {
            Ok(Some(profile)) => {
                let user_id = profile.user.user_id;
                let user = User::from_profile(profile);
                self.remember(store, &user)?;
                store.set_item(USER_ID_KEY, user_id.to_string())?;
                metrics::record_account_event("login", "remote");
                return Ok(user);
            }
            Ok(None) => warn!("Store rejected credentials for {}, using local mode", email),
            Err(e) => error!("Database login failed, using demo mode: {}", e),
        }

        // a stale id would mirror edits onto another account
        store.remove_item(USER_ID_KEY)?;

        let (user, mode) = match store.get_json::<User>(&user_record_key(email)) {
            Ok(Some(user)) => (user, "local"),
            Ok(None) => (User::demo(email), "demo"),
            Err(e) => {
                warn!("Ignoring unreadable local profile for {}: {}", email, e);
                (User::demo(email), "demo")
            }
        };
        store.set_json(USER_KEY, &user)?;
        metrics::record_account_event("login", mode);
        Ok(user)
    }

    pub fn logout(&self, store: &ClientStore) -> Result<()> {
        store.remove_item(USER_KEY)?;
        store.remove_item(USER_ID_KEY)?;
        metrics::record_account_event("logout", "local");
        Ok(())
    }

    pub fn update_user(&self, store: &ClientStore, update: &ProfileUpdate) -> Result<User> {
        let mut user = self.require_user(store)?;

        if let Some(name) = non_blank(&update.name) {
            user.name = name;
        }
        if let Some(city) = non_blank(&update.city) {
            user.city = city;
        }
        if let Some(headline) = &update.headline {
            user.headline = Some(headline.trim().to_string());
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.trim().to_string());
        }
        self.remember(store, &user)?;

        if let Some(user_id) = remote_user_id(store) {
            let remote = UserUpdate {
                user_id,
                name: non_blank(&update.name),
                headline: update.headline.clone(),
                city: non_blank(&update.city),
                bio: update.bio.clone(),
            };
            match self.users.update_user(&remote) {
                Ok(Some(_)) => {}
                Ok(None) => warn!("User {} no longer exists in the store", user_id),
                Err(e) => error!("Failed to update user in database: {}", e),
            }
        }
        Ok(user)
    }

    pub fn add_experience(&self, store: &ClientStore, form: &ExperienceForm) -> Result<User> {
        let role = form.role.trim();
        if role.is_empty() {
            return Err(invalid("Le poste est requis."));
        }
        let mut user = self.require_user(store)?;

        let mut entry = Experience {
            id: Uuid::new_v4().to_string(),
            role: role.to_string(),
            company: form.company.trim().to_string(),
            year: form.year.trim().to_string(),
            description: form.description.trim().to_string(),
            remote_id: None,
        };

        if let Some(user_id) = remote_user_id(store) {
            let remote = NewExperience {
                user_id,
                role: entry.role.clone(),
                company: Some(entry.company.clone()),
                year: Some(entry.year.clone()),
                description: Some(entry.description.clone()),
            };
            match self.users.add_experience(&remote) {
                Ok(record) => entry.remote_id = Some(record.experience_id),
                Err(e) => error!("Failed to add experience to database: {}", e),
            }
        }

        user.experience.push(entry);
        self.remember(store, &user)?;
        Ok(user)
    }

    pub fn remove_experience(&self, store: &ClientStore, id: &str) -> Result<User> {
        let mut user = self.require_user(store)?;
        let idx = user
            .experience
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DataSphereError::NotFound(format!("experience {}", id)))?;
        let removed = user.experience.remove(idx);

        if let (Some(remote_id), Some(_)) = (removed.remote_id, remote_user_id(store)) {
            if let Err(e) = self.users.delete_experience(remote_id) {
                error!("Failed to delete experience from database: {}", e);
            }
        }

        self.remember(store, &user)?;
        Ok(user)
    }

    pub fn add_education(&self, store: &ClientStore, form: &EducationForm) -> Result<User> {
        let school = form.school.trim();
        if school.is_empty() {
            return Err(invalid("L'établissement est requis."));
        }
        let mut user = self.require_user(store)?;

        let mut entry = Education {
            id: Uuid::new_v4().to_string(),
            degree: form.degree.trim().to_string(),
            school: school.to_string(),
            year: form.year.trim().to_string(),
            remote_id: None,
        };

        if let Some(user_id) = remote_user_id(store) {
            let remote = NewEducation {
                user_id,
                school: entry.school.clone(),
                degree: Some(entry.degree.clone()),
                year: Some(entry.year.clone()),
            };
            match self.users.add_education(&remote) {
                Ok(record) => entry.remote_id = Some(record.education_id),
                Err(e) => error!("Failed to add education to database: {}", e),
            }
        }

        user.education.push(entry);
        self.remember(store, &user)?;
        Ok(user)
    }

    pub fn remove_education(&self, store: &ClientStore, id: &str) -> Result<User> {
        let mut user = self.require_user(store)?;
        let idx = user
            .education
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DataSphereError::NotFound(format!("education {}", id)))?;
        let removed = user.education.remove(idx);

        if let (Some(remote_id), Some(_)) = (removed.remote_id, remote_user_id(store)) {
            if let Err(e) = self.users.delete_education(remote_id) {
                error!("Failed to delete education from database: {}", e);
            }
        }

        self.remember(store, &user)?;
        Ok(user)
    }

    fn require_user(&self, store: &ClientStore) -> Result<User> {
        self.current_user(store)
            .ok_or_else(|| DataSphereError::Unauthorized("no user is signed in".to_string()))
    }

    /// Write the session user and the local record used by later logins
    fn remember(&self, store: &ClientStore, user: &User) -> Result<()> {
        store.set_json(USER_KEY, user)?;
        store.set_json(&user_record_key(&user.email), user)
    }
}

use std::str::FromStr;

use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::metrics;
use crate::core::DataSphereError;
use crate::db::store::{NewEducation, NewExperience, NewUser, UserStore, UserUpdate};

/// Body of a POST to the action endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// Status code and JSON body produced for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::new(status, json!({ "error": message }))
    }

    pub fn malformed(details: String) -> Self {
        Self::new(400, json!({ "error": "Malformed payload", "details": details }))
    }

    fn database(err: DataSphereError) -> Self {
        error!("Database error: {}", err);
        Self::new(500, json!({ "error": "Database error", "details": err.message() }))
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405, "Method Not Allowed")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiAction {
    Signup,
    Login,
    UpdateUser,
    SaveProgress,
    GetProgress,
    AddExperience,
    DeleteExperience,
    AddEducation,
    DeleteEducation,
}

impl ApiAction {
    pub fn name(&self) -> &'static str {
        match self {
            ApiAction::Signup => "signup",
            ApiAction::Login => "login",
            ApiAction::UpdateUser => "updateUser",
            ApiAction::SaveProgress => "saveProgress",
            ApiAction::GetProgress => "getProgress",
            ApiAction::AddExperience => "addExperience",
            ApiAction::DeleteExperience => "deleteExperience",
            ApiAction::AddEducation => "addEducation",
            ApiAction::DeleteEducation => "deleteEducation",
        }
    }
}

impl FromStr for ApiAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup" => Ok(ApiAction::Signup),
            "login" => Ok(ApiAction::Login),
            "updateUser" => Ok(ApiAction::UpdateUser),
            "saveProgress" => Ok(ApiAction::SaveProgress),
            "getProgress" => Ok(ApiAction::GetProgress),
            "addExperience" => Ok(ApiAction::AddExperience),
            "deleteExperience" => Ok(ApiAction::DeleteExperience),
            "addEducation" => Ok(ApiAction::AddEducation),
            "deleteEducation" => Ok(ApiAction::DeleteEducation),
            _ => Err(()),
        }
    }
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct ProgressUpdate {
    user_id: i64,
    lesson_id: String,
    completed: bool,
}

#[derive(Deserialize)]
struct UserRef {
    user_id: i64,
}

#[derive(Deserialize)]
struct ExperienceRef {
    experience_id: i64,
}

#[derive(Deserialize)]
struct EducationRef {
    education_id: i64,
}

fn parse<T: DeserializeOwned>(data: Value) -> Result<T, ApiReply> {
    serde_json::from_value(data).map_err(|e| {
        warn!("Rejected API payload: {}", e);
        ApiReply::malformed(e.to_string())
    })
}

fn to_json<T: Serialize>(status: u16, value: &T) -> ApiReply {
    match serde_json::to_value(value) {
        Ok(body) => ApiReply::new(status, body),
        Err(e) => ApiReply::database(e.into()),
    }
}

/// Run one action against the store. Each action is a single statement;
/// nothing is retried.
pub fn dispatch(store: &dyn UserStore, request: ApiRequest) -> ApiReply {
    let action = match request.action.parse::<ApiAction>() {
        Ok(action) => action,
        Err(()) => {
            warn!("Unknown API action '{}'", request.action);
            metrics::record_api_action("invalid", 400);
            return ApiReply::error(400, "Invalid action");
        }
    };

    let reply = match run_action(store, action, request.data) {
        Ok(reply) | Err(reply) => reply,
    };
    metrics::record_api_action(action.name(), reply.status);
    reply
}

fn run_action(store: &dyn UserStore, action: ApiAction, data: Value) -> Result<ApiReply, ApiReply> {
    let reply = match action {
        ApiAction::Signup => {
            let user: NewUser = parse(data)?;
            let record = store.signup(&user).map_err(ApiReply::database)?;
            to_json(201, &record)
        }
        ApiAction::Login => {
            let creds: Credentials = parse(data)?;
            match store.login(&creds.email, &creds.password).map_err(ApiReply::database)? {
                Some(profile) => to_json(200, &profile),
                None => ApiReply::error(401, "Invalid credentials"),
            }
        }
        ApiAction::UpdateUser => {
            let update: UserUpdate = parse(data)?;
            match store.update_user(&update).map_err(ApiReply::database)? {
                Some(record) => to_json(200, &record),
                None => ApiReply::error(404, "User not found"),
            }
        }
        ApiAction::SaveProgress => {
            let progress: ProgressUpdate = parse(data)?;
            let record = store
                .save_progress(progress.user_id, &progress.lesson_id, progress.completed)
                .map_err(ApiReply::database)?;
            to_json(200, &record)
        }
        ApiAction::GetProgress => {
            let user: UserRef = parse(data)?;
            let lessons = store.get_progress(user.user_id).map_err(ApiReply::database)?;
            ApiReply::new(200, json!({ "completedLessons": lessons }))
        }
        ApiAction::AddExperience => {
            let experience: NewExperience = parse(data)?;
            let record = store.add_experience(&experience).map_err(ApiReply::database)?;
            to_json(201, &record)
        }
        ApiAction::DeleteExperience => {
            let target: ExperienceRef = parse(data)?;
            store
                .delete_experience(target.experience_id)
                .map_err(ApiReply::database)?;
            ApiReply::new(200, json!({ "success": true }))
        }
        ApiAction::AddEducation => {
            let education: NewEducation = parse(data)?;
            let record = store.add_education(&education).map_err(ApiReply::database)?;
            to_json(201, &record)
        }
        ApiAction::DeleteEducation => {
            let target: EducationRef = parse(data)?;
            store
                .delete_education(target.education_id)
                .map_err(ApiReply::database)?;
            ApiReply::new(200, json!({ "success": true }))
        }
    };
    Ok(reply)
}

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::core::DataSphereError;

/// Generic response
#[derive(Serialize)]
pub struct GenericResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

impl ErrorResponse {
    pub fn from_error(err: &DataSphereError) -> Self {
        Self {
            success: false,
            error: err.message().to_string(),
            error_code: err.code().to_string(),
        }
    }
}

impl ResponseError for DataSphereError {
    fn status_code(&self) -> StatusCode {
        match self {
            DataSphereError::ValidationError(_) => StatusCode::BAD_REQUEST,
            DataSphereError::NotFound(_) => StatusCode::NOT_FOUND,
            DataSphereError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::from_error(self))
    }
}

/// Service status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tracks: usize,
    pub lessons: usize,
    pub sessions: usize,
    pub live_sandboxes: usize,
}

/// Track summary used by the catalog listing
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub lesson_count: usize,
    pub progress: u8,
}

/// Search query string
#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Redirect target carried through the login form
#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

/// SQL submitted from the practice page or the JSON API
#[derive(Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub sql: String,
}

/// Example picked from the practice sidebar
#[derive(Deserialize)]
pub struct PracticeQuery {
    pub example: Option<usize>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    // Test that service errors keep their code in the JSON body
    #[actix_web::test]
    async fn test_error_response_body() {
        let err = DataSphereError::NotFound("track nope".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "NOT_FOUND");
        assert_eq!(json["error"], "track nope");
    }
}

use actix_web::{web, HttpResponse, Responder};
use log::error;

use crate::catalog::{self, catalog};
use crate::core::metrics;
use crate::services::progress::{get_progress, track_progress_percentage};
use crate::web::models::{ErrorResponse, SearchQuery, StatusResponse, TrackSummary};
use crate::web::server::AppState;
use crate::web::session::Session;

/// Get the service status
pub async fn get_status(data: web::Data<AppState>) -> impl Responder {
    let response = StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: data.started_at.elapsed().as_secs(),
        tracks: catalog().tracks().len(),
        lessons: catalog().total_lessons(),
        sessions: data.storage.session_count(),
        live_sandboxes: data.sandboxes.live_count(),
    };

    HttpResponse::Ok().json(response)
}

/// List every track with the session's progress
pub async fn list_tracks(data: web::Data<AppState>, session: Session) -> impl Responder {
    let progress = get_progress(&data.client(&session));

    let tracks: Vec<TrackSummary> = catalog()
        .tracks()
        .iter()
        .map(|t| TrackSummary {
            id: t.id.clone(),
            title: t.title.clone(),
            description: t.description.clone(),
            url: catalog::track_url(&t.id),
            lesson_count: t.lesson_count(),
            progress: track_progress_percentage(t, &progress),
        })
        .collect();

    HttpResponse::Ok().json(tracks)
}

/// Navbar search
pub async fn search(query: web::Query<SearchQuery>) -> impl Responder {
    HttpResponse::Ok().json(catalog().search(&query.q))
}

/// Prometheus scrape endpoint
pub async fn get_metrics() -> impl Responder {
    match metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::from_error(&e))
        }
    }
}

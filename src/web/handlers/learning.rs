use std::collections::HashMap;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use log::{debug, info};
use serde_json::json;

use crate::catalog::{self, catalog, Track};
use crate::core::{DataSphereError, Result};
use crate::services::progress;
use crate::services::reviews::{self, average_rating, Review};
use crate::web::handlers::pages::{lesson_context, login_redirect, not_found_page, render, render_status, track_context};
use crate::web::handlers::see_other;
use crate::web::models::{GenericResponse, ReviewRequest};
use crate::web::server::AppState;
use crate::web::session::Session;

fn known_lesson(lesson_id: &str) -> bool {
    catalog()
        .tracks()
        .iter()
        .any(|t| t.lessons().any(|l| l.id == lesson_id))
}

fn find_track(track_id: &str) -> Result<&'static Track> {
    catalog()
        .track(track_id)
        .ok_or_else(|| DataSphereError::NotFound(format!("Piste non trouvée : {}", track_id)))
}

/// Completed lessons of the session
pub async fn get_progress(data: web::Data<AppState>, session: Session) -> impl Responder {
    HttpResponse::Ok().json(progress::get_progress(&data.client(&session)))
}

/// Flip a lesson between completed and not completed
pub async fn toggle_progress(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let lesson_id = path.into_inner();
    if !known_lesson(&lesson_id) {
        return Err(DataSphereError::NotFound(format!("Leçon introuvable : {}", lesson_id)));
    }

    let change = data
        .progress
        .toggle_lesson_completion(&data.client(&session), &lesson_id);
    debug!("Lesson {} completed: {}", change.lesson_id, change.completed);
    Ok(HttpResponse::Ok().json(change))
}

/// Reviews of a track with their average
pub async fn list_reviews(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let track = find_track(&path)?;
    let reviews = reviews::list_reviews(&data.client(&session), &track.id, &mut rand::thread_rng());

    Ok(HttpResponse::Ok().json(json!({
        "average": average_rating(&reviews),
        "count": reviews.len(),
        "reviews": reviews,
    })))
}

fn add_review(data: &AppState, session: &Session, track: &Track, request: &ReviewRequest) -> Result<Review> {
    let store = data.client(session);
    let progress = progress::get_progress(&store);
    reviews::add_review(&store, track, &progress, request.rating, &request.comment)
}

pub async fn post_review(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<String>,
    request: web::Json<ReviewRequest>,
) -> Result<HttpResponse> {
    let track = find_track(&path)?;
    let review = add_review(&data, &session, track, &request)?;

    Ok(HttpResponse::Created().json(GenericResponse {
        success: true,
        message: "Merci pour votre avis !".to_string(),
        data: Some(serde_json::to_value(review)?),
    }))
}

/// Review form on the track page
pub async fn submit_review(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<ReviewRequest>,
) -> impl Responder {
    let store = data.client(&session);
    let Some(track) = catalog().track(&path) else {
        return not_found_page(&data, &store, "Piste non trouvée");
    };

    match add_review(&data, &session, track, &form) {
        Ok(_) => see_other(&format!("{}#reviews", catalog::track_url(&track.id))),
        Err(e) => render_status(
            StatusCode::BAD_REQUEST,
            "track",
            &track_context(&data, &store, track, Some(e.message())),
        ),
    }
}

/// "Mark as completed" button of a lesson page
pub async fn complete_lesson(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (track_id, lesson_id) = path.into_inner();
    let store = data.client(&session);
    let lesson_url = catalog::lesson_url(&track_id, &lesson_id);

    if data.auth.current_user(&store).is_none() {
        return login_redirect(&lesson_url);
    }
    if catalog().lesson(&track_id, &lesson_id).is_none() {
        debug!("Completion posted for unknown lesson {}", lesson_url);
        return not_found_page(&data, &store, "Leçon introuvable");
    }

    data.progress.toggle_lesson_completion(&store, &lesson_id);
    see_other(&lesson_url)
}

/// Grade a quiz and show the lesson with corrections
pub async fn submit_quiz(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<(String, String)>,
    form: web::Form<HashMap<String, String>>,
) -> impl Responder {
    let (track_id, lesson_id) = path.into_inner();
    let store = data.client(&session);

    if data.auth.current_user(&store).is_none() {
        return login_redirect(&catalog::lesson_url(&track_id, &lesson_id));
    }
    let Some(view) = catalog().lesson(&track_id, &lesson_id) else {
        return not_found_page(&data, &store, "Leçon introuvable");
    };

    let answers: HashMap<String, usize> = form
        .into_inner()
        .into_iter()
        .filter_map(|(id, choice)| choice.trim().parse().ok().map(|c| (id, c)))
        .collect();
    let result = view.lesson.content.grade(&answers);
    info!(
        "Quiz {} graded {}/{}",
        view.lesson.id, result.correct, result.total
    );

    render("lesson", &lesson_context(&data, &store, &view, Some(&result)))
}

#[cfg(test)]
mod tests {
    use crate::services::auth::User;
    use crate::services::progress::UserProgress;
    use crate::services::storage::{PROGRESS_KEY, USER_KEY};
    use crate::web::handlers::test_support::{session_cookie, state};
    use crate::web::server::configure;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_toggle_progress_api() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let cookie = session_cookie();

        let req = test::TestRequest::post()
            .uri("/api/progress/sql-1-1/toggle")
            .cookie(cookie.clone())
            .to_request();
        let change: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(change["completed"], true);

        let req = test::TestRequest::get().uri("/api/progress").cookie(cookie.clone()).to_request();
        let progress: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(progress["completedLessons"], json!(["sql-1-1"]));

        let req = test::TestRequest::post()
            .uri("/api/progress/sql-1-1/toggle")
            .cookie(cookie)
            .to_request();
        let change: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(change["completed"], false);
        assert_eq!(change["progress"]["completedLessons"], json!([]));
    }

    #[actix_web::test]
    async fn test_toggle_unknown_lesson() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post().uri("/api/progress/nope/toggle").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_reviews_locked_until_complete() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;
        let cookie = session_cookie();

        let review = json!({ "rating": 5, "comment": "Très clair" });
        let req = test::TestRequest::post()
            .uri("/api/tracks/db-design/reviews")
            .cookie(cookie.clone())
            .set_json(&review)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let all: Vec<String> = crate::catalog::catalog()
            .track("db-design")
            .unwrap()
            .lessons()
            .map(|l| l.id.clone())
            .collect();
        data.storage
            .client(cookie.value())
            .set_json(PROGRESS_KEY, &UserProgress { completed_lessons: all })
            .unwrap();

        let req = test::TestRequest::post()
            .uri("/api/tracks/db-design/reviews")
            .cookie(cookie.clone())
            .set_json(&review)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/tracks/db-design/reviews")
            .cookie(cookie)
            .to_request();
        let listing: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listing["reviews"][0]["comment"], "Très clair");
        assert_eq!(listing["reviews"][0]["author"], "Vous (Apprenant)");
    }

    #[actix_web::test]
    async fn test_review_form_errors_rerender_track() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/track/db-design/reviews")
            .set_form([("rating", "4"), ("comment", "Bien")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_complete_and_quiz() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;
        let cookie = session_cookie();
        let store = data.storage.client(cookie.value());
        store.set_json(USER_KEY, &User::demo("a@b.ma")).unwrap();

        let req = test::TestRequest::post()
            .uri("/lesson/sql-mastery/sql-1-1/complete")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/lesson/sql-mastery/sql-1-1"
        );
        assert!(crate::services::progress::is_lesson_completed(&store, "sql-1-1"));

        let quiz = &crate::catalog::catalog()
            .lesson("sql-mastery", "sql-1-1")
            .unwrap()
            .lesson
            .content
            .quiz;
        let answers: Vec<(String, String)> = quiz
            .iter()
            .map(|q| (q.id.clone(), q.correct_index.to_string()))
            .collect();
        let req = test::TestRequest::post()
            .uri("/lesson/sql-mastery/sql-1-1/quiz")
            .cookie(cookie)
            .set_form(&answers)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_complete_requires_user() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/lesson/sql-mastery/sql-1-1/complete")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }
}

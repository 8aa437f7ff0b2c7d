use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{Datelike, Utc};
use handlebars::Handlebars;
use log::{error, info};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::catalog::{self, catalog, LessonView, QuizResult, Track};
use crate::services::progress::{
    get_progress, global_progress_percentage, is_lesson_completed, track_progress_percentage,
};
use crate::services::reviews::{average_rating, list_reviews, reviews_locked, DISPLAYED_REVIEWS};
use crate::services::ClientStore;
use crate::utils::encode_uri_component;
use crate::web::handlers::see_other;
use crate::web::models::ContactForm;
use crate::web::server::AppState;
use crate::web::session::Session;

const TEMPLATES: [(&str, &str); 10] = [
    ("home", include_str!("../templates/home.hbs")),
    ("track", include_str!("../templates/track.hbs")),
    ("lesson", include_str!("../templates/lesson.hbs")),
    ("practice", include_str!("../templates/practice.hbs")),
    ("login", include_str!("../templates/login.hbs")),
    ("signup", include_str!("../templates/signup.hbs")),
    ("profile", include_str!("../templates/profile.hbs")),
    ("legal", include_str!("../templates/legal.hbs")),
    ("contact", include_str!("../templates/contact.hbs")),
    ("not_found", include_str!("../templates/not_found.hbs")),
];

lazy_static::lazy_static! {
    /// Shared handlebars instance
    static ref HBS: Arc<Handlebars<'static>> = {
        let mut hbs = Handlebars::new();
        for (name, source) in [
            ("header", include_str!("../templates/header.hbs")),
            ("footer", include_str!("../templates/footer.hbs")),
        ] {
            if let Err(e) = hbs.register_partial(name, source) {
                error!("Error registering partial {}: {}", name, e);
            }
        }
        for (name, source) in TEMPLATES {
            if let Err(e) = hbs.register_template_string(name, source) {
                error!("Error registering template {}: {}", name, e);
            }
        }
        Arc::new(hbs)
    };
}

/// Render a page with the given status
pub(crate) fn render_status(status: StatusCode, template: &str, context: &Value) -> HttpResponse {
    match HBS.render(template, context) {
        Ok(body) => HttpResponse::build(status).content_type("text/html; charset=utf-8").body(body),
        Err(e) => {
            error!("Template rendering error: {}", e);
            HttpResponse::InternalServerError().body(format!("Template error: {}", e))
        }
    }
}

pub(crate) fn render(template: &str, context: &Value) -> HttpResponse {
    render_status(StatusCode::OK, template, context)
}

/// Context every page starts from: title, navbar and signed-in user
pub(crate) fn base_context(data: &AppState, store: &ClientStore, title: &str) -> Value {
    let nav_tracks: Vec<Value> = catalog()
        .tracks()
        .iter()
        .map(|t| json!({ "title": t.title, "url": catalog::track_url(&t.id) }))
        .collect();

    json!({
        "title": format!("{} | DataSphere", title),
        "user": data.auth.current_user(store),
        "nav_tracks": nav_tracks,
        "year": Utc::now().year(),
    })
}

pub(crate) fn not_found_page(data: &AppState, store: &ClientStore, message: &str) -> HttpResponse {
    let mut context = base_context(data, store, "Page introuvable");
    context["message"] = json!(message);
    render_status(StatusCode::NOT_FOUND, "not_found", &context)
}

fn stars(rating: u8) -> String {
    (1..=5).map(|s| if s <= rating { '★' } else { '☆' }).collect()
}

/// Track landing page context, with an optional review form error
pub(crate) fn track_context(
    data: &AppState,
    store: &ClientStore,
    track: &Track,
    review_error: Option<&str>,
) -> Value {
    let progress = get_progress(store);

    let modules: Vec<Value> = track
        .modules
        .iter()
        .enumerate()
        .map(|(idx, module)| {
            let lessons: Vec<Value> = module
                .lessons
                .iter()
                .map(|l| {
                    json!({
                        "title": l.title,
                        "duration": l.duration,
                        "url": catalog::lesson_url(&track.id, &l.id),
                        "completed": progress.contains(&l.id),
                    })
                })
                .collect();
            json!({
                "number": idx + 1,
                "title": module.title,
                "description": module.description,
                "lessons": lessons,
            })
        })
        .collect();

    let reviews = list_reviews(store, &track.id, &mut rand::thread_rng());
    let shown: Vec<Value> = reviews
        .iter()
        .take(DISPLAYED_REVIEWS)
        .map(|r| {
            json!({
                "author": r.author,
                "city": r.city,
                "date": r.date,
                "comment": r.comment,
                "stars": stars(r.rating),
            })
        })
        .collect();

    let recommendations: Vec<Value> = catalog()
        .recommendations(&track.id)
        .iter()
        .map(|t| json!({ "title": t.title, "description": t.description, "url": catalog::track_url(&t.id) }))
        .collect();

    let mut context = base_context(data, store, &track.title);
    context["track"] = json!(track);
    context["track_lessons"] = json!(track.lesson_count());
    context["progress"] = json!(track_progress_percentage(track, &progress));
    context["first_lesson_url"] = json!(track.lessons().next().map(|l| catalog::lesson_url(&track.id, &l.id)));
    context["modules"] = json!(modules);
    context["reviews"] = json!(shown);
    context["review_count"] = json!(reviews.len());
    context["average_rating"] = json!(format!("{:.1}", average_rating(&reviews)));
    context["reviews_locked"] = json!(reviews_locked(track, &progress));
    context["review_error"] = json!(review_error);
    context["recommendations"] = json!(recommendations);
    context
}

/// Lesson page context, with the graded quiz when answers were submitted
pub(crate) fn lesson_context(
    data: &AppState,
    store: &ClientStore,
    view: &LessonView<'_>,
    quiz: Option<&QuizResult>,
) -> Value {
    let lesson = view.lesson;
    let track_id = &view.track.id;

    let questions: Vec<Value> = lesson
        .content
        .quiz
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            let graded = quiz.and_then(|r| r.questions.iter().find(|g| g.id == q.id));
            let selected = graded.and_then(|g| g.selected);
            let options: Vec<Value> = q
                .options
                .iter()
                .enumerate()
                .map(|(i, label)| json!({ "index": i, "label": label, "selected": selected == Some(i) }))
                .collect();
            json!({
                "number": idx + 1,
                "id": q.id,
                "question": q.question,
                "options": options,
                "graded": graded.is_some(),
                "is_correct": graded.map(|g| g.is_correct).unwrap_or(false),
                "explanation": q.explanation,
            })
        })
        .collect();

    let link = |l: &catalog::Lesson| json!({ "title": l.title, "url": catalog::lesson_url(track_id, &l.id) });

    let mut context = base_context(data, store, &lesson.title);
    context["track"] = json!({ "id": view.track.id, "title": view.track.title });
    context["track_url"] = json!(catalog::track_url(track_id));
    context["module"] = json!({ "title": view.module.title });
    context["module_number"] = json!(view.module_number);
    context["lesson"] = json!(lesson);
    context["position"] = json!(view.position + 1);
    context["total"] = json!(view.total);
    context["previous"] = json!(view.previous.map(link));
    context["next"] = json!(view.next.map(link));
    context["questions"] = json!(questions);
    context["completed"] = json!(is_lesson_completed(store, &lesson.id));
    context["quiz_result"] = match quiz {
        Some(r) => json!({ "correct": r.correct, "total": r.total, "perfect": r.is_perfect() }),
        None => Value::Null,
    };
    context
}

/// Login redirect for pages reserved to signed-in visitors
pub(crate) fn login_redirect(path: &str) -> HttpResponse {
    see_other(&format!("/login?next={}", encode_uri_component(path)))
}

/// Serve the home page
pub async fn index(data: web::Data<AppState>, session: Session) -> impl Responder {
    let store = data.client(&session);
    let progress = get_progress(&store);

    let tracks: Vec<Value> = catalog()
        .tracks()
        .iter()
        .map(|t| {
            json!({
                "title": t.title,
                "description": t.description,
                "url": catalog::track_url(&t.id),
                "lessonCount": t.lesson_count(),
                "progress": track_progress_percentage(t, &progress),
            })
        })
        .collect();

    let mut context = base_context(&data, &store, "Accueil");
    context["tracks"] = json!(tracks);
    context["global_progress"] = json!(global_progress_percentage(catalog(), &progress));
    render("home", &context)
}

/// Serve the flagship track page
pub async fn sql_mastery(data: web::Data<AppState>, session: Session) -> impl Responder {
    track_page(&data, &session, catalog::FLAGSHIP_TRACK)
}

/// Serve a track landing page
pub async fn track(data: web::Data<AppState>, session: Session, path: web::Path<String>) -> impl Responder {
    track_page(&data, &session, &path.into_inner())
}

fn track_page(data: &AppState, session: &Session, track_id: &str) -> HttpResponse {
    let store = data.client(session);
    match catalog().track(track_id) {
        Some(track) => render("track", &track_context(data, &store, track, None)),
        None => not_found_page(data, &store, "Piste non trouvée"),
    }
}

/// Serve a lesson; signed-in visitors only
pub async fn lesson(
    data: web::Data<AppState>,
    session: Session,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (track_id, lesson_id) = path.into_inner();
    let store = data.client(&session);

    if data.auth.current_user(&store).is_none() {
        return login_redirect(req.path());
    }

    match catalog().lesson(&track_id, &lesson_id) {
        Some(view) => render("lesson", &lesson_context(&data, &store, &view, None)),
        None => not_found_page(&data, &store, "Leçon introuvable"),
    }
}

fn legal_page(data: &AppState, session: &Session, heading: &str, sections: &[(&str, &str)]) -> HttpResponse {
    let store = data.client(session);
    let sections: Vec<Value> = sections
        .iter()
        .map(|(title, body)| json!({ "title": title, "body": body }))
        .collect();

    let mut context = base_context(data, &store, heading);
    context["heading"] = json!(heading);
    context["sections"] = json!(sections);
    render("legal", &context)
}

/// Serve the privacy policy
pub async fn privacy(data: web::Data<AppState>, session: Session) -> impl Responder {
    legal_page(
        &data,
        &session,
        "Politique de Confidentialité",
        &[
            (
                "1. Collecte des données",
                "Chez DataSphere, nous appliquons un principe strict de minimisation. Nous ne collectons que les informations nécessaires à votre expérience d'apprentissage (progression, compte utilisateur basique).",
            ),
            (
                "2. Cookies & Traceurs",
                "Nous n'utilisons aucun cookie publicitaire tiers. Seuls des cookies de session essentiels sont stockés pour maintenir votre connexion active et sauvegarder votre progression.",
            ),
            (
                "3. Stockage",
                "Vos données de progression sont stockées de manière sécurisée et nous ne partageons aucune information avec des tiers à des fins commerciales.",
            ),
        ],
    )
}

/// Serve the terms of use
pub async fn terms(data: web::Data<AppState>, session: Session) -> impl Responder {
    legal_page(
        &data,
        &session,
        "Conditions d'Utilisation",
        &[
            (
                "1. Usage Personnel",
                "L'accès à DataSphere est gratuit et réservé à un usage personnel et non commercial. Le contenu pédagogique est protégé par le droit d'auteur.",
            ),
            (
                "2. Code de conduite",
                "En rejoignant notre plateforme, vous vous engagez à maintenir un comportement respectueux et à ne pas tenter de compromettre l'intégrité du site.",
            ),
            (
                "3. Responsabilité",
                "Bien que nous nous efforcions de fournir un contenu exact, DataSphere ne peut être tenu responsable des erreurs ou omissions dans les cours proposés.",
            ),
        ],
    )
}

/// Serve the contact form
pub async fn contact(data: web::Data<AppState>, session: Session) -> impl Responder {
    let store = data.client(&session);
    render("contact", &base_context(&data, &store, "Contact"))
}

/// Accept a contact message. Messages are only logged.
pub async fn send_contact(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<ContactForm>,
) -> impl Responder {
    let store = data.client(&session);
    let mut context = base_context(&data, &store, "Contact");

    if form.name.trim().is_empty() || form.email.trim().is_empty() || form.message.trim().is_empty() {
        context["error"] = json!("Tous les champs sont requis.");
        return render_status(StatusCode::BAD_REQUEST, "contact", &context);
    }

    info!(
        "Contact message from {} <{}> ({} chars)",
        form.name.trim(),
        form.email.trim(),
        form.message.chars().count()
    );
    context["sent"] = json!(true);
    render("contact", &context)
}

/// Default route
pub async fn not_found(data: web::Data<AppState>, session: Session) -> impl Responder {
    let store = data.client(&session);
    not_found_page(&data, &store, "La page demandée n'existe pas ou a été déplacée.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::USER_KEY;
    use crate::web::handlers::test_support::{session_cookie, state};
    use crate::web::server::configure;
    use actix_web::http::header;
    use actix_web::{test, App};

    // Test that every template compiles
    #[actix_web::test]
    async fn test_templates_registered() {
        for (name, _) in TEMPLATES {
            assert!(HBS.get_template(name).is_some(), "missing template {}", name);
        }
    }

    #[actix_web::test]
    async fn test_home_lists_tracks() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Parcours d'Excellence"));
        assert!(body.contains("/sql-mastery"));
    }

    #[actix_web::test]
    async fn test_track_pages() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/track/db-design").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Terminez le cours pour laisser un avis"));

        let req = test::TestRequest::get().uri("/track/unknown").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_lesson_requires_user() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;
        let cookie = session_cookie();

        let req = test::TestRequest::get()
            .uri("/lesson/sql-mastery/sql-1-1")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Flesson%2Fsql-mastery%2Fsql-1-1"
        );

        let store = data.storage.client(cookie.value());
        store
            .set_json(USER_KEY, &crate::services::auth::User::demo("a@b.ma"))
            .unwrap();

        let req = test::TestRequest::get()
            .uri("/lesson/sql-mastery/sql-1-1")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_legal_and_contact() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/confidentialite").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("Politique de Confidentialité"));

        let req = test::TestRequest::post()
            .uri("/contact")
            .set_form([("name", "Sara"), ("email", "sara@example.ma"), ("message", "Bonjour")])
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("Message envoyé"));

        let req = test::TestRequest::post()
            .uri("/contact")
            .set_form([("name", ""), ("email", ""), ("message", "")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_unknown_route_is_404_page() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .configure(configure)
                .default_service(web::to(not_found)),
        )
        .await;
        let req = test::TestRequest::get().uri("/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

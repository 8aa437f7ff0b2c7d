use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde_json::json;

use crate::catalog::catalog;
use crate::core::{DataSphereError, Result};
use crate::services::auth::{EducationForm, ExperienceForm, ProfileUpdate, SignupForm, User};
use crate::services::progress::{get_progress, global_progress_percentage};
use crate::services::{AuthService, ClientStore};
use crate::web::handlers::pages::{base_context, login_redirect, render, render_status};
use crate::web::handlers::{blocking, safe_next, see_other};
use crate::web::models::{LoginForm, NextQuery};
use crate::web::server::AppState;
use crate::web::session::Session;

const PROFILE_PATH: &str = "/profile";

/// Run an account operation on the blocking pool
async fn with_account<F>(data: &AppState, session: &Session, f: F) -> Result<User>
where
    F: FnOnce(&AuthService, &ClientStore) -> Result<User> + Send + 'static,
{
    let auth = data.auth.clone();
    let store = data.client(session);
    blocking(move || f(&auth, &store)).await
}

fn error_status(err: &DataSphereError) -> StatusCode {
    match err {
        DataSphereError::ValidationError(_) => StatusCode::BAD_REQUEST,
        DataSphereError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve the login page
pub async fn login_page(
    data: web::Data<AppState>,
    session: Session,
    query: web::Query<NextQuery>,
) -> impl Responder {
    let store = data.client(&session);
    let mut context = base_context(&data, &store, "Connexion");
    context["next"] = json!(safe_next(query.next.as_deref()));
    render("login", &context)
}

pub async fn login(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<LoginForm>,
) -> impl Responder {
    let LoginForm { email, password, next } = form.into_inner();
    let next = safe_next(next.as_deref());

    let attempt = email.clone();
    match with_account(&data, &session, move |auth, store| auth.login(store, &attempt, &password)).await {
        Ok(user) => {
            info!("{} signed in", user.email);
            see_other(next.as_deref().unwrap_or(PROFILE_PATH))
        }
        Err(e) => {
            if !matches!(e, DataSphereError::ValidationError(_)) {
                error!("Login failed: {}", e);
            }
            let store = data.client(&session);
            let mut context = base_context(&data, &store, "Connexion");
            context["error"] = json!(e.message());
            context["email"] = json!(email);
            context["next"] = json!(next);
            render_status(error_status(&e), "login", &context)
        }
    }
}

/// Serve the signup page
pub async fn signup_page(data: web::Data<AppState>, session: Session) -> impl Responder {
    let store = data.client(&session);
    render("signup", &base_context(&data, &store, "Inscription"))
}

pub async fn signup(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<SignupForm>,
) -> impl Responder {
    let form = form.into_inner();
    let submitted = json!({
        "name": form.name,
        "email": form.email,
        "age": form.age,
        "school": form.school,
        "city": form.city,
    });

    match with_account(&data, &session, move |auth, store| auth.signup(store, &form)).await {
        Ok(_) => see_other(PROFILE_PATH),
        Err(e) => {
            let store = data.client(&session);
            let mut context = base_context(&data, &store, "Inscription");
            context["error"] = json!(e.message());
            context["form"] = submitted;
            render_status(error_status(&e), "signup", &context)
        }
    }
}

pub async fn logout(data: web::Data<AppState>, session: Session) -> impl Responder {
    if let Err(e) = data.auth.logout(&data.client(&session)) {
        error!("Logout failed: {}", e);
    }
    see_other("/")
}

fn profile_response(data: &AppState, session: &Session, user: User, error: Option<&DataSphereError>) -> HttpResponse {
    let store = data.client(session);
    let mut context = base_context(data, &store, &user.name);
    context["profile"] = json!(user);
    context["global_progress"] = json!(global_progress_percentage(catalog(), &get_progress(&store)));
    match error {
        Some(e) => {
            context["error"] = json!(e.message());
            render_status(error_status(e), "profile", &context)
        }
        None => render("profile", &context),
    }
}

/// Serve the profile page; signed-in visitors only
pub async fn profile_page(data: web::Data<AppState>, session: Session) -> impl Responder {
    match data.auth.current_user(&data.client(&session)) {
        Some(user) => profile_response(&data, &session, user, None),
        None => login_redirect(PROFILE_PATH),
    }
}

/// Back to the profile after an edit, or show why it failed
fn after_edit(data: &AppState, session: &Session, result: Result<User>) -> HttpResponse {
    match result {
        Ok(_) => see_other(PROFILE_PATH),
        Err(DataSphereError::Unauthorized(_)) => login_redirect(PROFILE_PATH),
        Err(e) => match data.auth.current_user(&data.client(session)) {
            Some(user) => profile_response(data, session, user, Some(&e)),
            None => login_redirect(PROFILE_PATH),
        },
    }
}

pub async fn update_profile(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<ProfileUpdate>,
) -> impl Responder {
    let update = form.into_inner();
    let result = with_account(&data, &session, move |auth, store| auth.update_user(store, &update)).await;
    after_edit(&data, &session, result)
}

pub async fn add_experience(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<ExperienceForm>,
) -> impl Responder {
    let form = form.into_inner();
    let result = with_account(&data, &session, move |auth, store| auth.add_experience(store, &form)).await;
    after_edit(&data, &session, result)
}

pub async fn remove_experience(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let result = with_account(&data, &session, move |auth, store| auth.remove_experience(store, &id)).await;
    after_edit(&data, &session, result)
}

pub async fn add_education(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<EducationForm>,
) -> impl Responder {
    let form = form.into_inner();
    let result = with_account(&data, &session, move |auth, store| auth.add_education(store, &form)).await;
    after_edit(&data, &session, result)
}

pub async fn remove_education(
    data: web::Data<AppState>,
    session: Session,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let result = with_account(&data, &session, move |auth, store| auth.remove_education(store, &id)).await;
    after_edit(&data, &session, result)
}

#[cfg(test)]
mod tests {
    use crate::services::auth::User;
    use crate::services::storage::{USER_ID_KEY, USER_KEY};
    use crate::web::handlers::test_support::{session_cookie, state};
    use crate::web::server::configure;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};

    fn signup_fields(age: &'static str) -> [(&'static str, &'static str); 6] {
        [
            ("name", "Sara Idrissi"),
            ("email", "sara@example.ma"),
            ("password", "secret1"),
            ("age", age),
            ("school", "ENSIAS"),
            ("city", "Rabat"),
        ]
    }

    #[actix_web::test]
    async fn test_signup_then_profile() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;
        let cookie = session_cookie();

        let req = test::TestRequest::post()
            .uri("/signup")
            .cookie(cookie.clone())
            .set_form(signup_fields("20"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/profile");

        let store = data.storage.client(cookie.value());
        assert!(store.get_item(USER_ID_KEY).is_some());

        let req = test::TestRequest::get().uri("/profile").cookie(cookie.clone()).to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("Sara Idrissi"));

        let req = test::TestRequest::post()
            .uri("/profile/experience")
            .cookie(cookie.clone())
            .set_form([("role", "Data Analyst"), ("company", "OCP"), ("year", "2024")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let user: User = store.get_json(USER_KEY).unwrap().unwrap();
        assert_eq!(user.experience.len(), 1);
        assert_eq!(user.experience[0].role, "Data Analyst");
    }

    #[actix_web::test]
    async fn test_signup_validation_message() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/signup")
            .set_form(signup_fields("12"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Vous devez avoir au moins 14 ans pour vous inscrire."));
    }

    #[actix_web::test]
    async fn test_login_redirects_to_next() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;
        let cookie = session_cookie();

        let req = test::TestRequest::post()
            .uri("/login")
            .cookie(cookie.clone())
            .set_form([
                ("email", "visiteur@example.ma"),
                ("password", "whatever"),
                ("next", "/lesson/sql-mastery/sql-1-1"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/lesson/sql-mastery/sql-1-1"
        );

        // unknown credentials fall back to the demo profile
        let store = data.storage.client(cookie.value());
        let user: User = store.get_json(USER_KEY).unwrap().unwrap();
        assert_eq!(user.email, "visiteur@example.ma");

        let req = test::TestRequest::post().uri("/logout").cookie(cookie).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert!(store.get_item(USER_KEY).is_none());
    }

    #[actix_web::test]
    async fn test_login_rejects_blank_email_and_offsite_next() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("email", " "), ("password", "x")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("email", "a@b.ma"), ("password", "x"), ("next", "//evil.example")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/profile");
    }

    #[actix_web::test]
    async fn test_profile_requires_user() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/profile/education")
            .set_form([("school", "ENSIAS")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login?next=%2Fprofile");
    }
}

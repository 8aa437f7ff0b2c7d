use std::sync::Arc;
use std::time::Instant;

use actix_files as fs;
use actix_web::dev::Service;
use actix_web::{middleware, web, App, HttpServer};
use log::{info, warn};

use crate::config::AppConfig;
use crate::core::Result;
use crate::db::UserStore;
use crate::services::{AuthService, ClientStore, ProgressService, SandboxPool, StorageRegistry};
use crate::web::handlers;
use crate::web::session::{self, Session};

/// Shared application state for web handlers
pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<StorageRegistry>,
    pub users: Arc<dyn UserStore>,
    pub sandboxes: SandboxPool,
    pub auth: AuthService,
    pub progress: ProgressService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, storage: StorageRegistry, users: Arc<dyn UserStore>) -> Result<Self> {
        let sandboxes = SandboxPool::new(config.sandbox.clone())?;
        Ok(Self {
            storage: Arc::new(storage),
            auth: AuthService::new(Arc::clone(&users)),
            progress: ProgressService::new(Arc::clone(&users)),
            users,
            sandboxes,
            config,
            started_at: Instant::now(),
        })
    }

    /// Client storage of the requesting session
    pub fn client(&self, session: &Session) -> ClientStore {
        self.storage.client(session.id())
    }
}

/// Route table shared by the server and the handler tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // {action, data} endpoint, also reachable under its serverless path
        .service(
            web::resource("/api")
                .route(web::post().to(handlers::api::dispatch_action))
                .default_service(web::to(handlers::api::method_not_allowed)),
        )
        .service(
            web::resource("/.netlify/functions/api")
                .route(web::post().to(handlers::api::dispatch_action))
                .default_service(web::to(handlers::api::method_not_allowed)),
        )
        // JSON APIs
        .service(
            web::scope("/api")
                .route("/status", web::get().to(handlers::system::get_status))
                .route("/tracks", web::get().to(handlers::system::list_tracks))
                .route("/progress", web::get().to(handlers::learning::get_progress))
                .route("/progress/{lesson_id}/toggle", web::post().to(handlers::learning::toggle_progress))
                .route("/tracks/{track_id}/reviews", web::get().to(handlers::learning::list_reviews))
                .route("/tracks/{track_id}/reviews", web::post().to(handlers::learning::post_review))
                .route("/sandbox/schema", web::get().to(handlers::practice::get_schema))
                .route("/sandbox/examples", web::get().to(handlers::practice::get_examples))
                .route("/sandbox/run", web::post().to(handlers::practice::run_query))
                .route("/sandbox/reset", web::post().to(handlers::practice::reset_database)),
        )
        .route("/search", web::get().to(handlers::system::search))
        .route("/metrics", web::get().to(handlers::system::get_metrics))
        // Page routes
        .route("/", web::get().to(handlers::pages::index))
        .route("/sql-mastery", web::get().to(handlers::pages::sql_mastery))
        .route("/track/{track_id}", web::get().to(handlers::pages::track))
        .route("/track/{track_id}/reviews", web::post().to(handlers::learning::submit_review))
        .route("/lesson/{track_id}/{lesson_id}", web::get().to(handlers::pages::lesson))
        .route("/lesson/{track_id}/{lesson_id}/complete", web::post().to(handlers::learning::complete_lesson))
        .route("/lesson/{track_id}/{lesson_id}/quiz", web::post().to(handlers::learning::submit_quiz))
        .route("/practise-sql", web::get().to(handlers::practice::practice_page))
        .route("/practise-sql", web::post().to(handlers::practice::run_from_page))
        .route("/practise-sql/reset", web::post().to(handlers::practice::reset_from_page))
        .route("/login", web::get().to(handlers::account::login_page))
        .route("/login", web::post().to(handlers::account::login))
        .route("/signup", web::get().to(handlers::account::signup_page))
        .route("/signup", web::post().to(handlers::account::signup))
        .route("/logout", web::post().to(handlers::account::logout))
        .route("/profile", web::get().to(handlers::account::profile_page))
        .route("/profile", web::post().to(handlers::account::update_profile))
        .route("/profile/experience", web::post().to(handlers::account::add_experience))
        .route("/profile/experience/{id}/delete", web::post().to(handlers::account::remove_experience))
        .route("/profile/education", web::post().to(handlers::account::add_education))
        .route("/profile/education/{id}/delete", web::post().to(handlers::account::remove_education))
        .route("/confidentialite", web::get().to(handlers::pages::privacy))
        .route("/conditions", web::get().to(handlers::pages::terms))
        .route("/contact", web::get().to(handlers::pages::contact))
        .route("/contact", web::post().to(handlers::pages::send_contact));
}

/// Start the DataSphere web server
pub async fn start_web_server(state: AppState) -> std::io::Result<()> {
    let bind_address = state.config.bind_address.clone();
    let static_dir = state.config.static_dir.clone();
    info!("Starting web server on http://{}", bind_address);

    let app_state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap_fn(|req, srv| {
                let issued = session::ensure(&req);
                let fut = srv.call(req);
                async move {
                    let mut res = fut.await?;
                    if let Some(id) = issued {
                        if let Err(e) = res.response_mut().add_cookie(&session::cookie(&id)) {
                            warn!("Failed to set session cookie: {}", e);
                        }
                    }
                    Ok(res)
                }
            })
            .app_data(app_state.clone())
            // Static files
            .service(fs::Files::new("/static", &static_dir))
            .configure(configure)
            // Default route for 404
            .default_service(web::to(handlers::pages::not_found))
    })
    .bind(bind_address)?
    .run()
    .await
}

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use log::{debug, warn};

use crate::db::{self, ApiReply, ApiRequest};
use crate::web::handlers::blocking;
use crate::web::models::ErrorResponse;
use crate::web::server::AppState;

fn reply(reply: ApiReply) -> HttpResponse {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(reply.body)
}

/// Single `{action, data}` endpoint backed by the user store
pub async fn dispatch_action(data: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: ApiRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected API body: {}", e);
            return reply(ApiReply::malformed(e.to_string()));
        }
    };
    debug!("API action {}", request.action);

    let users = Arc::clone(&data.users);
    match blocking(move || Ok(db::dispatch(users.as_ref(), request))).await {
        Ok(r) => reply(r),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::from_error(&e)),
    }
}

pub async fn method_not_allowed() -> impl Responder {
    reply(ApiReply::method_not_allowed())
}

use std::future::{ready, Ready};

use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{Payload, ServiceRequest};
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "ds_session";

/// Identifier of the visitor session, taken from the `ds_session` cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(pub String);

impl Session {
    pub fn id(&self) -> &str {
        &self.0
    }
}

fn from_cookie(req: &HttpRequest) -> Option<String> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    Uuid::parse_str(cookie.value()).ok()?;
    Some(cookie.value().to_string())
}

/// Attach a session to an incoming request. Returns the id when a new one was
/// issued, so the caller can set the cookie on the response.
pub fn ensure(req: &ServiceRequest) -> Option<String> {
    if from_cookie(req.request()).is_some() {
        return None;
    }
    let id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(Session(id.clone()));
    Some(id)
}

pub fn cookie(id: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .permanent()
        .finish()
}

impl FromRequest for Session {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session = from_cookie(req)
            .map(Session)
            .or_else(|| req.extensions().get::<Session>().cloned())
            .unwrap_or_else(|| Session(Uuid::new_v4().to_string()));
        ready(Ok(session))
    }
}

pub mod account;
pub mod api;
pub mod learning;
pub mod pages;
pub mod practice;
pub mod system;

use actix_web::http::header;
use actix_web::{web, HttpResponse};

use crate::core::Result;

/// Run synchronous store or sandbox work on the blocking pool
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(f).await?
}

/// 303 redirect after a form post
pub(crate) fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

/// Only same-site absolute paths are accepted as redirect targets
pub(crate) fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        Some(next.to_string())
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use actix_web::cookie::Cookie;
    use actix_web::web;
    use uuid::Uuid;

    use crate::config::AppConfig;
    use crate::db::SqliteStore;
    use crate::services::StorageRegistry;
    use crate::web::server::AppState;
    use crate::web::session::SESSION_COOKIE;

    pub fn state() -> web::Data<AppState> {
        let users = Arc::new(SqliteStore::open(":memory:").unwrap());
        web::Data::new(AppState::new(AppConfig::default(), StorageRegistry::in_memory(), users).unwrap())
    }

    pub fn session_cookie() -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/lesson/sql-mastery/sql-1-1")).as_deref(), Some("/lesson/sql-mastery/sql-1-1"));
        assert!(safe_next(Some("//evil.example")).is_none());
        assert!(safe_next(Some("https://evil.example")).is_none());
        assert!(safe_next(None).is_none());
    }
}

//! HTTP surface: server setup, session cookie, request/response models and
//! the page and JSON handlers.

pub mod handlers;
pub mod models;
pub mod server;
pub mod session;

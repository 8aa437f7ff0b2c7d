//! Relational user store and the `{action, data}` endpoint built on it.

pub mod api;
pub mod sqlite;
pub mod store;

pub use api::{dispatch, ApiReply, ApiRequest};
pub use sqlite::SqliteStore;
pub use store::UserStore;

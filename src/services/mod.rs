pub mod auth;
pub mod progress;
pub mod reviews;
pub mod sandbox;
pub mod storage;

pub use auth::AuthService;
pub use progress::ProgressService;
pub use sandbox::SandboxPool;
pub use storage::{ClientStore, StorageRegistry};

//! Cross-cutting pieces shared by every DataSphere module: the error taxonomy
//! and the process-wide metrics.

pub mod error;
pub mod metrics;

pub use error::{DataSphereError, Result};

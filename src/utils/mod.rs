// src/utils/mod.rs

pub mod error;
pub mod logger;
pub mod time;

// Re-export commonly used items
pub use error::{ErrorDetails, ErrorKind, EvaluationError, RouterError, RouterResult};
pub use logger::*;
pub use time::*;

pub mod error;
pub mod format;
pub mod level;

pub use crate::error::DomainError;
pub use crate::format::{is_candidate, AudioFormat, SampleFormat};
pub use crate::level::{db_to_linear, linear_to_db, TargetLevel};

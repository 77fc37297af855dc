//! Shared types: error taxonomy and the response contract

mod error;
mod outcome;

pub use error::{is_duplicate_key, KoinoniaError, Result};
pub use outcome::{ApiOutcome, StatusKind};

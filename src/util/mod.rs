//! Cross-cutting helpers: error types, time handling, cancellation,
//! and application constants.

pub mod cancel;
pub mod constants;
pub mod error;
pub mod time;

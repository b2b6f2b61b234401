//! Application modules
//! Contains specialized services used around the provider calls

pub mod content_filter;

pub use content_filter::{ContentFilter, BLOCKED_MESSAGE};

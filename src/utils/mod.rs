//! Shared utility functions.
//!
//! - `text`: whitespace normalization and boilerplate stripping for scraped text
//! - `retry`: exponential backoff for transient failures

mod retry;
mod text;

pub use retry::backoff_delay;
pub use text::{clean_text, normalize_whitespace, strip_boilerplate, truncate_chars};

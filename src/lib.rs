//! jobscout - job listing discovery and qualification scoring.
//!
//! Searches a professional-network job board, either through its public
//! guest endpoints or by driving the search UI in a browser session, and
//! scores the resulting listings against a candidate profile without
//! exceeding the scoring service's quotas.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod quota;
pub mod scrapers;
pub mod services;
pub mod utils;

pub use error::ErrorKind;

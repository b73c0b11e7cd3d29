//! Job listing scraping.
//!
//! A search runs either over the public guest endpoints (plain HTTP) or by
//! driving the search UI in a browser. Every browser interaction goes
//! through [`PageDriver`], and every selector through [`SelectorStrategy`].

pub mod browser;
pub mod captcha;
pub mod config;
pub mod extractor;
pub mod filters;
pub mod guest;
pub mod interface;
pub mod page;
pub mod planner;
pub mod search;
pub mod selectors;
pub mod session;
mod user_agent;

pub use browser::{BrowserEngineConfig, BrowserEngineType, BrowserLauncher};
pub use captcha::{CaptchaGate, CaptchaInfo, ChallengeType, Resolution};
pub use config::{CaptchaConfig, ScrapeConfig, SessionConfig};
pub use extractor::JobExtractor;
pub use filters::{AppliedFilterReport, FilterEngine, FilterError, ResultsState};
pub use guest::GuestSearchClient;
pub use interface::InterfaceDetector;
pub use page::{Locator, PageDriver, PageError, SnapshotPage};
pub use planner::{plan, SearchPlan, SearchStrategy};
pub use search::{JobSearchRunner, ScrapeError, SearchRunReport};
pub use selectors::{Field, InterfaceGeneration, SelectorStrategy};
pub use session::{Credentials, FileSessionStore, SessionError, SessionManager, SessionStore};
pub use user_agent::resolve_user_agent;

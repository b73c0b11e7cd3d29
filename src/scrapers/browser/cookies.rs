//! Browser state carried between runs in a session's state blob.

use serde::{Deserialize, Serialize};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
#[cfg(feature = "browser")]
use tracing::warn;

/// Cookie as stored in the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

/// What `export_state` produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserState {
    #[serde(default)]
    pub cookies: Vec<BrowserCookie>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl BrowserState {
    pub fn to_blob(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }

    /// Unknown or damaged blobs restore nothing.
    pub fn from_blob(blob: &serde_json::Value) -> Self {
        serde_json::from_value(blob.clone()).unwrap_or_default()
    }

    /// Cookies that can be set again: named and scoped to a domain.
    pub fn restorable(&self) -> impl Iterator<Item = &BrowserCookie> {
        self.cookies
            .iter()
            .filter(|c| !c.name.is_empty() && !c.domain.is_empty())
    }
}

#[cfg(feature = "browser")]
impl From<&Cookie> for BrowserCookie {
    fn from(c: &Cookie) -> Self {
        Self {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            secure: c.secure,
            http_only: c.http_only,
        }
    }
}

#[cfg(feature = "browser")]
pub(crate) fn cookie_params(state: &BrowserState) -> Vec<CookieParam> {
    state
        .restorable()
        .filter_map(|c| {
            match CookieParam::builder()
                .name(c.name.clone())
                .value(c.value.clone())
                .domain(c.domain.clone())
                .path(c.path.clone())
                .secure(c.secure)
                .http_only(c.http_only)
                .build()
            {
                Ok(param) => Some(param),
                Err(e) => {
                    warn!("Failed to build cookie {}: {}", c.name, e);
                    None
                }
            }
        })
        .collect()
}

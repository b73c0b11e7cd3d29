//! Scraping session state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Authentication state of a browser session.
///
/// ```text
/// unauthenticated -> authenticating -> authenticated
///                                   -> challenged -> authenticated
///                                                 -> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    Challenged,
    Failed,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Challenged => "challenged",
            Self::Failed => "failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Any state may drop back to unauthenticated (logout, expiry).
    pub fn can_transition_to(&self, next: AuthState) -> bool {
        use AuthState::*;
        matches!(
            (*self, next),
            (_, Unauthenticated)
                | (Unauthenticated, Authenticating)
                | (Failed, Authenticating)
                | (Authenticating, Authenticated)
                | (Authenticating, Challenged)
                | (Authenticating, Failed)
                | (Authenticated, Challenged)
                | (Challenged, Authenticated)
                | (Challenged, Failed)
        )
    }
}

/// One browser session: login state plus the opaque cookie/fingerprint blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingSession {
    pub id: String,
    pub label: String,
    pub auth_state: AuthState,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Browser state owned by the browser layer (cookies, user agent).
    #[serde(default)]
    pub state_blob: Option<serde_json::Value>,
}

impl ScrapingSession {
    pub fn new(label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            auth_state: AuthState::Unauthenticated,
            created_at: now,
            last_used_at: now,
            state_blob: None,
        }
    }

    /// Whether the session has been idle longer than `idle_expiry` at `now`.
    pub fn is_expired_at(&self, idle_expiry: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_used_at > idle_expiry
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    pub fn metadata(&self, idle_expiry: Duration) -> SessionMetadata {
        SessionMetadata {
            id: self.id.clone(),
            label: self.label.clone(),
            auth_state: self.auth_state,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            expired: self.is_expired_at(idle_expiry, Utc::now()),
        }
    }
}

/// Listing view of a stored session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    pub id: String,
    pub label: String,
    pub auth_state: AuthState,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use AuthState::*;
        assert!(Unauthenticated.can_transition_to(Authenticating));
        assert!(Authenticating.can_transition_to(Challenged));
        assert!(Challenged.can_transition_to(Authenticated));
        assert!(Challenged.can_transition_to(Failed));
        assert!(Authenticated.can_transition_to(Unauthenticated));

        assert!(!Unauthenticated.can_transition_to(Authenticated));
        assert!(!Failed.can_transition_to(Authenticated));
        assert!(!Challenged.can_transition_to(Authenticating));
    }

    #[test]
    fn test_expiry() {
        let mut session = ScrapingSession::new("main");
        let now = Utc::now();
        session.last_used_at = now - Duration::days(8);
        assert!(session.is_expired_at(Duration::days(7), now));
        session.last_used_at = now - Duration::days(6);
        assert!(!session.is_expired_at(Duration::days(7), now));
    }
}

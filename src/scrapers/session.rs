//! Session ownership, persistence and login.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::captcha::{CaptchaGate, CaptchaInfo, ChallengeType, Resolution};
use super::config::{ScrapeConfig, SessionConfig};
use super::page::{wait_for_any, Locator, PageDriver, PageError};
use super::selectors::{Field, InterfaceGeneration, SelectorStrategy};
use crate::error::ErrorKind;
use crate::models::{AuthState, ScrapingSession, SessionMetadata};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt session data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid session id: {0}")]
    InvalidId(String),
    #[error("No session loaded")]
    NoActiveSession,
    #[error("Invalid auth transition {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("Login form not found")]
    LoginFormMissing,
    #[error("Login rejected by the site")]
    LoginRejected,
    #[error("Challenge ({0}) was not resolved in time")]
    ChallengeTimedOut(ChallengeType),
    #[error(transparent)]
    Page(#[from] PageError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::LoginFormMissing => ErrorKind::Retryable,
            Self::ChallengeTimedOut(_) => ErrorKind::RequiresHuman,
            Self::Page(e) => e.kind(),
            Self::Serialization(_)
            | Self::InvalidId(_)
            | Self::NoActiveSession
            | Self::InvalidTransition { .. }
            | Self::LoginRejected => ErrorKind::Terminal,
        }
    }
}

/// Where session blobs live. Keyed by session id; the format is the store's.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<ScrapingSession>, SessionError>;
    async fn save(&self, session: &ScrapingSession) -> Result<(), SessionError>;
    async fn list(&self) -> Result<Vec<ScrapingSession>, SessionError>;
    async fn delete(&self, id: &str) -> Result<(), SessionError>;
}

/// One JSON file per session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, SessionError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> Result<Option<ScrapingSession>, SessionError> {
        let path = self.path_for(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, session: &ScrapingSession) -> Result<(), SessionError> {
        let path = self.path_for(&session.id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ScrapingSession>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<ScrapingSession>(&content) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("Skipping unreadable session file {:?}: {}", path, e),
            }
        }
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Login credentials. The password never appears in debug output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read `JOBSCOUT_USERNAME` and `JOBSCOUT_PASSWORD`.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            username: std::env::var("JOBSCOUT_USERNAME").ok()?,
            password: std::env::var("JOBSCOUT_PASSWORD").ok()?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Owns the active browser session.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    idle_expiry: chrono::Duration,
    selectors: SelectorStrategy,
    base_url: String,
    wait: Duration,
    poll: Duration,
    active: Option<ScrapingSession>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        let scrape = ScrapeConfig::base_default();
        Self {
            store,
            idle_expiry: config.idle_expiry(),
            selectors: SelectorStrategy::default(),
            base_url: scrape.base().to_string(),
            wait: scrape.element_wait(),
            poll: scrape.poll(),
            active: None,
        }
    }

    pub fn with_scrape_config(mut self, scrape: &ScrapeConfig) -> Self {
        self.base_url = scrape.base().to_string();
        self.wait = scrape.element_wait();
        self.poll = scrape.poll();
        self
    }

    pub fn with_selectors(mut self, selectors: SelectorStrategy) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn active(&self) -> Option<&ScrapingSession> {
        self.active.as_ref()
    }

    /// Create, store and activate a fresh unauthenticated session.
    pub async fn create_session(&mut self, label: &str) -> Result<String, SessionError> {
        let session = ScrapingSession::new(label);
        self.store.save(&session).await?;
        info!("Created session {} ({})", session.id, label);
        let id = session.id.clone();
        self.active = Some(session);
        Ok(id)
    }

    /// Activate a stored session. Unknown and idle-expired sessions are not loadable.
    pub async fn load_session(&mut self, id: &str) -> Result<bool, SessionError> {
        let Some(mut session) = self.store.load(id).await? else {
            debug!("Session {} not found", id);
            return Ok(false);
        };
        if session.is_expired_at(self.idle_expiry, Utc::now()) {
            info!(
                "Session {} idle since {}, not loading",
                id,
                session.last_used_at.format("%Y-%m-%d")
            );
            return Ok(false);
        }
        session.touch();
        self.store.save(&session).await?;
        self.active = Some(session);
        Ok(true)
    }

    pub async fn persist(&self, session: &ScrapingSession) -> Result<(), SessionError> {
        self.store.save(session).await
    }

    pub fn is_authenticated(&self, session: &ScrapingSession) -> bool {
        session.auth_state == AuthState::Authenticated
            && !session.is_expired_at(self.idle_expiry, Utc::now())
    }

    /// Metadata for every stored session, most recently used first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionMetadata>, SessionError> {
        let mut sessions = self.store.list().await?;
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions
            .iter()
            .map(|s| s.metadata(self.idle_expiry))
            .collect())
    }

    /// Drop login state and browser blob, and deactivate the session.
    pub async fn expire(&mut self, session: &mut ScrapingSession) -> Result<(), SessionError> {
        session.auth_state = AuthState::Unauthenticated;
        session.state_blob = None;
        self.store.save(session).await?;
        if self.active.as_ref().is_some_and(|a| a.id == session.id) {
            self.active = None;
        }
        info!("Expired session {}", session.id);
        Ok(())
    }

    /// Expire a stored session by id. Returns false when it does not exist.
    pub async fn expire_by_id(&mut self, id: &str) -> Result<bool, SessionError> {
        let Some(mut session) = self.store.load(id).await? else {
            return Ok(false);
        };
        self.expire(&mut session).await?;
        Ok(true)
    }

    /// Restore the active session's browser state into `page`.
    pub async fn attach(&self, page: &dyn PageDriver) -> Result<(), SessionError> {
        let session = self.active.as_ref().ok_or(SessionError::NoActiveSession)?;
        if let Some(blob) = &session.state_blob {
            page.import_state(blob).await?;
        }
        Ok(())
    }

    /// Store the page's current browser state on the active session.
    pub async fn capture(&mut self, page: &dyn PageDriver) -> Result<(), SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        if let Some(blob) = page.export_state().await? {
            session.state_blob = Some(blob);
        }
        session.touch();
        self.store.save(session).await
    }

    /// Apply challenges met during a search to the active session and store it.
    ///
    /// Each challenge moves the session to `challenged`, then back to
    /// `authenticated`; when `last_unresolved` is set the final one ends in
    /// `failed` instead. Sessions that were never logged in are left alone.
    pub async fn record_challenges(
        &mut self,
        challenges: &[CaptchaInfo],
        last_unresolved: bool,
    ) -> Result<AuthState, SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        for (idx, info) in challenges.iter().enumerate() {
            if !session.auth_state.can_transition_to(AuthState::Challenged) {
                debug!(
                    "Session {} is {}; not tracking the {} challenge",
                    session.id,
                    session.auth_state.as_str(),
                    info.challenge_type
                );
                break;
            }
            transition(session, AuthState::Challenged)?;
            let unresolved = last_unresolved && idx + 1 == challenges.len();
            if unresolved {
                warn!("Session {} failed on an unresolved {} challenge", session.id, info.challenge_type);
                transition(session, AuthState::Failed)?;
            } else {
                transition(session, AuthState::Authenticated)?;
            }
        }
        session.touch();
        self.store.save(session).await?;
        Ok(session.auth_state)
    }

    /// Log the active session in, suspending on challenges.
    ///
    /// A stored browser blob is tried first; the login form is only used
    /// when it does not land on an authenticated page. The session is
    /// persisted whatever the outcome.
    pub async fn authenticate(
        &mut self,
        page: &dyn PageDriver,
        credentials: &Credentials,
        gate: &CaptchaGate,
    ) -> Result<AuthState, SessionError> {
        let mut session = self.active.take().ok_or(SessionError::NoActiveSession)?;
        let result = self.drive_login(&mut session, page, credentials, gate).await;
        if result.is_err() && session.auth_state.can_transition_to(AuthState::Failed) {
            warn!(
                "Login for session {} stopped while {}; marking it failed",
                session.id,
                session.auth_state.as_str()
            );
            session.auth_state = AuthState::Failed;
        }
        session.touch();
        let saved = self.store.save(&session).await;
        self.active = Some(session);
        saved?;
        result
    }

    async fn drive_login(
        &self,
        session: &mut ScrapingSession,
        page: &dyn PageDriver,
        credentials: &Credentials,
        gate: &CaptchaGate,
    ) -> Result<AuthState, SessionError> {
        if !matches!(
            session.auth_state,
            AuthState::Unauthenticated | AuthState::Failed
        ) {
            transition(session, AuthState::Unauthenticated)?;
        }
        transition(session, AuthState::Authenticating)?;

        if let Some(blob) = session.state_blob.clone() {
            page.import_state(&blob).await?;
            page.navigate(&format!("{}/feed/", self.base_url)).await?;
            if self.landed(page).await? {
                info!("Session {} restored from stored browser state", session.id);
                return self.finish_login(session, page).await;
            }
            debug!("Stored browser state did not authenticate, using the login form");
        }

        page.navigate(&format!("{}/login", self.base_url)).await?;
        if let Some(info) = gate.check(page).await? {
            return self.resolve_challenge(session, page, gate, &info).await;
        }

        let username = self.chain(Field::LoginUsername);
        if wait_for_any(page, &username, self.wait, self.poll)
            .await?
            .is_none()
        {
            transition(session, AuthState::Failed)?;
            return Err(SessionError::LoginFormMissing);
        }
        let password = self.chain(Field::LoginPassword);
        if !fill_first(page, &username, &credentials.username).await?
            || !fill_first(page, &password, &credentials.password).await?
        {
            warn!("Login form for session {} has no fillable credential field", session.id);
            transition(session, AuthState::Failed)?;
            return Err(SessionError::LoginFormMissing);
        }
        if !click_first(page, &self.chain(Field::LoginSubmit)).await? {
            submit_first(page, &username).await?;
        }

        let errors = self.chain(Field::LoginError);
        let start = Instant::now();
        loop {
            if self.landed(page).await? {
                return self.finish_login(session, page).await;
            }
            if let Some(info) = gate.check(page).await? {
                return self.resolve_challenge(session, page, gate, &info).await;
            }
            if any_present(page, &errors).await? {
                warn!("Login rejected for session {}", session.id);
                transition(session, AuthState::Failed)?;
                return Err(SessionError::LoginRejected);
            }
            if start.elapsed() >= self.wait {
                transition(session, AuthState::Failed)?;
                return Err(PageError::Timeout {
                    after: self.wait,
                    what: "post-login landing page".to_string(),
                }
                .into());
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    async fn resolve_challenge(
        &self,
        session: &mut ScrapingSession,
        page: &dyn PageDriver,
        gate: &CaptchaGate,
        info: &CaptchaInfo,
    ) -> Result<AuthState, SessionError> {
        transition(session, AuthState::Challenged)?;
        match gate.await_resolution(page, info).await {
            Resolution::Resolved => self.finish_login(session, page).await,
            Resolution::TimedOut => {
                transition(session, AuthState::Failed)?;
                Err(SessionError::ChallengeTimedOut(info.challenge_type))
            }
        }
    }

    async fn finish_login(
        &self,
        session: &mut ScrapingSession,
        page: &dyn PageDriver,
    ) -> Result<AuthState, SessionError> {
        transition(session, AuthState::Authenticated)?;
        if let Some(blob) = page.export_state().await? {
            session.state_blob = Some(blob);
        }
        info!("Session {} authenticated", session.id);
        Ok(AuthState::Authenticated)
    }

    async fn landed(&self, page: &dyn PageDriver) -> Result<bool, PageError> {
        any_present(page, &self.chain(Field::AuthenticatedMarker)).await
    }

    fn chain(&self, field: Field) -> Vec<Locator> {
        self.selectors.chain(InterfaceGeneration::Semantic, field)
    }
}

fn transition(session: &mut ScrapingSession, next: AuthState) -> Result<(), SessionError> {
    if !session.auth_state.can_transition_to(next) {
        return Err(SessionError::InvalidTransition {
            from: session.auth_state.as_str(),
            to: next.as_str(),
        });
    }
    debug!(
        "Session {}: {} -> {}",
        session.id,
        session.auth_state.as_str(),
        next.as_str()
    );
    session.auth_state = next;
    Ok(())
}

async fn any_present(page: &dyn PageDriver, chain: &[Locator]) -> Result<bool, PageError> {
    for locator in chain {
        if page.count(locator).await? > 0 {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn fill_first(page: &dyn PageDriver, chain: &[Locator], value: &str) -> Result<bool, PageError> {
    for locator in chain {
        if page.fill(locator, value).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn click_first(page: &dyn PageDriver, chain: &[Locator]) -> Result<bool, PageError> {
    for locator in chain {
        if page.click(locator).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn submit_first(page: &dyn PageDriver, chain: &[Locator]) -> Result<bool, PageError> {
    for locator in chain {
        if page.submit(locator).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::page::SnapshotPage;

    fn manager(dir: &Path) -> SessionManager {
        let scrape = ScrapeConfig {
            element_wait_secs: 0,
            poll_ms: 1,
            ..ScrapeConfig::base_default()
        };
        SessionManager::new(
            Arc::new(FileSessionStore::new(dir)),
            &SessionConfig::base_default(),
        )
        .with_scrape_config(&scrape)
    }

    fn creds() -> Credentials {
        Credentials {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn fast_gate() -> CaptchaGate {
        CaptchaGate::default().with_timing(Duration::from_millis(20), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let id = mgr.create_session("work").await.unwrap();

        let mut other = manager(dir.path());
        assert!(other.load_session(&id).await.unwrap());
        assert_eq!(other.active().unwrap().label, "work");
        assert!(!other.load_session("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_idle_session_not_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let mut session = ScrapingSession::new("old");
        session.last_used_at = Utc::now() - chrono::Duration::days(8);
        store.save(&session).await.unwrap();

        let mut mgr = manager(dir.path());
        assert!(!mgr.load_session(&session.id).await.unwrap());
        assert!(mgr.active().is_none());

        let listed = mgr.list_sessions().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].expired);
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let store = FileSessionStore::new("/tmp/unused");
        assert!(matches!(
            store.load("../etc/passwd").await,
            Err(SessionError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_clears_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let id = mgr.create_session("work").await.unwrap();
        let mut session = mgr.active().cloned().unwrap();
        session.auth_state = AuthState::Authenticated;
        session.state_blob = Some(serde_json::json!({"cookies": []}));
        assert!(mgr.is_authenticated(&session));

        mgr.expire(&mut session).await.unwrap();
        assert!(mgr.active().is_none());
        assert!(!mgr.is_authenticated(&session));

        assert!(mgr.load_session(&id).await.unwrap());
        let reloaded = mgr.active().unwrap();
        assert_eq!(reloaded.auth_state, AuthState::Unauthenticated);
        assert!(reloaded.state_blob.is_none());
    }

    #[tokio::test]
    async fn test_expire_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let id = mgr.create_session("work").await.unwrap();

        assert!(mgr.expire_by_id(&id).await.unwrap());
        assert!(mgr.active().is_none());
        assert!(!mgr.expire_by_id("no-such-session").await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_blob_restores_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        mgr.create_session("work").await.unwrap();
        let mut session = mgr.active().cloned().unwrap();
        session.state_blob = Some(serde_json::json!({"cookies": []}));
        mgr.persist(&session).await.unwrap();
        assert!(mgr.load_session(&session.id).await.unwrap());

        let page = SnapshotPage::new(
            "<html><body><nav id='global-nav'></nav></body></html>",
            "https://www.linkedin.com/feed/",
        );
        let state = mgr.authenticate(&page, &creds(), &fast_gate()).await.unwrap();
        assert_eq!(state, AuthState::Authenticated);
        assert!(mgr.is_authenticated(mgr.active().unwrap()));
    }

    #[tokio::test]
    async fn test_challenge_timeout_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let id = mgr.create_session("work").await.unwrap();

        let page = SnapshotPage::new(
            r#"<html><body>
                <input id="username"><input id="password">
                <button type="submit">Sign in</button>
                <div class="g-recaptcha"></div>
            </body></html>"#,
            "https://www.linkedin.com/login",
        );
        let err = mgr.authenticate(&page, &creds(), &fast_gate()).await.unwrap_err();
        assert!(matches!(err, SessionError::ChallengeTimedOut(ChallengeType::RobotCheck)));
        assert_eq!(err.kind(), ErrorKind::RequiresHuman);

        let mut reloaded = manager(dir.path());
        assert!(reloaded.load_session(&id).await.unwrap());
        assert_eq!(reloaded.active().unwrap().auth_state, AuthState::Failed);
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        mgr.create_session("work").await.unwrap();

        let page = SnapshotPage::new(
            r#"<html><body>
                <input id="username"><input id="password">
                <button type="submit">Sign in</button>
                <div id="error-for-password">Wrong password. Try again.</div>
            </body></html>"#,
            "https://www.linkedin.com/login",
        );
        let err = mgr.authenticate(&page, &creds(), &fast_gate()).await.unwrap_err();
        assert!(matches!(err, SessionError::LoginRejected));
        assert_eq!(mgr.active().unwrap().auth_state, AuthState::Failed);
    }

    /// A page whose browser has gone away.
    struct DeadPage;

    #[async_trait]
    impl PageDriver for DeadPage {
        async fn navigate(&self, url: &str) -> Result<(), PageError> {
            Err(PageError::Navigation {
                url: url.to_string(),
                reason: "connection closed".to_string(),
            })
        }
        async fn current_url(&self) -> Result<String, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn content(&self) -> Result<String, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn visible_text(&self) -> Result<String, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn count(&self, _locator: &Locator) -> Result<usize, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn click(&self, _locator: &Locator) -> Result<bool, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn fill(&self, _locator: &Locator, _value: &str) -> Result<bool, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn submit(&self, _locator: &Locator) -> Result<bool, PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
        async fn scroll_to_bottom(&self) -> Result<(), PageError> {
            Err(PageError::Browser("gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_page_error_during_login_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let id = mgr.create_session("work").await.unwrap();

        let err = mgr.authenticate(&DeadPage, &creds(), &fast_gate()).await.unwrap_err();
        assert!(matches!(err, SessionError::Page(PageError::Navigation { .. })));
        assert_eq!(mgr.active().unwrap().auth_state, AuthState::Failed);

        let mut reloaded = manager(dir.path());
        assert!(reloaded.load_session(&id).await.unwrap());
        assert_eq!(reloaded.active().unwrap().auth_state, AuthState::Failed);
    }

    #[tokio::test]
    async fn test_login_form_without_password_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        mgr.create_session("work").await.unwrap();

        let page = SnapshotPage::new(
            r#"<html><body><input id="username"><button type="submit">Next</button></body></html>"#,
            "https://www.linkedin.com/login",
        );
        let err = mgr.authenticate(&page, &creds(), &fast_gate()).await.unwrap_err();
        assert!(matches!(err, SessionError::LoginFormMissing));
        assert_eq!(mgr.active().unwrap().auth_state, AuthState::Failed);
    }

    #[tokio::test]
    async fn test_search_challenges_update_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let id = mgr.create_session("work").await.unwrap();
        let mut session = mgr.active().cloned().unwrap();
        session.auth_state = AuthState::Authenticated;
        mgr.persist(&session).await.unwrap();
        assert!(mgr.load_session(&id).await.unwrap());

        let challenge = crate::scrapers::captcha::detect_text("Please verify you're human").unwrap();
        let state = mgr
            .record_challenges(std::slice::from_ref(&challenge), false)
            .await
            .unwrap();
        assert_eq!(state, AuthState::Authenticated);

        let state = mgr.record_challenges(&[challenge], true).await.unwrap();
        assert_eq!(state, AuthState::Failed);

        let mut reloaded = manager(dir.path());
        assert!(reloaded.load_session(&id).await.unwrap());
        assert_eq!(reloaded.active().unwrap().auth_state, AuthState::Failed);
    }

    #[tokio::test]
    async fn test_challenges_on_anonymous_session_are_not_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        mgr.create_session("anon").await.unwrap();
        let challenge = crate::scrapers::captcha::detect_text("captcha").unwrap();
        let state = mgr.record_challenges(&[challenge], true).await.unwrap();
        assert_eq!(state, AuthState::Unauthenticated);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("hunter2"));
    }
}

//! User agents for HTTP and browser requests.
//!
//! The target site serves reduced or blocked pages to non-browser agents,
//! so the default is a current desktop browser string.

/// Desktop browser user agents, rotated for the lightweight path.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// Pick one of [`BROWSER_USER_AGENTS`] based on the clock.
pub fn rotating_user_agent() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0);
    BROWSER_USER_AGENTS[nanos % BROWSER_USER_AGENTS.len()]
}

/// - None or "rotate": a rotating browser user agent
/// - anything else: used verbatim
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        None | Some("") | Some("rotate") => rotating_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_a_browser_agent() {
        assert!(resolve_user_agent(None).starts_with("Mozilla/5.0"));
        assert!(BROWSER_USER_AGENTS.contains(&resolve_user_agent(Some("rotate")).as_str()));
    }

    #[test]
    fn test_custom_agent() {
        assert_eq!(resolve_user_agent(Some("MyAgent/1.0")), "MyAgent/1.0");
    }
}

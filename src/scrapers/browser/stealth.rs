//! Fingerprint patches registered on every new document.

/// Each entry runs before page scripts. Entries must tolerate running twice.
pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver reads as a normal browser
    r#"
    Object.defineProperty(Navigator.prototype, 'webdriver', {
        get: () => false,
        configurable: true
    });
    "#,
    // window.chrome exists in real Chrome
    r#"
    if (!window.chrome) {
        Object.defineProperty(window, 'chrome', {
            value: { runtime: {}, app: { isInstalled: false } },
            configurable: true
        });
    }
    "#,
    // Headless builds report an empty language list
    r#"
    if (!navigator.languages || navigator.languages.length === 0) {
        Object.defineProperty(Navigator.prototype, 'languages', {
            get: () => ['en-US', 'en'],
            configurable: true
        });
    }
    "#,
    // Headless builds report no plugins
    r#"
    if (navigator.plugins && navigator.plugins.length === 0) {
        const pdf = { name: 'PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' };
        Object.defineProperty(Navigator.prototype, 'plugins', {
            get: () => [pdf],
            configurable: true
        });
    }
    "#,
    // Notification permission queries agree with Notification.permission
    r#"
    if (navigator.permissions && navigator.permissions.query) {
        const query = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = (desc) =>
            desc && desc.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission, onchange: null })
                : query(desc);
    }
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_non_empty() {
        assert!(!STEALTH_SCRIPTS.is_empty());
        for script in STEALTH_SCRIPTS {
            assert!(script.contains("defineProperty") || script.contains("permissions"));
        }
    }
}

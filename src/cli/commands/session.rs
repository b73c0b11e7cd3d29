//! Session management commands.

use console::style;

use super::helpers::{captcha_gate, session_manager};
use crate::config::{Config, Settings};
use crate::models::AuthState;
use crate::scrapers::{BrowserLauncher, Credentials, SelectorStrategy};

pub async fn cmd_session_create(
    settings: &Settings,
    config: &Config,
    label: &str,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let mut manager = session_manager(settings, config);
    let id = manager.create_session(label).await?;
    println!("{} Created session {} ({})", style("✓").green(), id, label);
    println!(
        "  {} Log it in with: jobscout session login {}",
        style("→").dim(),
        id
    );
    Ok(())
}

pub async fn cmd_session_list(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let manager = session_manager(settings, config);
    let sessions = manager.list_sessions().await?;
    if sessions.is_empty() {
        println!("{} No sessions stored", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<38} {:<16} {:<16} {}",
        "ID", "LABEL", "STATE", "LAST USED"
    );
    println!("{}", "-".repeat(90));
    for session in sessions {
        let state = if session.expired {
            style("expired".to_string()).dim()
        } else if session.auth_state == AuthState::Authenticated {
            style(session.auth_state.as_str().to_string()).green()
        } else {
            style(session.auth_state.as_str().to_string()).yellow()
        };
        println!(
            "{:<38} {:<16} {:<16} {}",
            session.id,
            session.label,
            state,
            session.last_used_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn cmd_session_login(
    settings: &Settings,
    config: &Config,
    id: &str,
    headless: bool,
) -> anyhow::Result<()> {
    let Some(credentials) = Credentials::from_env() else {
        anyhow::bail!("Set JOBSCOUT_USERNAME and JOBSCOUT_PASSWORD to log in");
    };

    let mut manager = session_manager(settings, config);
    if !manager.load_session(id).await? {
        anyhow::bail!("Session {} is unknown or expired", id);
    }

    let mut browser = config.browser.clone();
    browser.headless |= headless;
    if !browser.headless {
        println!(
            "{} A browser window will open; solve any challenge shown there",
            style("→").cyan()
        );
    }
    let page = BrowserLauncher::new(browser).open_page().await?;
    let gate = captcha_gate(config, &SelectorStrategy::default());

    let state = manager
        .authenticate(page.as_ref(), &credentials, &gate)
        .await?;
    match state {
        AuthState::Authenticated => {
            println!("{} Session {} is logged in", style("✓").green(), id)
        }
        other => println!(
            "{} Session {} ended as {}",
            style("✗").red(),
            id,
            other.as_str()
        ),
    }
    Ok(())
}

pub async fn cmd_session_expire(
    settings: &Settings,
    config: &Config,
    id: &str,
) -> anyhow::Result<()> {
    let mut manager = session_manager(settings, config);
    if manager.expire_by_id(id).await? {
        println!("{} Session {} expired", style("✓").green(), id);
    } else {
        println!("{} Session {} not found", style("!").yellow(), id);
    }
    Ok(())
}

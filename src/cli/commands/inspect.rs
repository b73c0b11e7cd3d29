//! Offline inspection of a saved page.

use std::path::Path;

use anyhow::Context;
use console::style;
use scraper::Html;

use super::helpers::captcha_gate;
use crate::config::Config;
use crate::scrapers::{InterfaceDetector, JobExtractor, SelectorStrategy};

pub fn cmd_inspect(config: &Config, file: &Path, url: Option<&str>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let html = Html::parse_document(&content);
    let selectors = SelectorStrategy::default();

    let generation = InterfaceDetector::default().detect_html(&html);
    println!("{} Interface generation: {}", style("→").cyan(), generation);

    let challenge = captcha_gate(config, &selectors).detect_document(&content, url.unwrap_or(""));
    match challenge {
        Some(info) => println!(
            "{} Challenge: {} via {} ({:?})",
            style("!").yellow(),
            info.challenge_type,
            info.source.as_str(),
            info.indicator
        ),
        None => println!("{} No challenge detected", style("✓").green()),
    }

    let extractor = JobExtractor::new(selectors, config.scrape.base());
    let cards = extractor.cards(&html, generation);
    println!("{} {} result cards", style("→").cyan(), cards.len());
    for card in cards {
        let extracted = extractor.extract(card, generation);
        match extracted.listing {
            Some(listing) => println!(
                "  {} {} [{}]",
                style("✓").green(),
                listing.display_name(),
                listing.listing_id.as_deref().unwrap_or("-")
            ),
            None => println!(
                "  {} discarded (missing: {})",
                style("✗").red(),
                extracted
                    .drifted
                    .iter()
                    .map(|f| f.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
    Ok(())
}

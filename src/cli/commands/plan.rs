//! Strategy preview.

use console::style;

use crate::models::SearchParameters;
use crate::scrapers::{plan, SearchStrategy};

pub fn cmd_plan(params: &SearchParameters) -> anyhow::Result<()> {
    let decision = plan(params);
    let marker = match decision.strategy {
        SearchStrategy::Lightweight => style("→").green(),
        SearchStrategy::FullAutomation => style("→").yellow(),
    };
    println!("{} {} ({})", marker, decision.strategy, decision.reason);
    println!("  {} query: {:?}", style("·").dim(), params.query());
    if let Some(ref location) = params.location {
        println!("  {} location: {}", style("·").dim(), location);
    }
    for kind in params.active_filters() {
        println!(
            "  {} {}: {}",
            style("·").dim(),
            kind,
            params.option_labels(kind).join(", ")
        );
    }
    Ok(())
}

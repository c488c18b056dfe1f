//! List markets command.

use anyhow::Result;
use tickfeed_core::types::MARKETS;

pub async fn run() -> Result<()> {
    println!("Available Markets");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for market in MARKETS {
        println!("  {} ({})", market.name, market.symbol);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", market.description);
        println!();
    }

    println!("Use --market <id> to select a market.");
    println!();
    let ids: Vec<&str> = MARKETS.iter().map(|m| m.id).collect();
    println!("Market ids: {}", ids.join(", "));

    Ok(())
}

//! `finanbot indicators`: Print the BCRP data a question would pull in.

use crate::bootstrap;
use finanbot_config::AppConfig;
use finanbot_economy::format_context;

pub async fn run(config: AppConfig, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(resolver) = bootstrap::build_economy(&config.statistics)? else {
        return Err("BCRP statistics are disabled ([statistics] enabled = false)".into());
    };

    match resolver.lookup(query).await {
        Some((intent, snapshots)) if !snapshots.is_empty() => {
            println!("Intent: {intent:?}\n");
            println!("{}", format_context(&snapshots));
        }
        Some((intent, _)) => {
            println!("Intent: {intent:?}");
            println!("⚠️  BCRP returned no data (see logs for details).");
        }
        None => {
            println!("No economic indicators match this question.");
            println!("Try: \"tipo de cambio\", \"tasa de interés\", \"inflación\", \"indicadores económicos\".");
        }
    }

    Ok(())
}

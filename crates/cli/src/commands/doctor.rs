//! `finanbot doctor`: Diagnose configuration and connectivity.

use crate::bootstrap;
use finanbot_config::AppConfig;
use finanbot_economy::{BcrpClient, series};
use finanbot_retrieval::load_documents;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 FinanBot Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults", path.display());
    }

    let config = match bootstrap::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured ({})", config.default_provider);
    } else {
        println!("  ❌ No API key — set OPENAI_API_KEY in the environment or .env");
        issues += 1;
    }

    // Documents
    let dir = &config.retrieval.documents_dir;
    if !config.retrieval.enabled {
        println!("  ➖ Retrieval disabled");
    } else if !dir.is_dir() {
        println!("  ⚠️  Documents folder missing: {} — run `finanbot onboard`", dir.display());
        issues += 1;
    } else {
        match load_documents(dir) {
            Ok(pages) if pages.is_empty() => {
                println!("  ⚠️  Documents folder is empty: {}", dir.display());
                issues += 1;
            }
            Ok(pages) => println!("  ✅ {} document page(s) in {}", pages.len(), dir.display()),
            Err(e) => {
                println!("  ❌ Cannot read documents: {e}");
                issues += 1;
            }
        }
        if config.retrieval.index_path.exists() {
            println!("  ✅ Index file: {}", config.retrieval.index_path.display());
        } else {
            println!("  ➖ No index yet — it is built on first start or with `finanbot ingest`");
        }
    }

    // Statistics service
    if config.statistics.enabled {
        let client = BcrpClient::from_config(&config.statistics)?;
        match client.get_series([series::EXCHANGE_RATE_AVERAGE].as_slice(), None, None).await {
            Ok(response) if response.latest().is_some() => {
                println!("  ✅ BCRP reachable ({})", client.base_url());
            }
            Ok(_) => println!("  ⚠️  BCRP reachable but returned no data"),
            Err(e) => {
                println!("  ❌ BCRP unreachable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ➖ BCRP statistics disabled");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

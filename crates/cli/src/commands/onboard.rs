//! `finanbot onboard`: First-time setup.

use finanbot_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    println!("🧠 FinanBot — Configuración inicial");
    println!("===================================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    let config = if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        AppConfig::load_from(&config_path)?
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        AppConfig::default()
    };

    let documents_dir = &config.retrieval.documents_dir;
    if !documents_dir.exists() {
        std::fs::create_dir_all(documents_dir)?;
        println!("✅ Created documents folder: {}", documents_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Set OPENAI_API_KEY in your environment or a .env file");
    println!("   2. Put product documents (.txt / .md) in {}", documents_dir.display());
    println!("   3. Run: finanbot ingest");
    println!("   4. Run: finanbot chat\n");

    Ok(())
}

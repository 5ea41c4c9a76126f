//! `finanbot ingest`: Build or rebuild the document index.

use finanbot_config::AppConfig;
use finanbot_core::provider::Provider;
use finanbot_retrieval::DocumentIndex;
use std::sync::Arc;

pub async fn run(config: AppConfig, rebuild: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config.retrieval.enabled {
        println!("⚠️  Retrieval is disabled ([retrieval] enabled = false). Nothing to do.");
        return Ok(());
    }

    let dir = &config.retrieval.documents_dir;
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        println!("📁 Created {}; add .txt or .md documents and run again.", dir.display());
        return Ok(());
    }

    // Without a key the index falls back to keyword search.
    let embedder: Option<Arc<dyn Provider>> = if config.has_api_key() {
        Some(finanbot_providers::build_from_config(&config)?)
    } else {
        println!("  No API key configured: building a keyword-only index.");
        None
    };

    let index = DocumentIndex::from_config(&config.retrieval, embedder);
    let chunks = if rebuild {
        index.reload().await?
    } else {
        index.open_or_build().await?
    };

    let stats = index.stats().await;
    println!("📚 Document index");
    println!("   Directory:  {}", stats.documents_dir.display());
    println!("   Index file: {}", index.settings().index_path.display());
    println!("   Chunks:     {chunks}");
    println!("   Embeddings: {}", if stats.embedded { "yes" } else { "no (keyword search)" });
    println!("   Sources:    {}", stats.sources.len());
    for source in &stats.sources {
        println!("     • {source}");
    }

    Ok(())
}

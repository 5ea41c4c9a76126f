//! `finanbot serve`: Start the HTTP API server.

use crate::bootstrap;
use finanbot_config::AppConfig;
use finanbot_gateway::GatewayState;
use std::sync::Arc;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let provider_name = config.default_provider.clone();
    let documents_dir = config.retrieval.documents_dir.display().to_string();

    let runtime = bootstrap::build(config).await?;

    println!("🧠 FinanBot Gateway");
    println!("   Listening: {host}:{port}");
    println!("   Model:     {}", runtime.model);
    println!(
        "   Retrieval: {}",
        if runtime.index.is_some() { "active" } else { "inactive" }
    );

    let state = GatewayState::new(runtime.service)
        .with_index(runtime.index)
        .with_economy(runtime.economy)
        .with_provider_name(provider_name)
        .with_documents_dir(documents_dir);

    finanbot_gateway::serve(Arc::new(state), &host, port).await?;

    Ok(())
}

//! Wires configuration into a running advisor: provider, document index,
//! economic resolver, orchestrator and session service.

use finanbot_agent::{AdvisorService, ContextAssembler, TurnOrchestrator};
use finanbot_config::{AppConfig, ConfigError, StatisticsConfig};
use finanbot_core::provider::Provider;
use finanbot_core::retrieval::DocumentRetriever;
use finanbot_economy::{BcrpClient, EconomicResolver, StatsError};
use finanbot_retrieval::{DocumentIndex, open_index};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a front-end needs.
pub struct Runtime {
    pub config: AppConfig,
    pub model: String,
    pub index: Option<Arc<DocumentIndex>>,
    pub economy: Option<Arc<EconomicResolver>>,
    pub service: AdvisorService,
}

/// Load from `path` when given, else from the default location. Environment
/// overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => AppConfig::load(),
    }
}

/// The resolver, or `None` when statistics are disabled.
pub fn build_economy(
    config: &StatisticsConfig,
) -> Result<Option<Arc<EconomicResolver>>, StatsError> {
    if !config.enabled {
        info!("BCRP statistics disabled");
        return Ok(None);
    }
    let client = BcrpClient::from_config(config)?;
    Ok(Some(Arc::new(EconomicResolver::new(
        Arc::new(client),
        Duration::from_secs(config.timeout_secs),
    ))))
}

/// Build the advisor. A missing API key is fatal; a broken document index
/// only disables retrieval.
pub async fn build(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    config.require_api_key()?;

    let provider = finanbot_providers::build_from_config(&config)?;
    let model = finanbot_providers::resolve_model(&config);
    info!(provider = %config.default_provider, model = %model, "Provider ready");

    let economy = build_economy(&config.statistics)?;

    let index = match open_index(&config.retrieval, Some(provider.clone())).await {
        Ok(index) => index,
        Err(e) => {
            warn!(error = %e, "Document index unavailable, continuing without retrieval");
            None
        }
    };

    Ok(assemble(config, provider, model, index, economy)?)
}

/// The composition step on its own, for callers that bring their own parts.
pub fn assemble(
    config: AppConfig,
    provider: Arc<dyn Provider>,
    model: String,
    index: Option<Arc<DocumentIndex>>,
    economy: Option<Arc<EconomicResolver>>,
) -> Result<Runtime, finanbot_security::FilterError> {
    let retriever = index
        .clone()
        .map(|index| index as Arc<dyn DocumentRetriever>);
    let assembler = ContextAssembler::new(retriever, economy.clone());
    let orchestrator = TurnOrchestrator::from_config(&config, provider, model.clone(), assembler)?;
    let service = AdvisorService::new(Arc::new(orchestrator))
        .with_idle_ttl(Duration::from_secs(config.gateway.session_idle_secs));

    Ok(Runtime {
        config,
        model,
        index,
        economy,
        service,
    })
}

//! Economic context resolver.
//!
//! Classifies a user query into an economic intent and, when one is found,
//! fetches the matching BCRP indicators and formats them as a context block.
//! Failures never reach the caller: they are logged and the block is empty.

use crate::client::StatisticsSource;
use crate::error::StatsError;
use crate::snapshot::{self, EconomicSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const HEADER: &str = "--- DATOS ECONÓMICOS ACTUALIZADOS (BCRP) ---\n";
const FOOTER: &str = "\nFuente: Banco Central de Reserva del Perú (BCRP)";

/// Kind of economic data a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicIntent {
    ExchangeRate,
    InterestRates,
    Inflation,
    General,
}

impl EconomicIntent {
    /// Detection order; the first intent with a matching keyword wins.
    const ORDERED: [(EconomicIntent, &'static [&'static str]); 4] = [
        (
            EconomicIntent::ExchangeRate,
            &["tipo de cambio", "dolar", "dólar", "tc", "cambio dolar"],
        ),
        (
            EconomicIntent::InterestRates,
            &["tasa de interes", "tasa de interés", "tamn", "tamex", "tasa referencia"],
        ),
        (EconomicIntent::Inflation, &["inflacion", "inflación", "ipc"]),
        (
            EconomicIntent::General,
            &["datos económicos", "indicadores económicos", "estadísticas bcrp"],
        ),
    ];

    /// Case-insensitive substring classification.
    pub fn detect(query: &str) -> Option<Self> {
        let lowered = query.to_lowercase();
        Self::ORDERED
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(intent, _)| *intent)
    }
}

/// Resolves a query into an economic context block. No cross-turn caching.
pub struct EconomicResolver {
    source: Arc<dyn StatisticsSource>,
    timeout: Duration,
}

impl EconomicResolver {
    pub fn new(source: Arc<dyn StatisticsSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// The formatted context for `query`, or an empty string when the query
    /// has no economic intent or no indicator could be fetched.
    pub async fn resolve(&self, query: &str) -> String {
        match self.lookup(query).await {
            Some((_, snapshots)) => format_context(&snapshots),
            None => String::new(),
        }
    }

    /// The detected intent and whatever snapshots arrived within the timeout.
    /// `None` when the query has no economic intent or the lookup timed out.
    pub async fn lookup(&self, query: &str) -> Option<(EconomicIntent, Vec<EconomicSnapshot>)> {
        let intent = EconomicIntent::detect(query)?;
        debug!(?intent, "Economic intent detected");

        match tokio::time::timeout(self.timeout, self.snapshots(intent)).await {
            Ok(snapshots) => Some((intent, snapshots)),
            Err(_) => {
                warn!(
                    ?intent,
                    timeout_secs = self.timeout.as_secs(),
                    "Economic data lookup timed out"
                );
                None
            }
        }
    }

    /// Fetch the snapshots for `intent`, skipping any that fail.
    pub async fn snapshots(&self, intent: EconomicIntent) -> Vec<EconomicSnapshot> {
        let source = self.source.as_ref();
        let mut out = Vec::new();

        match intent {
            EconomicIntent::ExchangeRate => {
                push_ok(&mut out, intent, snapshot::exchange_rate(source).await.map(|s| s.map(EconomicSnapshot::ExchangeRate)));
            }
            EconomicIntent::InterestRates => {
                push_ok(&mut out, intent, snapshot::interest_rates(source).await.map(|s| s.map(EconomicSnapshot::InterestRates)));
            }
            EconomicIntent::Inflation => {
                push_ok(&mut out, intent, snapshot::inflation(source).await.map(|s| s.map(EconomicSnapshot::Indicator)));
            }
            EconomicIntent::General => {
                push_ok(&mut out, intent, snapshot::exchange_rate(source).await.map(|s| s.map(EconomicSnapshot::ExchangeRate)));
                push_ok(&mut out, intent, snapshot::interest_rates(source).await.map(|s| s.map(EconomicSnapshot::InterestRates)));
            }
        }

        out
    }
}

fn push_ok(
    out: &mut Vec<EconomicSnapshot>,
    intent: EconomicIntent,
    result: Result<Option<EconomicSnapshot>, StatsError>,
) {
    match result {
        Ok(Some(snapshot)) => out.push(snapshot),
        Ok(None) => debug!(?intent, "BCRP returned no periods"),
        Err(e) => warn!(?intent, error = %e, "Economic data unavailable"),
    }
}

/// Header, one block per snapshot (blank line between blocks), source footer.
pub fn format_context(snapshots: &[EconomicSnapshot]) -> String {
    if snapshots.is_empty() {
        return String::new();
    }

    let mut parts = vec![HEADER.to_string()];
    for (i, snapshot) in snapshots.iter().enumerate() {
        if i == 0 {
            parts.push(snapshot.format());
        } else {
            parts.push(format!("\n{}", snapshot.format()));
        }
    }
    parts.push(FOOTER.to_string());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SeriesRequest, SeriesResponse};
    use crate::series;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const EXCHANGE_BODY: &str = r#"{"periods":[{"name":"15.Oct.24","values":["3.752","3.750","3.755"]}]}"#;
    const RATES_BODY: &str = r#"{"periods":[{"name":"Set.2024","values":["5.25","4.1","2.3"]}]}"#;

    /// Records every request and answers by the first requested code.
    #[derive(Default)]
    struct RecordingSource {
        requests: Mutex<Vec<Vec<String>>>,
        fail_rates: bool,
    }

    impl RecordingSource {
        fn requests(&self) -> Vec<Vec<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatisticsSource for RecordingSource {
        async fn fetch(&self, request: &SeriesRequest) -> Result<SeriesResponse, StatsError> {
            self.requests.lock().unwrap().push(request.codes().to_vec());
            let body = match request.codes()[0].as_str() {
                series::EXCHANGE_RATE_AVERAGE => EXCHANGE_BODY,
                series::REFERENCE_RATE if self.fail_rates => {
                    return Err(StatsError::Http { status: 503 });
                }
                series::REFERENCE_RATE => RATES_BODY,
                series::ANNUAL_INFLATION => {
                    r#"{"config":{"series":[{"name":"Inflación anual"}]},"periods":[{"name":"Set.2024","values":["1.78"]}]}"#
                }
                _ => "{}",
            };
            Ok(serde_json::from_str(body).unwrap())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl StatisticsSource for FailingSource {
        async fn fetch(&self, _request: &SeriesRequest) -> Result<SeriesResponse, StatsError> {
            Err(StatsError::Network("connection refused".into()))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl StatisticsSource for SlowSource {
        async fn fetch(&self, _request: &SeriesRequest) -> Result<SeriesResponse, StatsError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SeriesResponse::default())
        }
    }

    fn resolver(source: Arc<dyn StatisticsSource>) -> EconomicResolver {
        EconomicResolver::new(source, Duration::from_secs(10))
    }

    #[test]
    fn detect_intents_in_order() {
        assert_eq!(
            EconomicIntent::detect("cual es el tipo de cambio hoy"),
            Some(EconomicIntent::ExchangeRate)
        );
        assert_eq!(
            EconomicIntent::detect("¿Cuál es la TAMN vigente?"),
            Some(EconomicIntent::InterestRates)
        );
        assert_eq!(
            EconomicIntent::detect("¿Cómo va la INFLACIÓN?"),
            Some(EconomicIntent::Inflation)
        );
        assert_eq!(
            EconomicIntent::detect("Muéstrame indicadores económicos"),
            Some(EconomicIntent::General)
        );
        // Exchange rate is checked before interest rates.
        assert_eq!(
            EconomicIntent::detect("tasa de interés en dólares"),
            Some(EconomicIntent::ExchangeRate)
        );
        assert_eq!(EconomicIntent::detect("quiero abrir una cuenta de ahorros"), None);
    }

    #[tokio::test]
    async fn exchange_rate_query_makes_one_batched_request() {
        let source = Arc::new(RecordingSource::default());
        let context = resolver(source.clone()).resolve("cual es el tipo de cambio hoy").await;

        assert_eq!(
            source.requests(),
            vec![vec!["PD04637PD".to_string(), "PD04638PD".into(), "PD04639PD".into()]]
        );
        assert_eq!(
            context,
            "--- DATOS ECONÓMICOS ACTUALIZADOS (BCRP) ---\n\n\
             💱 Tipo de Cambio (15.Oct.24)\n   Promedio: S/ 3.752\n   Compra: S/ 3.75\n   Venta: S/ 3.755\n\
             \nFuente: Banco Central de Reserva del Perú (BCRP)"
        );
    }

    #[tokio::test]
    async fn no_intent_means_no_request() {
        let source = Arc::new(RecordingSource::default());
        let context = resolver(source.clone()).resolve("¿Qué es un plazo fijo?").await;
        assert!(context.is_empty());
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn inflation_query_formats_single_series() {
        let source = Arc::new(RecordingSource::default());
        let context = resolver(source.clone()).resolve("dime la inflación").await;
        assert_eq!(source.requests(), vec![vec!["PN01272PM".to_string()]]);
        assert!(context.contains("📊 Inflación anual\n   Periodo: Set.2024\n   Valor: 1.78\n   Inflación anual (%)"));
    }

    #[tokio::test]
    async fn general_query_combines_both_bundles() {
        let source = Arc::new(RecordingSource::default());
        let context = resolver(source.clone()).resolve("estadísticas BCRP por favor").await;
        assert_eq!(source.requests().len(), 2);
        let fx = context.find("💱 Tipo de Cambio").unwrap();
        let rates = context.find("📈 Tasas de Interés").unwrap();
        assert!(fx < rates);
        assert!(context.contains("Venta: S/ 3.755\n\n📈"));
        assert!(context.ends_with("Fuente: Banco Central de Reserva del Perú (BCRP)"));
    }

    #[tokio::test]
    async fn general_query_keeps_partial_results() {
        let source = Arc::new(RecordingSource {
            fail_rates: true,
            ..Default::default()
        });
        let context = resolver(source).resolve("indicadores económicos").await;
        assert!(context.contains("💱 Tipo de Cambio"));
        assert!(!context.contains("📈"));
    }

    #[tokio::test]
    async fn lookup_reports_intent_and_snapshots() {
        let source = Arc::new(RecordingSource::default());
        let (intent, snapshots) = resolver(source).lookup("¿Cuál es la TAMN?").await.unwrap();
        assert_eq!(intent, EconomicIntent::InterestRates);
        assert_eq!(snapshots.len(), 1);
        assert!(matches!(snapshots[0], EconomicSnapshot::InterestRates(_)));
    }

    #[tokio::test]
    async fn failures_yield_empty_context() {
        let context = resolver(Arc::new(FailingSource)).resolve("precio del dólar").await;
        assert!(context.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_is_cut_off() {
        let context = resolver(Arc::new(SlowSource)).resolve("tipo de cambio").await;
        assert!(context.is_empty());
    }
}

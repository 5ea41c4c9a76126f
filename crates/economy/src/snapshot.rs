//! Latest-period indicator snapshots and their prompt formatting.

use crate::client::{SeriesRequest, SeriesResponse, StatisticsSource};
use crate::error::StatsError;
use crate::series;
use serde::Serialize;

/// Shown in place of a value the service did not publish.
const MISSING: &str = "n.d.";

fn show(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

/// Latest value of a single series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub series_code: String,
    /// Name reported by the service, or the code when absent.
    pub series_name: String,
    pub period_label: String,
    pub value: Option<f64>,
    pub description: Option<String>,
}

/// Average, buy and sell exchange rate for the latest period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateSnapshot {
    pub period_label: String,
    pub average: Option<f64>,
    pub buy: Option<f64>,
    pub sell: Option<f64>,
}

/// Reference rate plus TAMN/TAMEX deposit rates for the latest period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestRateSnapshot {
    pub period_label: String,
    pub reference: Option<f64>,
    pub tamn: Option<f64>,
    pub tamex: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EconomicSnapshot {
    Indicator(IndicatorSnapshot),
    ExchangeRate(ExchangeRateSnapshot),
    InterestRates(InterestRateSnapshot),
}

impl EconomicSnapshot {
    /// Multi-line block for the prompt context.
    pub fn format(&self) -> String {
        let lines = match self {
            Self::Indicator(s) => {
                let mut lines = vec![
                    format!("📊 {}", s.series_name),
                    format!("   Periodo: {}", s.period_label),
                    format!("   Valor: {}", show(s.value)),
                ];
                if let Some(description) = s.description.as_deref().filter(|d| !d.is_empty()) {
                    lines.push(format!("   {description}"));
                }
                lines
            }
            Self::ExchangeRate(s) => vec![
                format!("💱 Tipo de Cambio ({})", s.period_label),
                format!("   Promedio: S/ {}", show(s.average)),
                format!("   Compra: S/ {}", show(s.buy)),
                format!("   Venta: S/ {}", show(s.sell)),
            ],
            Self::InterestRates(s) => vec![
                format!("📈 Tasas de Interés ({})", s.period_label),
                format!("   Tasa de Referencia BCRP: {}%", show(s.reference)),
                format!("   TAMN Depósitos: {}%", show(s.tamn)),
                format!("   TAMEX Depósitos: {}%", show(s.tamex)),
            ],
        };
        lines.join("\n")
    }
}

async fn fetch_latest(
    source: &dyn StatisticsSource,
    codes: &[&str],
) -> Result<SeriesResponse, StatsError> {
    let request = SeriesRequest::new(codes)?;
    source.fetch(&request).await
}

/// Latest value of `code`, or `None` when the service has no periods for it.
pub async fn latest_value(
    source: &dyn StatisticsSource,
    code: &str,
) -> Result<Option<IndicatorSnapshot>, StatsError> {
    let response = fetch_latest(source, &[code]).await?;
    Ok(response.latest().map(|period| IndicatorSnapshot {
        series_code: code.to_string(),
        series_name: response.series_name(0).unwrap_or(code).to_string(),
        period_label: period.name.clone(),
        value: period.value(0),
        description: series::describe(code).map(String::from),
    }))
}

/// One batched request for the three exchange-rate series.
pub async fn exchange_rate(
    source: &dyn StatisticsSource,
) -> Result<Option<ExchangeRateSnapshot>, StatsError> {
    let response = fetch_latest(source, &series::EXCHANGE_RATE_SERIES).await?;
    Ok(response.latest().map(|period| ExchangeRateSnapshot {
        period_label: period.name.clone(),
        average: period.value(0),
        buy: period.value(1),
        sell: period.value(2),
    }))
}

/// One batched request for the three headline interest-rate series.
pub async fn interest_rates(
    source: &dyn StatisticsSource,
) -> Result<Option<InterestRateSnapshot>, StatsError> {
    let response = fetch_latest(source, &series::INTEREST_RATE_SERIES).await?;
    Ok(response.latest().map(|period| InterestRateSnapshot {
        period_label: period.name.clone(),
        reference: period.value(0),
        tamn: period.value(1),
        tamex: period.value(2),
    }))
}

/// Latest annual inflation.
pub async fn inflation(
    source: &dyn StatisticsSource,
) -> Result<Option<IndicatorSnapshot>, StatsError> {
    latest_value(source, series::ANNUAL_INFLATION).await
}

//! BCRP statistical series client.
//!
//! URL layout: `{base}/{codes joined by '-'}/{format}[/{start}[/{end}]][/{lang}]`,
//! where the language segment is only appended for non-Spanish output. A
//! request without an explicit language gets the client's configured one.

use crate::error::StatsError;
use async_trait::async_trait;
use finanbot_config::StatisticsConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// The service rejects larger batches.
pub const MAX_SERIES_PER_REQUEST: usize = 10;

const DEFAULT_LANGUAGE: &str = "esp";

/// A validated batch request for one or more series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    codes: Vec<String>,
    format: String,
    start_period: Option<String>,
    end_period: Option<String>,
    language: Option<String>,
}

impl SeriesRequest {
    /// Build a request for `codes`. More than ten codes is a caller error.
    pub fn new<S: AsRef<str>>(codes: &[S]) -> Result<Self, StatsError> {
        if codes.is_empty() {
            return Err(StatsError::NoSeries);
        }
        if codes.len() > MAX_SERIES_PER_REQUEST {
            return Err(StatsError::TooManySeries {
                count: codes.len(),
                max: MAX_SERIES_PER_REQUEST,
            });
        }
        Ok(Self {
            codes: codes.iter().map(|c| c.as_ref().to_string()).collect(),
            format: "json".into(),
            start_period: None,
            end_period: None,
            language: None,
        })
    }

    /// Restrict to a period range (`YYYY-M` for monthly, `YYYY-Q` for quarterly).
    /// An end period without a start is ignored.
    pub fn with_period(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_period = start;
        self.end_period = end;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn url(&self, base_url: &str) -> String {
        let mut parts = vec![
            base_url.trim_end_matches('/').to_string(),
            self.codes.join("-"),
            self.format.clone(),
        ];

        if let Some(start) = &self.start_period {
            parts.push(start.clone());
            if let Some(end) = &self.end_period {
                parts.push(end.clone());
            }
        }

        if let Some(language) = self.language.as_deref().filter(|l| *l != DEFAULT_LANGUAGE) {
            parts.push(language.to_string());
        }

        parts.join("/")
    }
}

// --- Response types ---

/// The JSON body returned by the series API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub config: Option<ResponseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    pub name: String,
    /// Positionally aligned with the requested codes. The service sends
    /// numbers as strings and uses markers like `"n.d."` for gaps.
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

impl Period {
    /// Numeric value at `index`, if present and parseable.
    pub fn value(&self, index: usize) -> Option<f64> {
        match self.values.get(index)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseConfig {
    #[serde(default)]
    pub series: Vec<SeriesInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesInfo {
    #[serde(default)]
    pub name: Option<String>,
}

impl SeriesResponse {
    /// The most recent period (the service orders periods ascending).
    pub fn latest(&self) -> Option<&Period> {
        self.periods.last()
    }

    /// Display name of the series at `index`, as reported by the service.
    pub fn series_name(&self, index: usize) -> Option<&str> {
        self.config
            .as_ref()?
            .series
            .get(index)?
            .name
            .as_deref()
    }
}

/// Anything that can answer a series request.
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    async fn fetch(&self, request: &SeriesRequest) -> Result<SeriesResponse, StatsError>;
}

/// HTTP client for the BCRP API.
pub struct BcrpClient {
    base_url: String,
    language: String,
    format: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl BcrpClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, StatsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StatsError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: DEFAULT_LANGUAGE.into(),
            format: "json".into(),
            timeout_secs,
            client,
        })
    }

    pub fn from_config(config: &StatisticsConfig) -> Result<Self, StatsError> {
        let mut client = Self::new(config.base_url.clone(), config.timeout_secs)?;
        client.language = config.language.clone();
        client.format = config.format.clone();
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Full URL for `request`, filling in the configured language.
    pub fn request_url(&self, request: &SeriesRequest) -> String {
        match request.language() {
            Some(_) => request.url(&self.base_url),
            None => request
                .clone()
                .with_language(self.language.clone())
                .url(&self.base_url),
        }
    }

    /// Fetch `codes`, optionally over a period range, using configured defaults.
    pub async fn get_series<S: AsRef<str>>(
        &self,
        codes: &[S],
        start_period: Option<String>,
        end_period: Option<String>,
    ) -> Result<SeriesResponse, StatsError> {
        let request = SeriesRequest::new(codes)?
            .with_period(start_period, end_period)
            .with_language(self.language.clone())
            .with_format(self.format.clone());
        self.fetch(&request).await
    }
}

#[async_trait]
impl StatisticsSource for BcrpClient {
    async fn fetch(&self, request: &SeriesRequest) -> Result<SeriesResponse, StatsError> {
        let url = self.request_url(request);
        debug!(url = %url, "Requesting BCRP series");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                StatsError::Timeout(self.timeout_secs)
            } else {
                StatsError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "BCRP returned an error status");
            return Err(StatsError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<SeriesResponse>()
            .await
            .map_err(|e| StatsError::Decode(e.to_string()))
    }
}

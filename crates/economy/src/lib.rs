//! Economic context for FinanBot, sourced from the BCRP statistical series API.
//!
//! - [`series`]: series codes and their human-readable descriptions
//! - [`client`]: the batched HTTP client behind the [`StatisticsSource`] trait
//! - [`snapshot`]: latest-period indicator snapshots and their prompt formatting
//! - [`resolver`]: intent detection and the per-turn economic context block

pub mod client;
pub mod error;
pub mod resolver;
pub mod series;
pub mod snapshot;

pub use client::{BcrpClient, MAX_SERIES_PER_REQUEST, SeriesRequest, SeriesResponse, StatisticsSource};
pub use error::StatsError;
pub use resolver::{EconomicIntent, EconomicResolver, format_context};
pub use snapshot::{EconomicSnapshot, ExchangeRateSnapshot, IndicatorSnapshot, InterestRateSnapshot};

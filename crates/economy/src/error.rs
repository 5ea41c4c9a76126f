use thiserror::Error;

/// Failures talking to the statistics service.
#[derive(Debug, Clone, Error)]
pub enum StatsError {
    #[error("At most {max} series per request, got {count}")]
    TooManySeries { count: usize, max: usize },

    #[error("At least one series code is required")]
    NoSeries,

    #[error("Statistics service returned HTTP {status}")]
    Http { status: u16 },

    #[error("Statistics request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode statistics response: {0}")]
    Decode(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

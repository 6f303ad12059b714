//! Error types for the danger map pipeline.

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// The spatial index had no candidate for a point. Only reachable
    /// with an empty grid, which configuration validation forbids.
    #[error("No cell found for point ({lat}, {lon})")]
    NoCell { lat: f64, lon: f64 },

    #[error("Render error: {0}")]
    Render(String),
}

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("non-finite value {value} at {name}[{index}] has no C literal form")]
    NonFinite {
        name: String,
        index: usize,
        value: f64,
    },

    #[error("unbalanced buffers: {0}")]
    Unbalanced(String),

    #[error("oracle self-check failed: {0}")]
    SelfCheck(String),

    #[cfg(feature = "serde")]
    #[error("snapshot: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StandError {
    #[error("hardware error: {0}")]
    Hardware(String),
    /// Load cell or output stage unusable; the stand cannot run.
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    /// Data storage unavailable at startup.
    #[error("storage fault: {0}")]
    StorageFault(String),
    #[error("storage write failed: {0}")]
    StorageWrite(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

impl StandError {
    /// Faults that stop the stand before or during a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HardwareFault(_) | Self::StorageFault(_) | Self::Config(_)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing transducer")]
    MissingTransducer,
    #[error("missing igniter")]
    MissingIgniter,
    #[error("missing storage")]
    MissingStorage,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

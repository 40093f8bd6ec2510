use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("peak users must be greater than 0")]
    PeakUsersZero,
    #[error("{0} must be greater than 0")]
    NonPositiveDuration(&'static str),
    #[error("at least one action is required")]
    EmptyActions,
    #[error("action name must not be empty")]
    EmptyActionName,
    #[error("duplicate action name '{0}'")]
    DuplicateActionName(String),
    #[error("weight for '{name}' must be in (0, 1] (got {weight})")]
    InvalidWeight { name: String, weight: f64 },
    #[error("action weights must sum to 1 (got {0})")]
    WeightSum(f64),
    #[error("latency range for '{0}' is empty: min must not exceed max")]
    InvalidLatencyRange(String),
    #[error("failure rate for '{name}' must be in [0, 1] (got {rate})")]
    InvalidFailureRate { name: String, rate: f64 },
    #[error("invalid action entry '{0}': expected name:weight:min_ms[-max_ms][:failure_rate]")]
    InvalidActionEntry(String),
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
    #[error("report sink failed: {0}")]
    Sink(String),
    #[error("failed to spawn {0} thread: {1}")]
    Spawn(&'static str, std::io::Error),
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl Error {
    /// True for errors raised while validating configuration, before any
    /// worker is launched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::PeakUsersZero
                | Error::NonPositiveDuration(_)
                | Error::EmptyActions
                | Error::EmptyActionName
                | Error::DuplicateActionName(_)
                | Error::InvalidWeight { .. }
                | Error::WeightSum(_)
                | Error::InvalidLatencyRange(_)
                | Error::InvalidFailureRate { .. }
                | Error::InvalidActionEntry(_)
                | Error::InvalidDuration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Cannot amplify from empty {0} severity pool")]
    EmptyPool(&'static str),

    #[error("Insufficient sample for {group}: need at least {required} rows, found {found}")]
    InsufficientSample {
        group: String,
        required: usize,
        found: usize,
    },

    #[error("Unknown treatment: {0}")]
    UnknownTreatment(String),

    #[error("Distribution error: {0}")]
    Distribution(String),
}

pub type SimResult<T> = Result<T, SimError>;

pub fn distribution_error<E: std::fmt::Display>(err: E) -> SimError {
    SimError::Distribution(err.to_string())
}

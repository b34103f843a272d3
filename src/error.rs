use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Command(String),

    /// Counters are owned by the event log while field input is active.
    #[error("{0} can only be edited in form input mode")]
    ManualEntryLocked(&'static str),

    #[error("field events can only be recorded in field input mode")]
    FieldInputLocked,
}

pub type ScoutResult<T> = Result<T, ScoutError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Evaluator error: {0}")]
    Evaluator(String),

    #[error("Action error: {0}")]
    Action(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scenario '{id}' already exists")]
    DuplicateKey { id: String },

    #[error("Scenario '{id}' not found")]
    NotFound { id: String },

    #[error("Invalid stored timestamp {micros} for scenario '{id}'")]
    Timestamp { id: String, micros: i64 },

    #[error("Store connection lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

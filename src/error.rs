use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Malformed account code '{code}': segment '{segment}' is not numeric")]
    MalformedAccountCode { code: String, segment: String },

    #[error("Column {column} out of range: table has {count} columns")]
    ColumnOutOfRange { column: usize, count: usize },

    #[error("Row {row} out of range: table has {count} rows")]
    RowOutOfRange { row: usize, count: usize },

    #[error("Unknown account code: {0}")]
    UnknownAccount(String),

    #[error("Invalid year range {start}..={end}: start year is after end year")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid precision {0}: must be at most 15 decimals")]
    InvalidPrecision(usize),

    #[error("Validation error for '{subject}': {details}")]
    ValidationError { subject: String, details: String },

    #[error("Statement store error: {0}")]
    Store(String),

    #[error("Import stopped: {0}")]
    ImportFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

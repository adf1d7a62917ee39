use std::path::PathBuf;
use thiserror::Error;

/// Low-level failure while streaming CSV bytes.
#[derive(Debug, Error)]
pub enum CsvIngestError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
}

pub type CsvResult<T> = std::result::Result<T, CsvIngestError>;

/// The upload was refused before anything was staged.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select a Group Program.")]
    MissingCategory,

    #[error("Please upload a CSV file.")]
    InvalidFileType { name: String },

    #[error("Failed to upload file: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read uploaded file: {0}")]
    Read(#[from] CsvIngestError),
}

/// The uploaded file was stored but its contents cannot be imported.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(
        "No valid data found in CSV file. Please ensure the file has a header row and at \
         least one data row, and that all rows have the same number of columns."
    )]
    Empty,

    #[error(
        "Missing required columns: {}. Found columns: {}",
        .missing.join(", "),
        .found.join(", ")
    )]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },
}

/// Every user-visible failure of the import workflow.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("CSV data not found. Please upload the file again.")]
    StagingExpired,

    #[error("Invalid import count '{0}': expected 1, 5 or all.")]
    InvalidLimit(String),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;

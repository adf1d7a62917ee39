//! Grant award CSV import.
//!
//! An upload of grant rows (one project director per row) is parsed,
//! validated, and staged in an [`ImportSession`]. Executing the staged batch
//! creates one grant record per grant number and one user per director email,
//! skipping records that already exist, and folds every row into an
//! [`ImportSummary`].
//!
//! - Parsing: [`parse_csv_stream`], [`parse_csv_path`], [`check_required_columns`]
//! - Normalization: [`convert_date`], [`parse_phone`], [`split_name`], [`map_role`]
//! - Import: [`ImportEngine`] over [`GrantRepository`] + [`UserRepository`]
//! - Steps: [`Workflow`] (upload, preview, execute, clear)

mod codec;
pub mod config;
pub mod credential;
mod engine;
mod error;
mod io;
pub mod logging;
mod model;
mod normalize;
mod parser;
pub mod repository;
mod role;
mod staging;
mod summary;
mod workflow;

pub use crate::config::{ConfigError, ImporterConfig, LogConfig};
pub use crate::engine::ImportEngine;
pub use crate::error::{
    CsvIngestError, CsvResult, ImportError, ImportResult, UploadError, ValidationError,
};
pub use crate::io::{build_csv_reader, charset_for_label, has_csv_extension, CsvMeta};
pub use crate::model::{GrantRow, ImportBatch, ImportLimit, RawRow, REQUIRED_COLUMNS};
pub use crate::normalize::{convert_date, parse_phone, split_name, PersonName, PhoneNumber};
pub use crate::parser::{check_required_columns, parse_csv_path, parse_csv_stream, CsvTable};
pub use crate::repository::{
    GrantRecord, GrantRepository, InMemoryRepository, JsonFileRepository, RepoError, RepoResult,
    UserRecord, UserRepository,
};
pub use crate::role::{map_role, DEFAULT_ROLE};
pub use crate::staging::ImportSession;
pub use crate::summary::{ImportSummary, Outcome, RecordKind, RowError, RowOutcome};
pub use crate::workflow::{Preview, UploadReceipt, UploadedFile, Workflow, PREVIEW_ROWS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("vision analysis failed: {0}")]
    Vision(#[from] VisionError),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision service timed out after {0} seconds")]
    Timeout(u64),

    #[error("vision service unreachable at {endpoint}: {details}")]
    Connection { endpoint: String, details: String },

    #[error("vision service at {endpoint} returned {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed vision response: {0}")]
    MalformedResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {content_hash}")]
    NotFound { content_hash: String },

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("indexing already in progress")]
    AlreadyRunning,

    #[error("{0}")]
    Validation(String),

    #[error("no async runtime available to run the indexing job")]
    NoRuntime,

    #[error("file not found on disk: {0}")]
    FileMissing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

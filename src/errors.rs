use thiserror::Error;

/// Failures talking to the database or preparing a connection.
#[derive(Error, Debug)]
pub enum DbError {
    /// The driver rejected a statement or a catalog lookup failed.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Missing or invalid settings (URL, backend name, AI command).
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("{0} is not supported by this database")]
    Unsupported(&'static str),
    #[error("Error: {0}")]
    General(String),
}

/// Errors raised while turning collaborator output into SQL.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no JSON found in AI response")]
    NoJson,
    #[error("failed to parse query plan JSON: {source}\nRaw: {raw}")]
    MalformedJson {
        source: serde_json::Error,
        raw: String,
    },
    #[error("{0} plan has no tables")]
    MissingTables(&'static str),
    #[error("update plan has no SET values")]
    EmptyUpdateSet,
    #[error("insert plan has no columns or values")]
    EmptyInsert,
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    #[error("the request needs tables outside the current table and its related tables")]
    NeedOtherTables,
    #[error("no previous query plan to paginate")]
    NoActivePlan,
    #[error("page {page} with limit {limit} is out of range")]
    PageOutOfRange { page: i64, limit: i64 },
}

/// Errors raised by a text generator backend.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("AI provider not configured: {0}")]
    NotConfigured(String),
    #[error("AI provider I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("AI command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("AI provider returned an empty response")]
    EmptyResponse,
}

/// Errors surfaced to the operator by the interactive session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("AI error: {0}")]
    Provider(#[from] ProviderError),
    /// The database rejected compiled SQL. The statement is kept for display.
    #[error("query failed: {source}\nSQL:\n{sql}")]
    Execution { sql: String, source: DbError },
    #[error("no database connection available")]
    NoConnection,
    #[error("no table selected, use \\t <table> first")]
    NoTableSelected,
    #[error("table {0} does not exist")]
    UnknownTable(String),
    #[error("no statement is waiting for confirmation")]
    NothingPending,
    #[error("no query has run yet, nothing to explain")]
    NothingToExplain,
    #[error("no result to export yet")]
    NoResult,
    #[error("request cancelled")]
    Cancelled,
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("CSV export failed: {0}")]
    Export(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

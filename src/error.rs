use std::io;

use thiserror::Error;

/// Main error type for the gosscan application.
///
/// The variants follow the scan's failure taxonomy: connection failures,
/// authorization failures and query failures are all fatal. Everything else
/// is local (configuration, I/O, report rendering).
#[derive(Debug, Error)]
pub enum Error {
   /// I/O error occurred while writing reports or configuration.
   #[error("io error: {0}")]
   Io(#[from] io::Error),

   /// JSON serialization error occurred.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// Configuration or argument validation failed.
   #[error("config error: {0}")]
   Config(#[from] ConfigError),

   /// The SAP system could not be reached.
   #[error("connection failed: {0}")]
   Connection(#[source] RfcError),

   /// Logon was rejected or the user lacks an authorization.
   #[error("authorization failed: {0}")]
   Authorization(#[source] RfcError),

   /// A read-only table or metadata query failed.
   #[error("query on {table} failed: {source}")]
   Query {
      table:  String,
      #[source]
      source: RfcError,
   },

   /// A query asked for a column that holds binary document content.
   #[error("refusing to read binary column {table}-{field}")]
   ForbiddenField { table: String, field: String },

   /// Requested fields do not fit into one `RFC_READ_TABLE` output line.
   #[error("fields {fields:?} of {table} total {width} bytes, exceeds {limit} byte limit")]
   WidthExceeded {
      table:  String,
      fields: Vec<String>,
      width:  usize,
      limit:  usize,
   },

   /// A WHERE clause could not be split into option lines.
   #[error("where clause token exceeds {limit} characters: {token}")]
   OptionTooLong { token: String, limit: usize },

   /// A function module outside the read-only allow list was requested.
   #[error("function module {0} is not on the read-only allow list")]
   ReadOnlyViolation(String),

   /// The scan did not finish inside its time budget.
   #[error("scan timeout: exceeded budget of {budget_secs}s")]
   Timeout { budget_secs: u64 },

   /// The report could not be rendered.
   #[error("report error: {0}")]
   Report(#[from] ReportError),

   /// Error already reported to the user (e.g., validation summary printed).
   #[error("{message}")]
   Reported { message: String, exit_code: i32 },
}

impl Error {
   pub const fn exit_code(&self) -> i32 {
      match self {
         Self::Reported { exit_code, .. } => *exit_code,
         Self::Connection(_) => 2,
         Self::Authorization(_) => 3,
         Self::Query { .. }
         | Self::ForbiddenField { .. }
         | Self::WidthExceeded { .. }
         | Self::OptionTooLong { .. }
         | Self::ReadOnlyViolation(_) => 4,
         Self::Timeout { .. } => 11,
         Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Report(_) => 1,
      }
   }

   /// Classifies a transport error raised while reading `table`.
   ///
   /// Logon and authorization problems keep their own category even when
   /// they surface in the middle of a query.
   pub fn from_query(table: &str, err: RfcError) -> Self {
      match err {
         RfcError::Logon(_) | RfcError::NotAuthorized { .. } => Self::Authorization(err),
         RfcError::Communication(_) => Self::Connection(err),
         other => Self::Query { table: table.to_string(), source: other },
      }
   }
}

/// Errors raised by an RFC transport.
#[derive(Debug, Error)]
pub enum RfcError {
   /// Network-level failure (DNS, refused connection, timeout).
   #[error("cannot reach SAP server: {0}")]
   Communication(String),

   /// Logon rejected (wrong credentials, locked user).
   #[error("logon rejected: {0}")]
   Logon(String),

   /// Authorization check failed inside the function module.
   #[error("{function}: not authorized: {message}")]
   NotAuthorized { function: String, message: String },

   /// The function module raised a classic ABAP exception.
   #[error("{function} raised {exception}: {message}")]
   Exception {
      function:  String,
      exception: String,
      message:   String,
   },

   /// Unexpected HTTP status without a SOAP fault body.
   #[error("unexpected HTTP status {0}")]
   HttpStatus(u16),

   /// The response could not be decoded.
   #[error("malformed response: {0}")]
   Protocol(String),

   /// The session was used after it was closed.
   #[error("session is closed")]
   Closed,
}

impl From<reqwest::Error> for RfcError {
   fn from(e: reqwest::Error) -> Self {
      if let Some(status) = e.status() {
         return Self::HttpStatus(status.as_u16());
      }
      if e.is_connect() || e.is_timeout() || e.is_request() {
         return Self::Communication(e.to_string());
      }
      Self::Protocol(e.to_string())
   }
}

impl From<quick_xml::Error> for RfcError {
   fn from(e: quick_xml::Error) -> Self {
      Self::Protocol(e.to_string())
   }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
   /// Connection parameters are missing or malformed.
   #[error("invalid connection parameters: {}", .0.join("; "))]
   InvalidConnection(Vec<String>),

   /// A configuration value is out of range.
   #[error("invalid setting {key}: {reason}")]
   InvalidSetting { key: &'static str, reason: String },

   /// Failed to build the HTTP client.
   #[error("failed to build http client: {0}")]
   HttpClient(#[source] reqwest::Error),
}

/// Errors raised while rendering the PDF report.
#[derive(Debug, Error)]
pub enum ReportError {
   /// PDF object serialization failed.
   #[error("pdf encoding failed: {0}")]
   Pdf(#[from] lopdf::Error),

   /// The document could not be serialized.
   #[error("pdf serialization failed: {0}")]
   Encode(String),

   /// Failed to create the output directory.
   #[error("failed to create output directory: {0}")]
   CreateDir(#[source] io::Error),

   /// Failed to write the report file.
   #[error("failed to write report: {0}")]
   Write(#[source] io::Error),
}

/// Standard result type using [`enum@Error`] as the default error type
pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Read-only integrity scan of SAP Generic Object Services attachments.
//!
//! Relationship records (SRGBTBREL) are checked against physical document
//! metadata (SOFFPHIO) over RFC; findings are written to a PDF audit report.

pub mod cmd;
pub mod config;
pub mod connector;
pub mod error;
pub mod report;
pub mod rfc;
pub mod scan;
pub mod security;
pub mod tables;
pub mod types;
pub mod util;

pub use error::{Error, Result};

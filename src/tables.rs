//! GOS tables and the exact field lists the scan reads from them.
//!
//! Every `RFC_READ_TABLE` request the crate issues is built from one of the
//! [`TableQuery`] plans below. None of them names a content column.

/// Relationships between business objects and stored documents.
pub const SRGBTBREL: &str = "SRGBTBREL";
/// Physical document metadata.
pub const SOFFPHIO: &str = "SOFFPHIO";
/// Physical document content (cluster table).
pub const SOFFCONT1: &str = "SOFFCONT1";

/// Tables the scan touches, in the order it touches them.
pub const GOS_TABLES: &[&str] = &[SOFFCONT1, SRGBTBREL, SOFFPHIO];

/// Columns that hold document payloads and must never be requested.
pub const BINARY_COLUMNS: &[&str] = &["CLUSTD"];

/// Dictionary types whose contents are raw bytes.
pub const BINARY_TYPES: &[&str] = &["RAW", "RAWSTRING", "LRAW", "VARC"];

pub const RELATIONSHIP_FIELDS: &[&str] =
   &["BRELGUID", "RELTYPE", "INSTID_A", "TYPEID_A", "INSTID_B", "TYPEID_B"];

pub const DOCUMENT_FIELDS: &[&str] = &["PHIO_ID", "PH_CLASS", "LOIO_ID", "CREA_TIME"];

pub const CONTENT_FIELDS: &[&str] = &["PHIO_ID"];

/// Field list and table for one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableQuery {
   pub table:  &'static str,
   pub fields: &'static [&'static str],
}

pub const RELATIONSHIPS: TableQuery = TableQuery { table: SRGBTBREL, fields: RELATIONSHIP_FIELDS };
pub const DOCUMENTS: TableQuery = TableQuery { table: SOFFPHIO, fields: DOCUMENT_FIELDS };
pub const CONTENT: TableQuery = TableQuery { table: SOFFCONT1, fields: CONTENT_FIELDS };

/// Every read the scan can issue.
pub const SCAN_QUERIES: &[TableQuery] = &[RELATIONSHIPS, DOCUMENTS, CONTENT];

pub fn is_binary_column(field: &str) -> bool {
   BINARY_COLUMNS
      .iter()
      .any(|c| c.eq_ignore_ascii_case(field.trim()))
}

pub fn is_binary_type(datatype: &str) -> bool {
   BINARY_TYPES
      .iter()
      .any(|t| t.eq_ignore_ascii_case(datatype.trim()))
}

/// Quotes a value as an Open SQL literal.
pub fn sql_literal(value: &str) -> String {
   format!("'{}'", value.replace('\'', "''"))
}

/// Builds `FIELD IN ( 'a' , 'b' )` with tokens separated for option wrapping.
pub fn in_clause(field: &str, values: &[String]) -> String {
   let list = values
      .iter()
      .map(|v| sql_literal(v))
      .collect::<Vec<_>>()
      .join(" , ");
   format!("{field} IN ( {list} )")
}

//! The scan reads metadata only: no content column, no write-capable
//! function module, no option line wider than the RFC limit.

mod support;

use gosscan::{
   Error,
   connector::{ALLOWED_FUNCTIONS, MAX_OPTION_LENGTH, ReadRequest, ensure_read_only},
   rfc::memory::MemoryField,
   scan::{IntegrityScanner, ScanOptions},
   tables::{self, TableQuery},
};
use support::{content, document, gos_system, relationship, target};

#[test]
fn planned_queries_never_name_content_columns() {
   for query in tables::SCAN_QUERIES {
      for field in query.fields {
         assert!(!tables::is_binary_column(field), "{}-{field} is a content column", query.table);
      }
   }
   assert!(tables::SCAN_QUERIES.iter().all(|q| q.table != "SOFFCONT1" || q.fields == ["PHIO_ID"]));
}

#[test]
fn only_read_functions_are_allowed() {
   for function in ALLOWED_FUNCTIONS {
      ensure_read_only(function).expect("allowed");
   }
   for function in ["RFC_ABAP_INSTALL_AND_RUN", "BAPI_DOCUMENT_DELETE", "SO_DOCUMENT_DELETE_API1"] {
      let err = ensure_read_only(function).expect_err("write-capable");
      assert!(matches!(err, Error::ReadOnlyViolation(_)));
      assert_eq!(err.exit_code(), 4);
   }
}

#[tokio::test]
async fn full_scan_stays_within_the_contract() {
   let system = gos_system();
   system.insert_rows("SOFFPHIO", (0..60).map(|i| document(&format!("FOL{i:020}"))));
   system.insert_rows("SOFFCONT1", (0..60).map(|i| content(&format!("FOL{i:020}"), 1)));
   system.insert_rows("SRGBTBREL", [relationship("G1", "OBJ", "FOL-MISSING")]);

   let mut connector = support::connector(&system);
   connector.connect().await.expect("connect");
   let options = ScanOptions { id_chunk_size: 25, ..ScanOptions::default() };
   let report = IntegrityScanner::new(&mut connector, options)
      .run(&target(), &mut ())
      .await
      .expect("scan");
   assert_eq!(report.unreferenced_content_rows, 60);

   let calls = system.calls();
   assert!(calls.iter().all(|c| ALLOWED_FUNCTIONS.contains(&c.call.function.as_str())));

   let reads = system.calls_to("RFC_READ_TABLE");
   let content_reads = reads
      .iter()
      .filter(|c| c.scalar_param("QUERY_TABLE") == Some("SOFFCONT1"))
      .count();
   assert_eq!(content_reads, 3);

   for call in &reads {
      for field in call.table_param("FIELDS") {
         assert_ne!(field.get("FIELDNAME").map(String::as_str), Some("CLUSTD"));
      }
      for line in call.table_param("OPTIONS") {
         let text = line.get("TEXT").map_or("", String::as_str);
         assert!(text.chars().count() <= MAX_OPTION_LENGTH, "option line too long: {text}");
      }
   }
}

#[tokio::test]
async fn content_column_is_refused_before_any_read() {
   let system = gos_system();
   let mut connector = support::connector(&system);

   let query = TableQuery { table: "SOFFCONT1", fields: &["PHIO_ID", "CLUSTD"] };
   let err = connector
      .read_table(&ReadRequest::new(query, 10), &mut |_| {})
      .await
      .expect_err("binary column");
   assert!(matches!(err, Error::ForbiddenField { ref field, .. } if field == "CLUSTD"));
   assert!(system.calls().is_empty());
}

#[tokio::test]
async fn binary_dictionary_type_is_refused() {
   let system = gos_system().with_table("ZGOS_BLOB", vec![
      MemoryField::new("ID", "CHAR", 10),
      MemoryField::new("PAYLOAD", "RAWSTRING", 0),
   ]);
   let mut connector = support::connector(&system);
   connector.connect().await.expect("connect");

   let query = TableQuery { table: "ZGOS_BLOB", fields: &["ID", "PAYLOAD"] };
   let err = connector
      .read_table(&ReadRequest::new(query, 10), &mut |_| {})
      .await
      .expect_err("binary type");
   assert!(matches!(err, Error::ForbiddenField { ref field, .. } if field == "PAYLOAD"));
   assert!(system.calls_to("RFC_READ_TABLE").is_empty());
}

#[tokio::test]
async fn over_wide_field_list_is_refused() {
   let system = gos_system().with_table("ZWIDE", vec![
      MemoryField::new("A", "CHAR", 255),
      MemoryField::new("B", "CHAR", 255),
      MemoryField::new("C", "CHAR", 10),
   ]);
   let mut connector = support::connector(&system);
   connector.connect().await.expect("connect");

   let query = TableQuery { table: "ZWIDE", fields: &["A", "B", "C"] };
   let err = connector
      .read_table(&ReadRequest::new(query, 10), &mut |_| {})
      .await
      .expect_err("too wide");
   assert!(matches!(err, Error::WidthExceeded { width: 522, limit: 512, .. }), "{err}");
   assert_eq!(err.exit_code(), 4);
   assert!(system.calls_to("RFC_READ_TABLE").is_empty());
}

#[tokio::test]
async fn missing_dictionary_skips_width_check_and_still_reads() {
   let system = gos_system().fail_function("DDIF_FIELDINFO_GET");
   system.insert_rows("SOFFPHIO", (0..7).map(|i| document(&format!("FOL{i:020}"))));
   let mut connector = support::connector(&system);
   connector.connect().await.expect("connect");

   let mut seen = 0usize;
   let total = connector
      .read_table(&ReadRequest::new(tables::DOCUMENTS, 5), &mut |rows| seen += rows.len())
      .await
      .expect("read without dictionary");

   assert_eq!(total, 7);
   assert_eq!(seen, 7);
   assert_eq!(system.calls_to("DDIF_FIELDINFO_GET").len(), 1);
   assert_eq!(system.calls_to("RFC_READ_TABLE").len(), 2);
}

#[tokio::test]
async fn missing_dictionary_still_refuses_content_column() {
   let system = gos_system().fail_function("DDIF_FIELDINFO_GET");
   let mut connector = support::connector(&system);
   connector.connect().await.expect("connect");

   let query = TableQuery { table: "SOFFCONT1", fields: &["PHIO_ID", "CLUSTD"] };
   let err = connector
      .read_table(&ReadRequest::new(query, 10), &mut |_| {})
      .await
      .expect_err("content column");
   assert!(matches!(err, Error::ForbiddenField { .. }));
   assert!(system.calls_to("RFC_READ_TABLE").is_empty());
}

#[tokio::test]
async fn disconnect_twice_closes_once() {
   let system = gos_system();
   let mut connector = support::connector(&system);
   connector.connect().await.expect("connect");

   connector.disconnect().await.expect("first close");
   connector.disconnect().await.expect("second close");

   assert_eq!(system.close_count(), 1);
   assert!(!connector.is_connected());
   assert_eq!(connector.row_count(tables::SOFFPHIO).await, None);
   assert_eq!(system.calls_to("EM_GET_NUMBER_OF_ENTRIES").len(), 0);
}

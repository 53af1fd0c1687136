//! A4 PDF rendering with the base-14 Helvetica fonts.

use lopdf::{
   Document, Object, Stream,
   content::{Content, Operation},
   dictionary,
};

use super::ReportOptions;
use crate::{
   error::ReportError,
   scan::ScanReport,
   util::{format_count, format_size_mb, pdf_text, truncate},
};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FOOTER_Y: i64 = 30;
/// Characters per wrapped body line at 10pt.
const WRAP_WIDTH: usize = 95;

#[derive(Clone, Copy)]
enum Font {
   Regular,
   Bold,
}

impl Font {
   const fn resource(self) -> &'static str {
      match self {
         Self::Regular => "F1",
         Self::Bold => "F2",
      }
   }
}

/// Lays out text lines top to bottom, starting a new page when full.
struct PageWriter {
   pages:   Vec<Vec<Operation>>,
   current: Vec<Operation>,
   y:       i64,
}

impl PageWriter {
   fn new() -> Self {
      Self { pages: Vec::new(), current: Vec::new(), y: PAGE_HEIGHT - MARGIN }
   }

   fn ensure_space(&mut self, height: i64) {
      if self.y - height < MARGIN {
         self.pages.push(std::mem::take(&mut self.current));
         self.y = PAGE_HEIGHT - MARGIN;
      }
   }

   fn text_at(ops: &mut Vec<Operation>, font: Font, size: i64, x: i64, y: i64, text: &str) {
      ops.push(Operation::new("BT", vec![]));
      ops.push(Operation::new("Tf", vec![font.resource().into(), Object::Integer(size)]));
      ops.push(Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]));
      ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_text(text))]));
      ops.push(Operation::new("ET", vec![]));
   }

   fn line(&mut self, font: Font, size: i64, text: &str) {
      self.row(font, size, &[(MARGIN, text)]);
   }

   /// One line with several cells at fixed x positions.
   fn row(&mut self, font: Font, size: i64, cells: &[(i64, &str)]) {
      let height = size + 4;
      self.ensure_space(height);
      self.y -= height;
      for (x, text) in cells {
         Self::text_at(&mut self.current, font, size, *x, self.y, text);
      }
   }

   fn paragraph(&mut self, text: &str, indent: &str) {
      for (i, line) in wrap_text(text, WRAP_WIDTH).iter().enumerate() {
         let prefix = if i == 0 { "- " } else { indent };
         self.line(Font::Regular, 10, &format!("{prefix}{line}"));
      }
   }

   fn heading(&mut self, text: &str) {
      self.ensure_space(40);
      self.gap(10);
      self.line(Font::Bold, 13, text);
      self.gap(2);
   }

   fn gap(&mut self, height: i64) {
      self.y -= height;
   }

   fn finish(mut self) -> Vec<Vec<Operation>> {
      if !self.current.is_empty() || self.pages.is_empty() {
         self.pages.push(self.current);
      }
      self.pages
   }
}

/// Greedy word wrap; words longer than `width` get their own line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
   let mut lines = Vec::new();
   let mut line = String::new();
   for word in text.split_whitespace() {
      if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
         lines.push(std::mem::take(&mut line));
      }
      if !line.is_empty() {
         line.push(' ');
      }
      line.push_str(word);
   }
   if !line.is_empty() {
      lines.push(line);
   }
   lines
}

fn header(w: &mut PageWriter, report: &ScanReport, options: &ReportOptions) {
   w.line(Font::Bold, 18, &options.title);
   w.gap(6);
   let t = &report.target;
   w.line(Font::Regular, 10, &format!("System: {}   Client: {}   Host: {}", t.system, t.client, t.host));
   w.line(
      Font::Regular,
      10,
      &format!(
         "Scan started: {}   Duration: {:.1}s",
         report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
         report.duration_ms as f64 / 1000.0
      ),
   );
   if report.sampled {
      w.line(
         Font::Bold,
         10,
         "SAMPLED SCAN: row caps were applied, findings are indicative only.",
      );
   }
}

fn summary(w: &mut PageWriter, report: &ScanReport) {
   w.heading("Summary");
   let content_total = report
      .content_rows_total
      .map_or_else(|| "unknown".to_string(), format_count);
   let rows = [
      ("Relationships scanned (SRGBTBREL)", format_count(report.relationships_scanned)),
      ("Physical documents scanned (SOFFPHIO)", format_count(report.documents_scanned)),
      ("Content rows in SOFFCONT1", content_total),
      ("Orphaned relationships", format_count(report.orphaned_relationships.len() as u64)),
      ("Unreferenced documents", format_count(report.unreferenced_documents.len() as u64)),
      ("Unreferenced content rows", format_count(report.unreferenced_content_rows)),
      ("Integrity score", format!("{:.2}%", report.integrity_score)),
      ("Estimated reclaimable storage", format_size_mb(report.estimated_storage_mb)),
      ("Estimated storage cost", format!("${:.2}", report.estimated_cost_usd)),
   ];
   for (label, value) in &rows {
      w.row(Font::Regular, 10, &[(MARGIN, *label), (MARGIN + 260, value.as_str())]);
   }
}

fn recommendations(w: &mut PageWriter, report: &ScanReport) {
   w.heading("Recommendations");
   for rec in &report.recommendations {
      w.paragraph(rec, "  ");
   }
}

fn omitted_note(w: &mut PageWriter, total: usize, shown: usize) {
   if total > shown {
      w.gap(4);
      w.line(
         Font::Regular,
         9,
         &format!("... {} more omitted (showing first {shown}).", format_count((total - shown) as u64)),
      );
   }
}

fn orphan_table(w: &mut PageWriter, report: &ScanReport, max_rows: usize) {
   w.heading("Orphaned Relationships");
   if report.orphaned_relationships.is_empty() {
      w.line(Font::Regular, 10, "No orphaned relationships found.");
      return;
   }

   let columns = [MARGIN, MARGIN + 170, MARGIN + 250, MARGIN + 400];
   w.row(Font::Bold, 9, &[
      (columns[0], "Document ID"),
      (columns[1], "Object Type"),
      (columns[2], "Object ID"),
      (columns[3], "Relation GUID"),
   ]);
   for rel in report.orphaned_relationships.iter().take(max_rows) {
      let cells = [
         truncate(&rel.document_id, 36),
         truncate(&rel.object_type, 16),
         truncate(&rel.object_id, 32),
         truncate(&rel.guid, 20),
      ];
      w.row(Font::Regular, 8, &[
         (columns[0], cells[0].as_str()),
         (columns[1], cells[1].as_str()),
         (columns[2], cells[2].as_str()),
         (columns[3], cells[3].as_str()),
      ]);
   }
   omitted_note(w, report.orphaned_relationships.len(), max_rows);
}

fn unreferenced_table(w: &mut PageWriter, report: &ScanReport, max_rows: usize) {
   w.heading("Unreferenced Documents");
   if report.unreferenced_documents.is_empty() {
      w.line(Font::Regular, 10, "No unreferenced documents found.");
      return;
   }

   let columns = [MARGIN, MARGIN + 190, MARGIN + 270, MARGIN + 450];
   w.row(Font::Bold, 9, &[
      (columns[0], "PHIO ID"),
      (columns[1], "Class"),
      (columns[2], "LOIO ID"),
      (columns[3], "Created"),
   ]);
   for doc in report.unreferenced_documents.iter().take(max_rows) {
      let cells = [
         truncate(&doc.phio_id, 36),
         truncate(&doc.ph_class, 14),
         truncate(&doc.loio_id, 36),
         truncate(&doc.created_at, 16),
      ];
      w.row(Font::Regular, 8, &[
         (columns[0], cells[0].as_str()),
         (columns[1], cells[1].as_str()),
         (columns[2], cells[2].as_str()),
         (columns[3], cells[3].as_str()),
      ]);
   }
   omitted_note(w, report.unreferenced_documents.len(), max_rows);
}

/// Renders the scan report as an uncompressed PDF.
pub fn render_pdf(report: &ScanReport, options: &ReportOptions) -> Result<Vec<u8>, ReportError> {
   let mut w = PageWriter::new();
   header(&mut w, report, options);
   summary(&mut w, report);
   recommendations(&mut w, report);
   orphan_table(&mut w, report, options.max_rows);
   unreferenced_table(&mut w, report, options.max_rows);
   let pages = w.finish();

   let mut doc = Document::with_version("1.5");
   let pages_id = doc.new_object_id();
   let regular_id = doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => "Helvetica",
   });
   let bold_id = doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => "Helvetica-Bold",
   });
   let resources_id = doc.add_object(dictionary! {
      "Font" => dictionary! {
         "F1" => regular_id,
         "F2" => bold_id,
      },
   });

   let total = pages.len();
   let mut kids: Vec<Object> = Vec::with_capacity(total);
   for (index, mut operations) in pages.into_iter().enumerate() {
      let footer = format!("{}   Page {} of {total}", options.title, index + 1);
      PageWriter::text_at(&mut operations, Font::Regular, 8, MARGIN, FOOTER_Y, &footer);

      let content = Content { operations };
      let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
      let page_id = doc.add_object(dictionary! {
         "Type" => "Page",
         "Parent" => pages_id,
         "Contents" => content_id,
      });
      kids.push(page_id.into());
   }

   doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
         "Type" => "Pages",
         "Kids" => kids,
         "Count" => Object::Integer(total as i64),
         "Resources" => resources_id,
         "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
         ],
      }),
   );
   let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
   });
   doc.trailer.set("Root", catalog_id);

   let mut out = Vec::new();
   doc
      .save_to(&mut out)
      .map_err(|e| ReportError::Encode(e.to_string()))?;
   tracing::debug!("rendered report with {total} pages ({} bytes)", out.len());
   Ok(out)
}

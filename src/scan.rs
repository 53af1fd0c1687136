//! GOS integrity scan.
//!
//! Reads relationships (SRGBTBREL) and physical document metadata
//! (SOFFPHIO), then anti-joins them in both directions:
//!
//! - relationships whose document identifier has no SOFFPHIO row are
//!   **orphaned**;
//! - SOFFPHIO rows that no relationship references are **unreferenced**; their
//!   SOFFCONT1 rows are counted (never read) to estimate reclaimable storage.

use std::{
   collections::HashSet,
   time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;

use crate::{
   Result,
   config::Config,
   connector::{ReadRequest, SapConnector},
   error::Error,
   rfc::RfcTransport,
   tables,
   types::{PhysicalDocument, RelationshipRecord},
};

/// Tuning for one scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
   pub batch_size:          usize,
   pub max_rows:            Option<u64>,
   pub id_chunk_size:       usize,
   pub relationship_filter: String,
   pub storage_kb_per_row:  f64,
   pub cost_per_gb_usd:     f64,
}

impl ScanOptions {
   pub fn from_config(cfg: &Config) -> Self {
      Self {
         batch_size:          cfg.effective_batch_size(),
         max_rows:            cfg.row_cap(),
         id_chunk_size:       cfg.effective_id_chunk_size(),
         relationship_filter: cfg.relationship_filter.clone(),
         storage_kb_per_row:  cfg.storage_kb_per_row,
         cost_per_gb_usd:     cfg.cost_per_gb_usd,
      }
   }
}

impl Default for ScanOptions {
   fn default() -> Self {
      Self::from_config(&Config::default())
   }
}

/// Identifies the scanned system in the report.
#[derive(Debug, Clone, Serialize)]
pub struct ScanTarget {
   pub system: String,
   pub client: String,
   pub host:   String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
   CountingContent,
   Relationships,
   Documents,
   Comparing,
   Content,
   Done,
}

impl ScanPhase {
   pub const fn label(self) -> &'static str {
      match self {
         Self::CountingContent => "Counting SOFFCONT1 rows",
         Self::Relationships => "Reading SRGBTBREL relationships",
         Self::Documents => "Reading SOFFPHIO documents",
         Self::Comparing => "Comparing record sets",
         Self::Content => "Counting unreferenced SOFFCONT1 rows",
         Self::Done => "Scan complete",
      }
   }
}

#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
   pub phase: ScanPhase,
   pub rows:  u64,
}

/// Trait for receiving scan progress updates
pub trait ScanProgressCallback: Send {
   fn progress(&mut self, progress: ScanProgress);
}

impl<F: FnMut(ScanProgress) + Send> ScanProgressCallback for F {
   fn progress(&mut self, progress: ScanProgress) {
      self(progress);
   }
}

impl ScanProgressCallback for () {
   fn progress(&mut self, _progress: ScanProgress) {}
}

impl ScanProgressCallback for ProgressBar {
   fn progress(&mut self, progress: ScanProgress) {
      if progress.rows == 0 {
         self.set_message(progress.phase.label());
      } else {
         self.set_message(format!("{} ({} rows)", progress.phase.label(), progress.rows));
      }
   }
}

/// Result of one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
   pub target:                    ScanTarget,
   pub started_at:                DateTime<Utc>,
   pub duration_ms:               u64,
   pub sampled:                   bool,
   pub relationships_scanned:     u64,
   pub documents_scanned:         u64,
   pub content_rows_total:        Option<u64>,
   pub orphaned_relationships:    Vec<RelationshipRecord>,
   pub unreferenced_documents:    Vec<PhysicalDocument>,
   pub unreferenced_content_rows: u64,
   pub integrity_score:           f64,
   pub estimated_storage_mb:      f64,
   pub estimated_cost_usd:        f64,
   pub recommendations:           Vec<String>,
}

impl ScanReport {
   /// Document identifiers of the orphaned relationships, in report order.
   pub fn orphaned_document_ids(&self) -> Vec<&str> {
      self
         .orphaned_relationships
         .iter()
         .map(|r| r.document_id.as_str())
         .collect()
   }
}

/// Relationships whose document identifier is not among `documents`.
/// Input order is kept.
pub fn orphaned_relationships(
   relationships: &[RelationshipRecord],
   documents: &[PhysicalDocument],
) -> Vec<RelationshipRecord> {
   let known: HashSet<&str> = documents.iter().map(|d| d.phio_id.as_str()).collect();
   relationships
      .iter()
      .filter(|r| !known.contains(r.document_id.as_str()))
      .cloned()
      .collect()
}

/// Documents that no relationship references, first occurrence only.
pub fn unreferenced_documents(
   relationships: &[RelationshipRecord],
   documents: &[PhysicalDocument],
) -> Vec<PhysicalDocument> {
   let referenced: HashSet<&str> = relationships
      .iter()
      .map(|r| r.document_id.as_str())
      .collect();
   let mut seen = HashSet::new();
   documents
      .iter()
      .filter(|d| !referenced.contains(d.phio_id.as_str()) && seen.insert(d.phio_id.as_str()))
      .cloned()
      .collect()
}

fn round2(value: f64) -> f64 {
   (value * 100.0).round() / 100.0
}

/// Share of relationships that resolve, 0-100.
pub fn integrity_score(relationships: u64, orphaned: u64) -> f64 {
   if relationships == 0 {
      return 100.0;
   }
   round2(relationships.saturating_sub(orphaned) as f64 / relationships as f64 * 100.0)
}

pub fn recommendations(
   score: f64,
   orphaned: usize,
   storage_mb: f64,
   sampled: bool,
) -> Vec<String> {
   let mut out = Vec::new();

   if score < 90.0 {
      out.push("CRITICAL: Integrity score below 90%. Immediate cleanup recommended.".to_string());
   } else if score < 95.0 {
      out.push("WARNING: Integrity score below 95%. Cleanup recommended.".to_string());
   }

   if storage_mb > 100.0 {
      out.push(format!(
         "HIGH STORAGE: {storage_mb:.2}MB available for cleanup. Consider Content Server \
          migration."
      ));
   }

   if orphaned > 1000 {
      out.push(format!(
         "LARGE ORPHAN COUNT: {orphaned} orphaned relationships found. Run archiving utilities \
          to reclaim space."
      ));
   }

   if sampled {
      out.push(
         "SAMPLED: Row caps were applied. Findings may include false positives; rerun without \
          sampling before cleanup."
            .to_string(),
      );
   }

   out.extend([
      "Validate findings in non-production system before cleanup".to_string(),
      "Backup relevant tables before executing cleanup operations".to_string(),
      "Review relationship mappings to confirm orphans are truly unused".to_string(),
   ]);
   out
}

pub struct IntegrityScanner<'c, T: RfcTransport> {
   connector: &'c mut SapConnector<T>,
   options:   ScanOptions,
}

impl<'c, T: RfcTransport> IntegrityScanner<'c, T> {
   pub const fn new(connector: &'c mut SapConnector<T>, options: ScanOptions) -> Self {
      Self { connector, options }
   }

   /// Runs [`Self::run`] under a wall-clock budget.
   pub async fn run_with_budget(
      &mut self,
      target: &ScanTarget,
      budget: Duration,
      progress: &mut dyn ScanProgressCallback,
   ) -> Result<ScanReport> {
      match tokio::time::timeout(budget, self.run(target, progress)).await {
         Ok(result) => result,
         Err(_) => {
            tracing::error!("scan exceeded its budget of {}s", budget.as_secs());
            Err(Error::Timeout { budget_secs: budget.as_secs() })
         },
      }
   }

   pub async fn run(
      &mut self,
      target: &ScanTarget,
      progress: &mut dyn ScanProgressCallback,
   ) -> Result<ScanReport> {
      let started_at = Utc::now();
      let clock = Instant::now();
      tracing::info!("starting GOS integrity scan for system {}", target.system);

      progress.progress(ScanProgress { phase: ScanPhase::CountingContent, rows: 0 });
      let content_rows_total = self.connector.row_count(tables::SOFFCONT1).await;

      let relationships = self.collect_relationships(progress).await?;
      let documents = self.collect_documents(progress).await?;

      progress.progress(ScanProgress { phase: ScanPhase::Comparing, rows: 0 });
      let orphaned = orphaned_relationships(&relationships, &documents);
      let unreferenced = unreferenced_documents(&relationships, &documents);
      tracing::info!(
         "{} orphaned relationships, {} unreferenced documents",
         orphaned.len(),
         unreferenced.len()
      );

      let unreferenced_content_rows = self.count_content_rows(&unreferenced, progress).await?;

      let relationships_scanned = relationships.len() as u64;
      let score = integrity_score(relationships_scanned, orphaned.len() as u64);
      let storage_mb = unreferenced_content_rows as f64 * self.options.storage_kb_per_row / 1000.0;
      let cost_usd = storage_mb * self.options.cost_per_gb_usd / 1000.0;
      let sampled = self.options.max_rows.is_some();

      let report = ScanReport {
         target: target.clone(),
         started_at,
         duration_ms: clock.elapsed().as_millis() as u64,
         sampled,
         relationships_scanned,
         documents_scanned: documents.len() as u64,
         content_rows_total,
         recommendations: recommendations(score, orphaned.len(), storage_mb, sampled),
         orphaned_relationships: orphaned,
         unreferenced_documents: unreferenced,
         unreferenced_content_rows,
         integrity_score: score,
         estimated_storage_mb: round2(storage_mb),
         estimated_cost_usd: round2(cost_usd),
      };

      progress.progress(ScanProgress { phase: ScanPhase::Done, rows: 0 });
      tracing::info!("GOS integrity scan completed in {}ms", report.duration_ms);
      Ok(report)
   }

   async fn collect_relationships(
      &mut self,
      progress: &mut dyn ScanProgressCallback,
   ) -> Result<Vec<RelationshipRecord>> {
      let request = ReadRequest::new(tables::RELATIONSHIPS, self.options.batch_size)
         .filter(self.options.relationship_filter.clone())
         .max_rows(self.options.max_rows);

      let mut out = Vec::new();
      let mut rows_seen = 0u64;
      let mut skipped = 0u64;
      progress.progress(ScanProgress { phase: ScanPhase::Relationships, rows: 0 });
      self
         .connector
         .read_table(&request, &mut |batch| {
            rows_seen += batch.len() as u64;
            for row in batch {
               match RelationshipRecord::from_row(row) {
                  Some(rec) => out.push(rec),
                  None => skipped += 1,
               }
            }
            progress.progress(ScanProgress { phase: ScanPhase::Relationships, rows: rows_seen });
         })
         .await?;

      if skipped > 0 {
         tracing::debug!("skipped {skipped} relationships without document id");
      }
      tracing::info!("collected {} relationships", out.len());
      Ok(out)
   }

   async fn collect_documents(
      &mut self,
      progress: &mut dyn ScanProgressCallback,
   ) -> Result<Vec<PhysicalDocument>> {
      let request = ReadRequest::new(tables::DOCUMENTS, self.options.batch_size)
         .max_rows(self.options.max_rows);

      let mut out = Vec::new();
      let mut rows_seen = 0u64;
      progress.progress(ScanProgress { phase: ScanPhase::Documents, rows: 0 });
      self
         .connector
         .read_table(&request, &mut |batch| {
            rows_seen += batch.len() as u64;
            out.extend(batch.iter().filter_map(PhysicalDocument::from_row));
            progress.progress(ScanProgress { phase: ScanPhase::Documents, rows: rows_seen });
         })
         .await?;

      tracing::info!("collected {} physical documents", out.len());
      Ok(out)
   }

   async fn count_content_rows(
      &mut self,
      unreferenced: &[PhysicalDocument],
      progress: &mut dyn ScanProgressCallback,
   ) -> Result<u64> {
      if unreferenced.is_empty() {
         return Ok(0);
      }

      let ids: Vec<String> = unreferenced.iter().map(|d| d.phio_id.clone()).collect();
      let mut count = 0u64;
      progress.progress(ScanProgress { phase: ScanPhase::Content, rows: 0 });
      for chunk in ids.chunks(self.options.id_chunk_size.max(1)) {
         let request = ReadRequest::new(tables::CONTENT, self.options.batch_size)
            .filter(tables::in_clause("PHIO_ID", chunk));
         count += self.connector.read_table(&request, &mut |_| {}).await?;
         progress.progress(ScanProgress { phase: ScanPhase::Content, rows: count });
      }

      tracing::info!("found {count} unreferenced SOFFCONT1 rows");
      Ok(count)
   }
}

//! Audit report output.

pub mod pdf;

use std::{
   fs,
   path::{Path, PathBuf},
};

use chrono::{DateTime, TimeZone};

pub use pdf::render_pdf;

use crate::{
   config::Config,
   error::{ReportError, Result},
   scan::ScanReport,
   util::sanitize_file_component,
};

#[derive(Debug, Clone)]
pub struct ReportOptions {
   pub title:    String,
   /// Rows listed per finding table before the rest is summarized.
   pub max_rows: usize,
}

impl ReportOptions {
   pub fn from_config(cfg: &Config) -> Self {
      Self { title: cfg.report_title.clone(), max_rows: cfg.report_max_rows }
   }
}

impl Default for ReportOptions {
   fn default() -> Self {
      Self::from_config(&Config::default())
   }
}

/// `GOS_Integrity_Audit_<SYSTEM>_<YYYYmmdd_HHMMSS>.pdf`
pub fn report_file_name<Tz: TimeZone>(system: &str, at: &DateTime<Tz>) -> String
where
   Tz::Offset: std::fmt::Display,
{
   format!(
      "GOS_Integrity_Audit_{}_{}.pdf",
      sanitize_file_component(system),
      at.format("%Y%m%d_%H%M%S")
   )
}

/// Renders `report` and writes it into `dir`, creating the directory.
///
/// The file name carries the scan start in UTC, matching the report header.
pub fn write_report(dir: &Path, report: &ScanReport, options: &ReportOptions) -> Result<PathBuf> {
   let bytes = render_pdf(report, options)?;
   fs::create_dir_all(dir).map_err(ReportError::CreateDir)?;

   let path = dir.join(report_file_name(&report.target.system, &report.started_at));
   fs::write(&path, bytes).map_err(ReportError::Write)?;

   tracing::info!("report written to {}", path.display());
   Ok(path)
}

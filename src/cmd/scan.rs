//! `scan`: run the integrity scan and write the PDF report.

use std::{
   path::{Path, PathBuf},
   time::Duration,
};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use super::{ConnectionArgs, open_connector};
use crate::{
   Result, config,
   config::Config,
   connector::SapConnector,
   report::{ReportOptions, write_report},
   rfc::RfcTransport,
   scan::{IntegrityScanner, ScanOptions, ScanProgressCallback, ScanReport, ScanTarget},
   util::{format_count, format_duration, format_size_mb},
};

/// Scan tuning flags; each overrides the matching config value.
#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
   #[arg(long, help = "Report output directory (default: ./reports)")]
   pub output: Option<PathBuf>,

   #[arg(long, help = "Rows per RFC_READ_TABLE call")]
   pub batch_size: Option<usize>,

   #[arg(long, help = "Row cap per table when sampling")]
   pub max_rows: Option<u64>,

   #[arg(long, help = "Cap every table read at --max-rows")]
   pub enable_sampling: bool,

   #[arg(long, help = "Title printed on the report")]
   pub report_title: Option<String>,

   #[arg(long, help = "JSON output")]
   pub json: bool,
}

impl ScanArgs {
   /// Applies the flags on top of `cfg` and validates the result.
   pub fn apply(&self, mut cfg: Config) -> Result<Config> {
      if let Some(dir) = &self.output {
         cfg.output_dir.clone_from(dir);
      }
      if let Some(n) = self.batch_size {
         cfg.batch_size = n;
      }
      if let Some(n) = self.max_rows {
         cfg.max_rows = n;
      }
      if self.enable_sampling {
         cfg.enable_sampling = true;
      }
      if let Some(title) = &self.report_title {
         cfg.report_title.clone_from(title);
      }
      cfg.validate()?;
      Ok(cfg)
   }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
   report_path: &'a Path,
   #[serde(flatten)]
   report:      &'a ScanReport,
}

/// Executes the scan command.
pub async fn execute(conn: ConnectionArgs, args: ScanArgs) -> Result<()> {
   let cfg = args.apply(config::get().clone())?;
   let params = conn.params(&cfg);
   let mut connector = open_connector(&params, conn.label())?;
   let target = ScanTarget {
      system: conn.system.trim().to_string(),
      client: conn.client.trim().to_string(),
      host:   conn.host.trim().to_string(),
   };

   let (report, path) = run(&mut connector, &target, &cfg, !args.json).await?;

   if args.json {
      println!("{}", serde_json::to_string_pretty(&JsonOutput { report_path: &path, report: &report })?);
   } else {
      print_summary(&report, &path);
   }
   Ok(())
}

/// Connects, scans within the configured budget, disconnects, and writes the
/// report. The session is closed even when the scan fails.
pub async fn run<T: RfcTransport>(
   connector: &mut SapConnector<T>,
   target: &ScanTarget,
   cfg: &Config,
   show_progress: bool,
) -> Result<(ScanReport, PathBuf)> {
   if let Err(err) = connector.connect().await {
      let _ = connector.disconnect().await;
      return Err(err);
   }

   let mut spinner = if show_progress {
      let spinner = ProgressBar::new_spinner();
      spinner.set_style(
         ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
      );
      spinner.enable_steady_tick(Duration::from_millis(100));
      Some(spinner)
   } else {
      None
   };

   let budget = Duration::from_secs(cfg.scan_budget_secs);
   let mut quiet = ();
   let result = {
      let mut scanner = IntegrityScanner::new(connector, ScanOptions::from_config(cfg));
      let progress: &mut dyn ScanProgressCallback = match spinner.as_mut() {
         Some(pb) => pb,
         None => &mut quiet,
      };
      scanner.run_with_budget(target, budget, progress).await
   };

   if let Err(err) = connector.disconnect().await {
      tracing::warn!("failed to close SAP session: {err}");
   }
   if let Some(pb) = spinner {
      pb.finish_and_clear();
   }

   let report = result?;
   let path = write_report(&cfg.output_dir, &report, &ReportOptions::from_config(cfg))?;
   Ok((report, path))
}

fn print_summary(report: &ScanReport, path: &Path) {
   let ok = report.orphaned_relationships.is_empty();
   let symbol = if ok { style("✓").green() } else { style("✗").red() };

   println!(
      "{} {} ({}/{})\n",
      style("GOS integrity scan").bold(),
      style(&report.target.system).cyan(),
      report.target.client,
      report.target.host
   );
   println!("  Relationships scanned:   {}", format_count(report.relationships_scanned));
   println!("  Documents scanned:       {}", format_count(report.documents_scanned));
   println!(
      "{} Orphaned relationships:  {}",
      symbol,
      style(format_count(report.orphaned_relationships.len() as u64)).bold()
   );
   println!("  Unreferenced documents:  {}", format_count(report.unreferenced_documents.len() as u64));
   println!("  Integrity score:         {:.2}%", report.integrity_score);
   println!("  Reclaimable storage:     {}", format_size_mb(report.estimated_storage_mb));
   println!(
      "  Duration:                {}",
      format_duration(Duration::from_millis(report.duration_ms))
   );
   if report.sampled {
      println!("\n{} {}", style("ℹ").cyan(), style("Sampled scan: row caps were applied").dim());
   }
   println!("\n{} {}", style("Report:").dim(), style(path.display()).cyan());
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn flags_override_config() {
      let args = ScanArgs {
         output: Some(PathBuf::from("/tmp/out")),
         batch_size: Some(100),
         max_rows: Some(10),
         enable_sampling: true,
         report_title: Some("Quarterly".to_string()),
         json: false,
      };
      let cfg = args.apply(Config::default()).expect("valid");
      assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
      assert_eq!(cfg.batch_size, 100);
      assert_eq!(cfg.row_cap(), Some(10));
      assert_eq!(cfg.report_title, "Quarterly");
   }

   #[test]
   fn invalid_override_is_a_config_error() {
      let args = ScanArgs { batch_size: Some(0), ..ScanArgs::default() };
      let err = args.apply(Config::default()).expect_err("zero batch");
      assert_eq!(err.exit_code(), 1);
   }
}

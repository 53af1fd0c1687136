//! `validate-connection`: logon, authorization and read-only compliance checks.
//!
//! Logon happens first, so bad credentials fail before any table is touched.

use console::style;

use super::{ConnectionArgs, open_connector};
use crate::{
   Error, Result, config,
   connector::SapConnector,
   error::ConfigError,
   rfc::RfcTransport,
   security::{
      ConnectionReport, ValidationResult, check_authorization, validate_connection_params,
      validate_read_only_compliance,
   },
};

/// Exit code when the checks ran but found violations.
pub const NON_COMPLIANT_EXIT: i32 = 5;

/// Executes the validate-connection command.
pub async fn execute(conn: ConnectionArgs, json: bool) -> Result<()> {
   let cfg = config::get();
   let params = conn.params(cfg);
   let parameters = validate_connection_params(&params);

   let mut connector = match open_connector(&params, conn.label()) {
      Ok(connector) => connector,
      Err(err) if !json && explained_by(&err, &parameters) => {
         print_section("Connection parameters", &parameters);
         return Err(Error::Reported { message: err.to_string(), exit_code: err.exit_code() });
      },
      Err(err) => return Err(err),
   };

   let report = run(&mut connector, parameters).await?;

   if json {
      println!("{}", serde_json::to_string_pretty(&report)?);
   } else {
      print_report(&report, &conn);
   }

   if report.is_compliant() {
      Ok(())
   } else {
      Err(Error::Reported {
         message:   format!("{} compliance violation(s) found", report.violation_count()),
         exit_code: NON_COMPLIANT_EXIT,
      })
   }
}

/// Whether printing the parameter violations already tells the user why
/// setup failed.
fn explained_by(err: &Error, parameters: &ValidationResult) -> bool {
   matches!(err, Error::Config(ConfigError::InvalidConnection(_)))
      && !parameters.violations.is_empty()
}

/// Connects, probes authorizations and audits the issued function modules.
/// The session is always closed before returning.
pub async fn run<T: RfcTransport>(
   connector: &mut SapConnector<T>,
   parameters: ValidationResult,
) -> Result<ConnectionReport> {
   if let Err(err) = connector.connect().await {
      let _ = connector.disconnect().await;
      return Err(err);
   }

   let authorization = check_authorization(connector).await;
   let read_only = validate_read_only_compliance(connector.issued_functions());
   if let Err(err) = connector.disconnect().await {
      tracing::warn!("failed to close SAP session: {err}");
   }

   Ok(ConnectionReport { parameters, authorization: authorization?, read_only })
}

fn print_section(title: &str, result: &ValidationResult) {
   let symbol = if result.is_compliant { style("✓").green() } else { style("✗").red() };
   println!("{symbol} {title}");
   for violation in &result.violations {
      println!("    {} {}", style("✗").red(), violation);
   }
   for rec in &result.recommendations {
      println!("    {} {}", style("ℹ").cyan(), style(rec).dim());
   }
}

fn print_report(report: &ConnectionReport, conn: &ConnectionArgs) {
   println!(
      "{} {}\n",
      style("GOS connection validation").bold(),
      style(conn.label()).cyan()
   );
   println!("{} Logon ({})", style("✓").green(), style(&conn.user).dim());
   print_section("Connection parameters", &report.parameters);
   print_section("Table authorizations", &report.authorization);
   print_section("Read-only compliance", &report.read_only);

   if report.is_compliant() {
      println!("\n{}", style("✓ Connection is compliant and ready to scan.").green().bold());
   } else {
      println!(
         "\n{}",
         style(format!("✗ {} violation(s) found.", report.violation_count()))
            .red()
            .bold()
      );
   }
}

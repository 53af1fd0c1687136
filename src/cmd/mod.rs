//! CLI command implementations for gosscan.
//!
//! Each module corresponds to one subcommand.

pub mod scan;
pub mod validate_connection;

use std::time::Duration;

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::{
   Result,
   config::Config,
   connector::SapConnector,
   rfc::{ConnectionParams, Password, SoapTransport},
};

/// Logon flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
   #[arg(long, help = "SAP system id (e.g. PRD)")]
   pub system: String,

   #[arg(long, help = "SAP client (three digits)")]
   pub client: String,

   #[arg(long, help = "Application server host")]
   pub host: String,

   #[arg(long, help = "System number (two digits)")]
   pub sysnr: String,

   #[arg(long, help = "RFC user")]
   pub user: String,

   #[arg(long, env = "GOSSCAN_PASSWORD", hide_env_values = true, help = "RFC password")]
   pub password: String,

   #[arg(long, help = "HTTP port of the ICM (default: 80<sysnr>, 443<sysnr> with --https)")]
   pub port: Option<u16>,

   #[arg(long, help = "Connect over HTTPS")]
   pub https: bool,
}

impl ConnectionArgs {
   pub fn params(&self, cfg: &Config) -> ConnectionParams {
      let mut params = ConnectionParams::new(
         self.host.trim(),
         self.sysnr.trim(),
         self.client.trim(),
         self.user.trim(),
         Password::new(self.password.clone()),
      );
      params.language.clone_from(&cfg.language);
      params.trace.clone_from(&cfg.trace);
      params.port = self.port;
      params.https = self.https;
      params.timeout = Duration::from_secs(cfg.request_timeout_secs.max(1));
      params
   }

   /// `SYSTEM/client@host`, used in log lines.
   pub fn label(&self) -> String {
      format!("{}/{}@{}", self.system.trim(), self.client.trim(), self.host.trim())
   }
}

/// Log filter for the CLI: a usable `RUST_LOG` wins, else WARN (INFO with
/// `--verbose`).
pub fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
   rust_log
      .filter(|v| !v.trim().is_empty())
      .and_then(|v| EnvFilter::try_new(v).ok())
      .unwrap_or_else(|| EnvFilter::new(if verbose { "info" } else { "warn" }))
}

/// Validates `params` and opens an (unconnected) SOAP-backed connector.
pub fn open_connector(
   params: &ConnectionParams,
   label: String,
) -> Result<SapConnector<SoapTransport>> {
   params.validate()?;
   let transport = SoapTransport::new(params)?;
   tracing::debug!("rfc endpoint: {}", transport.endpoint());
   Ok(SapConnector::new(transport, label))
}

#[cfg(test)]
mod tests {
   use super::*;

   fn args() -> ConnectionArgs {
      ConnectionArgs {
         system:   " PRD ".to_string(),
         client:   "100".to_string(),
         host:     "sap.example".to_string(),
         sysnr:    "01".to_string(),
         user:     "AUDITOR".to_string(),
         password: "secret".to_string(),
         port:     None,
         https:    true,
      }
   }

   #[test]
   fn params_take_settings_from_config() {
      let cfg = Config { language: "DE".to_string(), request_timeout_secs: 5, ..Config::default() };
      let params = args().params(&cfg);
      assert_eq!(params.language, "DE");
      assert_eq!(params.timeout, Duration::from_secs(5));
      assert!(params.https);
      assert_eq!(params.http_port(), 44301);
      assert_eq!(args().label(), "PRD/100@sap.example");
   }

   #[test]
   fn invalid_params_fail_before_transport() {
      let mut bad = args();
      bad.client = "1".to_string();
      let err = open_connector(&bad.params(&Config::default()), bad.label())
         .err()
         .expect("invalid client");
      assert_eq!(err.exit_code(), 1);
   }

   #[test]
   fn rust_log_overrides_default_level() {
      assert_eq!(log_filter(false, Some("debug")).to_string(), "debug");
      assert_eq!(log_filter(true, Some("gosscan=trace")).to_string(), "gosscan=trace");
      assert_eq!(log_filter(false, None).to_string(), "warn");
      assert_eq!(log_filter(true, Some("  ")).to_string(), "info");
   }
}

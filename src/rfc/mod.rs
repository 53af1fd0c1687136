//! RFC call model and the transport seam.
//!
//! Function modules are invoked with named scalar and table parameters and
//! answer with the same shape. The production transport speaks SOAP over
//! HTTP ([`soap::SoapTransport`]); [`memory::MemorySystem`] serves tests.

pub mod memory;
pub mod soap;

use std::{collections::BTreeMap, fmt, time::Duration};

use crate::error::{ConfigError, RfcError, Result};

pub use memory::{MemorySystem, MemoryTransport, RecordedCall};
pub use soap::SoapTransport;

/// One row of an RFC table parameter, keyed by component name.
pub type RfcRow = BTreeMap<String, String>;

/// Builds an [`RfcRow`] from `(name, value)` pairs.
pub fn row<const N: usize>(pairs: [(&str, &str); N]) -> RfcRow {
   pairs
      .into_iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RfcParam {
   Scalar(String),
   Table(Vec<RfcRow>),
}

/// A function module invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfcCall {
   pub function: String,
   pub params:   Vec<(String, RfcParam)>,
}

impl RfcCall {
   pub fn new(function: impl Into<String>) -> Self {
      Self { function: function.into(), params: Vec::new() }
   }

   pub fn scalar(mut self, name: &str, value: impl Into<String>) -> Self {
      self.params.push((name.to_string(), RfcParam::Scalar(value.into())));
      self
   }

   /// Adds a table parameter. Empty tables are still sent so that the
   /// server returns the table in its response.
   pub fn table(mut self, name: &str, rows: Vec<RfcRow>) -> Self {
      self.params.push((name.to_string(), RfcParam::Table(rows)));
      self
   }

   pub fn param(&self, name: &str) -> Option<&RfcParam> {
      self.params.iter().find(|(n, _)| n == name).map(|(_, p)| p)
   }

   pub fn scalar_param(&self, name: &str) -> Option<&str> {
      match self.param(name) {
         Some(RfcParam::Scalar(v)) => Some(v),
         _ => None,
      }
   }

   pub fn table_param(&self, name: &str) -> &[RfcRow] {
      match self.param(name) {
         Some(RfcParam::Table(rows)) => rows,
         _ => &[],
      }
   }
}

/// Decoded response of a function module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RfcResponse {
   pub scalars: BTreeMap<String, String>,
   pub tables:  BTreeMap<String, Vec<RfcRow>>,
}

impl RfcResponse {
   pub fn scalar(&self, name: &str) -> Option<&str> {
      self.scalars.get(name).map(String::as_str)
   }

   /// Returns the rows of a table parameter; absent tables are empty.
   pub fn table(&self, name: &str) -> &[RfcRow] {
      self.tables.get(name).map_or(&[], Vec::as_slice)
   }
}

/// Transport able to invoke remote-enabled function modules.
#[async_trait::async_trait]
pub trait RfcTransport: Send + Sync {
   async fn invoke(&self, call: &RfcCall) -> Result<RfcResponse, RfcError>;

   /// Releases the session. Transports without session state do nothing.
   async fn close(&self) -> Result<(), RfcError> {
      Ok(())
   }
}

#[async_trait::async_trait]
impl<T: RfcTransport + ?Sized> RfcTransport for Box<T> {
   async fn invoke(&self, call: &RfcCall) -> Result<RfcResponse, RfcError> {
      (**self).invoke(call).await
   }

   async fn close(&self) -> Result<(), RfcError> {
      (**self).close().await
   }
}

/// Logon password. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
   pub fn new(value: impl Into<String>) -> Self {
      Self(value.into())
   }

   pub fn expose(&self) -> &str {
      &self.0
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }
}

impl fmt::Debug for Password {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str("Password(***)")
   }
}

/// SAP logon parameters for a single application server.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
   pub ashost:   String,
   pub sysnr:    String,
   pub client:   String,
   pub user:     String,
   pub password: Password,
   pub language: String,
   pub trace:    String,
   pub port:     Option<u16>,
   pub https:    bool,
   pub timeout:  Duration,
}

impl ConnectionParams {
   pub fn new(
      ashost: impl Into<String>,
      sysnr: impl Into<String>,
      client: impl Into<String>,
      user: impl Into<String>,
      password: Password,
   ) -> Self {
      Self {
         ashost: ashost.into(),
         sysnr: sysnr.into(),
         client: client.into(),
         user: user.into(),
         password,
         language: "EN".to_string(),
         trace: "0".to_string(),
         port: None,
         https: false,
         timeout: Duration::from_secs(60),
      }
   }

   /// Checks that every logon field is present and well formed.
   pub fn validate(&self) -> Result<()> {
      let mut errors = Vec::new();
      if self.ashost.trim().is_empty() {
         errors.push("missing host".to_string());
      }
      if self.sysnr.trim().is_empty() {
         errors.push("missing system number".to_string());
      } else if !is_digits(&self.sysnr, 2) {
         errors.push(format!("system number must be two digits, got '{}'", self.sysnr));
      }
      if self.client.trim().is_empty() {
         errors.push("missing client".to_string());
      } else if !is_digits(&self.client, 3) {
         errors.push(format!("client must be three digits, got '{}'", self.client));
      }
      if self.user.trim().is_empty() {
         errors.push("missing user".to_string());
      }
      if self.password.is_empty() {
         errors.push("missing password".to_string());
      }

      if errors.is_empty() {
         Ok(())
      } else {
         Err(ConfigError::InvalidConnection(errors).into())
      }
   }

   /// HTTP port of the ICM: explicit, else `80NN` (`443NN` for HTTPS).
   pub fn http_port(&self) -> u16 {
      if let Some(port) = self.port {
         return port;
      }
      let nn: u16 = self.sysnr.parse().unwrap_or(0);
      if self.https { 44300 + nn } else { 8000 + nn }
   }

   pub fn endpoint(&self) -> String {
      let scheme = if self.https { "https" } else { "http" };
      format!(
         "{scheme}://{}:{}/sap/bc/soap/rfc?sap-client={}&sap-language={}",
         self.ashost,
         self.http_port(),
         self.client,
         self.language
      )
   }
}

fn is_digits(value: &str, len: usize) -> bool {
   value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

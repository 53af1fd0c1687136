//! Connection compliance checks for `validate-connection`.

use serde::Serialize;

use crate::{
   Result,
   connector::{ALLOWED_FUNCTIONS, SapConnector},
   error::{ConfigError, Error},
   rfc::{ConnectionParams, RfcTransport},
   tables,
};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
   pub is_compliant:    bool,
   pub violations:      Vec<String>,
   pub recommendations: Vec<String>,
}

impl Default for ValidationResult {
   fn default() -> Self {
      Self { is_compliant: true, violations: Vec::new(), recommendations: Vec::new() }
   }
}

impl ValidationResult {
   pub fn violation(&mut self, message: impl Into<String>) {
      self.is_compliant = false;
      self.violations.push(message.into());
   }

   pub fn recommend(&mut self, message: impl Into<String>) {
      self.recommendations.push(message.into());
   }
}

/// Static checks on the logon parameters. Never contacts the system.
pub fn validate_connection_params(params: &ConnectionParams) -> ValidationResult {
   let mut result = ValidationResult::default();

   if let Err(Error::Config(ConfigError::InvalidConnection(problems))) =
      params.validate()
   {
      for problem in problems {
         result.violation(problem);
      }
   }

   if params.trace.trim() != "0" {
      result.violation("RFC trace must be disabled in production (trace = 0)");
   }

   if !params.password.expose().starts_with('!') {
      tracing::warn!("password supplied in clear text; prefer the GOSSCAN_PASSWORD variable");
   }

   if let Ok(sysnr) = params.sysnr.trim().parse::<u8>()
      && sysnr < 10
   {
      result.recommend(format!(
         "System number {:0>2} is a low instance number; confirm the target is not a production \
          central instance",
         params.sysnr.trim()
      ));
   }

   if !params.https {
      result.recommend("Use --https so credentials are not sent over plain HTTP");
   }

   result
}

/// Probes dictionary and read access on every GOS table without reading rows.
///
/// Only connection failures abort; every other failure becomes a violation.
pub async fn check_authorization<T: RfcTransport>(
   connector: &mut SapConnector<T>,
) -> Result<ValidationResult> {
   let mut result = ValidationResult::default();

   for table in tables::GOS_TABLES {
      match connector.field_info(table).await {
         Ok(dictionary) => {
            tracing::info!("DDIF_FIELDINFO_GET authorized for {table}");
            let planned = tables::SCAN_QUERIES
               .iter()
               .filter(|q| q.table == *table)
               .flat_map(|q| q.fields.iter());
            for field in planned {
               if let Some(dict) = dictionary.iter().find(|f| f.name == *field)
                  && tables::is_binary_type(&dict.datatype)
               {
                  result.violation(format!(
                     "{table}-{field} is a binary column ({}) and must not be read",
                     dict.datatype
                  ));
               }
            }
         },
         Err(err @ Error::Connection(_)) => return Err(err),
         Err(err) => result.violation(format!("No dictionary access to {table}: {err}")),
      }
   }

   for query in tables::SCAN_QUERIES {
      match connector.probe_read_access(query.table, query.fields).await {
         Ok(()) => tracing::info!("RFC_READ_TABLE authorized for {}", query.table),
         Err(err @ Error::Connection(_)) => return Err(err),
         Err(err) => result.violation(format!("No read access to {}: {err}", query.table)),
      }
   }

   if !result.is_compliant {
      result.recommend("Request S_TABU_NAM display authorization for SRGBTBREL, SOFFPHIO, SOFFCONT1");
   }
   Ok(result)
}

/// Every issued function module must be on the read-only allow list.
pub fn validate_read_only_compliance<'a>(
   functions: impl IntoIterator<Item = &'a str>,
) -> ValidationResult {
   let mut result = ValidationResult::default();
   for function in functions {
      if !ALLOWED_FUNCTIONS.contains(&function) {
         result.violation(format!("Function module {function} is not read-only"));
      }
   }
   result
}

/// Combined outcome of `validate-connection`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
   pub parameters:    ValidationResult,
   pub authorization: ValidationResult,
   pub read_only:     ValidationResult,
}

impl ConnectionReport {
   pub const fn is_compliant(&self) -> bool {
      self.parameters.is_compliant && self.authorization.is_compliant && self.read_only.is_compliant
   }

   pub fn violation_count(&self) -> usize {
      self.parameters.violations.len()
         + self.authorization.violations.len()
         + self.read_only.violations.len()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::rfc::{MemorySystem, Password, memory::MemoryField};

   fn params() -> ConnectionParams {
      let mut p = ConnectionParams::new("sap.example", "00", "100", "AUDITOR", Password::new("pw"));
      p.https = true;
      p
   }

   fn system() -> MemorySystem {
      MemorySystem::new()
         .with_user("AUDITOR", "pw")
         .with_table("SRGBTBREL", vec![
            MemoryField::new("BRELGUID", "CHAR", 32),
            MemoryField::new("RELTYPE", "CHAR", 4),
            MemoryField::new("INSTID_A", "CHAR", 70),
            MemoryField::new("TYPEID_A", "CHAR", 32),
            MemoryField::new("INSTID_B", "CHAR", 70),
            MemoryField::new("TYPEID_B", "CHAR", 32),
         ])
         .with_table("SOFFPHIO", vec![
            MemoryField::new("PHIO_ID", "CHAR", 32),
            MemoryField::new("PH_CLASS", "CHAR", 10),
            MemoryField::new("LOIO_ID", "CHAR", 32),
            MemoryField::new("CREA_TIME", "DEC", 15),
         ])
         .with_table("SOFFCONT1", vec![
            MemoryField::new("PHIO_ID", "CHAR", 32),
            MemoryField::new("CLUSTD", "LRAW", 2550),
         ])
   }

   #[test]
   fn clean_params_are_compliant() {
      let result = validate_connection_params(&params());
      assert!(result.is_compliant);
      assert!(result.recommendations[0].contains("System number 00"));
   }

   #[test]
   fn trace_and_missing_fields_are_violations() {
      let mut p = params();
      p.trace = "2".to_string();
      p.user = String::new();
      let result = validate_connection_params(&p);
      assert!(!result.is_compliant);
      assert!(result.violations.iter().any(|v| v.contains("missing user")));
      assert!(result.violations.iter().any(|v| v.contains("trace")));
   }

   #[test]
   fn read_only_compliance_flags_unknown_functions() {
      assert!(validate_read_only_compliance(["RFC_PING", "RFC_READ_TABLE"]).is_compliant);
      let result = validate_read_only_compliance(["RFC_READ_TABLE", "BAPI_DOCUMENT_DELETE"]);
      assert!(!result.is_compliant);
      assert_eq!(result.violations.len(), 1);
   }

   #[tokio::test]
   async fn authorization_probe_is_compliant_with_full_access() {
      let sys = system();
      let mut connector = SapConnector::new(sys.transport("AUDITOR", &Password::new("pw")), "t");
      connector.connect().await.expect("connect");

      let result = check_authorization(&mut connector).await.expect("probe");
      assert!(result.is_compliant, "{:?}", result.violations);
      assert!(sys.calls_to("RFC_READ_TABLE").iter().all(|c| c.scalar_param("NO_DATA") == Some("X")));
   }

   #[tokio::test]
   async fn restricted_table_is_a_violation() {
      let sys = system().restrict_table("SOFFPHIO");
      let mut connector = SapConnector::new(sys.transport("AUDITOR", &Password::new("pw")), "t");
      connector.connect().await.expect("connect");

      let result = check_authorization(&mut connector).await.expect("probe");
      assert!(!result.is_compliant);
      assert!(result.violations.iter().any(|v| v.contains("SOFFPHIO")));
   }
}

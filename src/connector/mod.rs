//! Read-only SAP session: logon check, paginated table reads, metadata.

pub mod options;
pub mod width;

use std::collections::BTreeSet;

pub use options::{MAX_OPTION_LENGTH, wrap_options};
pub use width::{DictField, MAX_LINE_WIDTH};

use crate::{
   error::{Error, Result, RfcError},
   rfc::{RfcCall, RfcResponse, RfcRow, RfcTransport, row},
   tables,
};

/// Function modules the connector is allowed to call. None of them writes.
pub const ALLOWED_FUNCTIONS: &[&str] =
   &["RFC_PING", "RFC_READ_TABLE", "DDIF_FIELDINFO_GET", "EM_GET_NUMBER_OF_ENTRIES"];

/// Column delimiter requested from `RFC_READ_TABLE`.
pub const DELIMITER: &str = "|";

pub fn ensure_read_only(function: &str) -> Result<()> {
   if ALLOWED_FUNCTIONS.contains(&function) {
      Ok(())
   } else {
      Err(Error::ReadOnlyViolation(function.to_string()))
   }
}

/// One paginated `RFC_READ_TABLE` read.
#[derive(Debug, Clone)]
pub struct ReadRequest<'a> {
   pub table:        &'a str,
   pub fields:       &'a [&'a str],
   pub where_clause: Option<String>,
   pub batch_size:   usize,
   pub max_rows:     Option<u64>,
}

impl ReadRequest<'static> {
   pub const fn new(query: tables::TableQuery, batch_size: usize) -> Self {
      Self {
         table: query.table,
         fields: query.fields,
         where_clause: None,
         batch_size,
         max_rows: None,
      }
   }
}

impl ReadRequest<'_> {
   pub fn filter(mut self, clause: impl Into<String>) -> Self {
      let clause = clause.into();
      self.where_clause = if clause.trim().is_empty() { None } else { Some(clause) };
      self
   }

   pub const fn max_rows(mut self, cap: Option<u64>) -> Self {
      self.max_rows = cap;
      self
   }
}

/// Session against one SAP system, used by a single caller.
pub struct SapConnector<T: RfcTransport> {
   transport: T,
   system:    String,
   connected: bool,
   closed:    bool,
   issued:    BTreeSet<String>,
}

impl<T: RfcTransport> SapConnector<T> {
   /// `system` only labels log lines (typically `host/client`).
   pub fn new(transport: T, system: impl Into<String>) -> Self {
      Self {
         transport,
         system: system.into(),
         connected: false,
         closed: false,
         issued: BTreeSet::new(),
      }
   }

   pub const fn is_connected(&self) -> bool {
      self.connected && !self.closed
   }

   /// Function modules issued so far, sorted.
   pub fn issued_functions(&self) -> impl Iterator<Item = &str> {
      self.issued.iter().map(String::as_str)
   }

   /// Opens the session by pinging the system with the logon data.
   pub async fn connect(&mut self) -> Result<()> {
      if self.closed {
         return Err(Error::Connection(RfcError::Closed));
      }
      ensure_read_only("RFC_PING")?;
      self.issued.insert("RFC_PING".to_string());
      match self.transport.invoke(&RfcCall::new("RFC_PING")).await {
         Ok(_) => {
            self.connected = true;
            tracing::info!("connected to SAP: {}", self.system);
            Ok(())
         },
         Err(err @ (RfcError::Logon(_) | RfcError::NotAuthorized { .. })) => {
            tracing::error!("SAP logon failed: {err}");
            Err(Error::Authorization(err))
         },
         Err(err) => {
            tracing::error!("SAP communication error: {err}");
            Err(Error::Connection(err))
         },
      }
   }

   /// Closes the session. Further calls fail; closing twice is a no-op.
   pub async fn disconnect(&mut self) -> Result<()> {
      if self.closed {
         return Ok(());
      }
      self.closed = true;
      self.connected = false;
      self
         .transport
         .close()
         .await
         .map_err(Error::Connection)?;
      tracing::info!("SAP connection closed");
      Ok(())
   }

   async fn invoke(&mut self, call: &RfcCall, table: &str) -> Result<RfcResponse> {
      ensure_read_only(&call.function)?;
      if self.closed {
         return Err(Error::Connection(RfcError::Closed));
      }
      if !self.connected {
         self.connect().await?;
      }
      self.issued.insert(call.function.clone());
      tracing::trace!(function = %call.function, table, "rfc call");
      self
         .transport
         .invoke(call)
         .await
         .map_err(|e| Error::from_query(table, e))
   }

   /// Reads the dictionary description of `table`.
   pub async fn field_info(&mut self, table: &str) -> Result<Vec<DictField>> {
      let call = RfcCall::new("DDIF_FIELDINFO_GET")
         .scalar("TABNAME", table)
         .table("DFIES_TAB", Vec::new());
      let response = self.invoke(&call, table).await?;
      Ok(response
         .table("DFIES_TAB")
         .iter()
         .map(|r| DictField {
            name:     r.get("FIELDNAME").map(|v| v.trim().to_string()).unwrap_or_default(),
            datatype: r.get("DATATYPE").map(|v| v.trim().to_string()).unwrap_or_default(),
            length:   r
               .get("LENG")
               .and_then(|v| v.trim().parse().ok())
               .unwrap_or(0),
         })
         .collect())
   }

   /// Refuses content columns and checks the output line width.
   ///
   /// Name-based refusal happens before any call. When dictionary data is
   /// unavailable the width check is skipped with a warning.
   pub async fn validate_fields(&mut self, table: &str, fields: &[&str]) -> Result<usize> {
      if let Some(field) = fields.iter().find(|f| tables::is_binary_column(f)) {
         return Err(Error::ForbiddenField { table: table.to_string(), field: (*field).to_string() });
      }

      let dictionary = match self.field_info(table).await {
         Ok(dictionary) => dictionary,
         Err(err @ (Error::Connection(_) | Error::ReadOnlyViolation(_))) => return Err(err),
         Err(err) if !self.connected => return Err(err),
         Err(err) => {
            tracing::warn!("could not validate field width for {table}: {err}; proceeding");
            return Ok(0);
         },
      };

      for name in fields {
         if let Some(dict) = dictionary.iter().find(|f| f.name == *name)
            && tables::is_binary_type(&dict.datatype)
         {
            return Err(Error::ForbiddenField {
               table: table.to_string(),
               field: (*name).to_string(),
            });
         }
      }

      let total = width::line_width(&dictionary, fields, DELIMITER.len());
      tracing::debug!("calculated width for {table}: {total} bytes");
      if total > MAX_LINE_WIDTH {
         return Err(Error::WidthExceeded {
            table:  table.to_string(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            width:  total,
            limit:  MAX_LINE_WIDTH,
         });
      }
      Ok(total)
   }

   fn read_call(
      table: &str,
      fields: &[&str],
      options: &[String],
      skip: u64,
      count: u64,
   ) -> RfcCall {
      RfcCall::new("RFC_READ_TABLE")
         .scalar("QUERY_TABLE", table)
         .scalar("DELIMITER", DELIMITER)
         .scalar("ROWSKIPS", skip.to_string())
         .scalar("ROWCOUNT", count.to_string())
         .table("FIELDS", fields.iter().map(|f| row([("FIELDNAME", *f)])).collect())
         .table("OPTIONS", options.iter().map(|t| row([("TEXT", t.as_str())])).collect())
         .table("DATA", Vec::new())
   }

   /// Reads `request` in batches, handing each decoded batch to `on_batch`.
   ///
   /// Stops on an empty or short batch, or once `max_rows` rows were
   /// delivered. Returns the number of rows delivered.
   pub async fn read_table(
      &mut self,
      request: &ReadRequest<'_>,
      on_batch: &mut (dyn FnMut(&[RfcRow]) + Send),
   ) -> Result<u64> {
      self.validate_fields(request.table, request.fields).await?;
      let options = match &request.where_clause {
         Some(clause) => wrap_options(clause)?,
         None => Vec::new(),
      };
      let batch_size = request.batch_size.max(1) as u64;

      let mut skip = 0u64;
      let mut total = 0u64;
      loop {
         let mut count = batch_size;
         if let Some(cap) = request.max_rows {
            let remaining = cap.saturating_sub(total);
            if remaining == 0 {
               tracing::info!("reached max_rows limit of {cap} on {}", request.table);
               break;
            }
            count = count.min(remaining);
         }

         tracing::debug!("fetching {} rows {skip}..{}", request.table, skip + count);
         let call = Self::read_call(request.table, request.fields, &options, skip, count);
         let response = self.invoke(&call, request.table).await?;
         let rows = decode_rows(&response, request.fields, DELIMITER);
         if rows.is_empty() {
            break;
         }

         on_batch(&rows);
         let fetched = rows.len() as u64;
         total += fetched;
         skip += fetched;
         if fetched < count {
            break;
         }
      }

      tracing::info!("read {total} rows from {}", request.table);
      Ok(total)
   }

   /// Checks that `RFC_READ_TABLE` may read `fields` of `table` without
   /// transferring any row (`NO_DATA = 'X'`).
   pub async fn probe_read_access(&mut self, table: &str, fields: &[&str]) -> Result<()> {
      if let Some(field) = fields.iter().find(|f| tables::is_binary_column(f)) {
         return Err(Error::ForbiddenField { table: table.to_string(), field: (*field).to_string() });
      }
      let call = Self::read_call(table, fields, &[], 0, 1).scalar("NO_DATA", "X");
      self.invoke(&call, table).await.map(|_| ())
   }

   /// Row count from the database statistics; `None` when unavailable.
   pub async fn row_count(&mut self, table: &str) -> Option<u64> {
      let call = RfcCall::new("EM_GET_NUMBER_OF_ENTRIES")
         .table("IT_TABLES", vec![row([("TABNAME", table)])]);
      match self.invoke(&call, table).await {
         Ok(response) => {
            let rows = response
               .table("IT_TABLES")
               .first()
               .and_then(|r| r.get("TABROWS"))
               .and_then(|v| v.trim().parse::<u64>().ok());
            if let Some(n) = rows {
               tracing::info!("{table} has {n} rows");
            }
            rows
         },
         Err(err) => {
            tracing::warn!("could not get row count for {table}: {err}");
            None
         },
      }
   }
}

/// Splits `DATA-WA` lines into named values.
///
/// Uses `FIELDS-OFFSET/LENGTH` when the server returned a usable layout for
/// every requested field, else splits on the delimiter. Values are trimmed.
pub fn decode_rows(response: &RfcResponse, fields: &[&str], delimiter: &str) -> Vec<RfcRow> {
   let layout: Option<Vec<(usize, usize)>> = fields
      .iter()
      .map(|name| {
         let meta = response
            .table("FIELDS")
            .iter()
            .find(|f| f.get("FIELDNAME").map(|v| v.trim()) == Some(*name))?;
         let offset: usize = meta.get("OFFSET")?.trim().parse().ok()?;
         let length: usize = meta.get("LENGTH")?.trim().parse().ok()?;
         Some((offset, offset.checked_add(length)?))
      })
      .collect();

   response
      .table("DATA")
      .iter()
      .map(|line| {
         let wa = line.get("WA").map_or("", String::as_str);
         let values: Vec<String> = match &layout {
            Some(layout) => {
               let chars: Vec<char> = wa.chars().collect();
               layout
                  .iter()
                  .map(|&(offset, end)| {
                     let start = offset.min(chars.len());
                     let end = end.min(chars.len());
                     chars[start..end].iter().collect::<String>().trim().to_string()
                  })
                  .collect()
            },
            None => wa.split(delimiter).map(|v| v.trim().to_string()).collect(),
         };
         fields
            .iter()
            .enumerate()
            .map(|(i, name)| ((*name).to_string(), values.get(i).cloned().unwrap_or_default()))
            .collect()
      })
      .collect()
}

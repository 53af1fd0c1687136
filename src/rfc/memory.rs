//! Deterministic in-memory SAP system for tests and tooling.
//!
//! Serves the handful of function modules the scan uses against tables held
//! in memory and records every call it receives.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

use super::{Password, RfcCall, RfcResponse, RfcRow, RfcTransport, row};
use crate::error::RfcError;

/// Dictionary entry of an in-memory table column.
#[derive(Debug, Clone)]
pub struct MemoryField {
   pub name:     String,
   pub datatype: String,
   pub length:   usize,
}

impl MemoryField {
   pub fn new(name: &str, datatype: &str, length: usize) -> Self {
      Self { name: name.to_string(), datatype: datatype.to_string(), length }
   }
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
   fields: Vec<MemoryField>,
   rows:   Vec<RfcRow>,
}

/// A call received by a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
   pub user: String,
   pub call: RfcCall,
}

#[derive(Default)]
struct State {
   users:      BTreeMap<String, String>,
   tables:     BTreeMap<String, MemoryTable>,
   restricted: Vec<String>,
   failing:    Vec<String>,
   calls:      Vec<RecordedCall>,
   closed:     usize,
}

/// In-memory SAP system shared by any number of transports.
#[derive(Clone, Default)]
pub struct MemorySystem {
   state: Arc<Mutex<State>>,
}

impl MemorySystem {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn with_user(self, user: &str, password: &str) -> Self {
      self
         .state
         .lock()
         .users
         .insert(user.to_string(), password.to_string());
      self
   }

   pub fn with_table(self, name: &str, fields: Vec<MemoryField>) -> Self {
      self
         .state
         .lock()
         .tables
         .insert(name.to_string(), MemoryTable { fields, rows: Vec::new() });
      self
   }

   /// Makes every function module raise `NOT_AUTHORIZED` for this table.
   pub fn restrict_table(self, name: &str) -> Self {
      self.state.lock().restricted.push(name.to_string());
      self
   }

   /// Makes `function` raise `SYSTEM_FAILURE` for every caller.
   pub fn fail_function(self, function: &str) -> Self {
      self.state.lock().failing.push(function.to_string());
      self
   }

   pub fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = RfcRow>) {
      let mut state = self.state.lock();
      let entry = state.tables.entry(table.to_string()).or_default();
      entry.rows.extend(rows);
   }

   /// Opens a transport that authenticates as `user`.
   pub fn transport(&self, user: &str, password: &Password) -> MemoryTransport {
      MemoryTransport {
         system:   self.clone(),
         user:     user.to_string(),
         password: password.expose().to_string(),
      }
   }

   pub fn calls(&self) -> Vec<RecordedCall> {
      self.state.lock().calls.clone()
   }

   pub fn calls_to(&self, function: &str) -> Vec<RfcCall> {
      self
         .state
         .lock()
         .calls
         .iter()
         .filter(|c| c.call.function == function)
         .map(|c| c.call.clone())
         .collect()
   }

   pub fn close_count(&self) -> usize {
      self.state.lock().closed
   }
}

pub struct MemoryTransport {
   system:   MemorySystem,
   user:     String,
   password: String,
}

#[async_trait::async_trait]
impl RfcTransport for MemoryTransport {
   async fn invoke(&self, call: &RfcCall) -> Result<RfcResponse, RfcError> {
      let mut state = self.system.state.lock();
      state
         .calls
         .push(RecordedCall { user: self.user.clone(), call: call.clone() });

      if state.users.get(&self.user) != Some(&self.password) {
         return Err(RfcError::Logon(format!("user {} rejected", self.user)));
      }
      if state.failing.contains(&call.function) {
         return Err(RfcError::Exception {
            function:  call.function.clone(),
            exception: "SYSTEM_FAILURE".to_string(),
            message:   "function module aborted".to_string(),
         });
      }

      match call.function.as_str() {
         "RFC_PING" => Ok(RfcResponse::default()),
         "DDIF_FIELDINFO_GET" => field_info(&state, call),
         "EM_GET_NUMBER_OF_ENTRIES" => number_of_entries(&state, call),
         "RFC_READ_TABLE" => read_table(&state, call),
         other => Err(RfcError::Exception {
            function:  other.to_string(),
            exception: "FU_NOT_FOUND".to_string(),
            message:   "function module not available".to_string(),
         }),
      }
   }

   async fn close(&self) -> Result<(), RfcError> {
      self.system.state.lock().closed += 1;
      Ok(())
   }
}

fn lookup<'a>(state: &'a State, function: &str, table: &str) -> Result<&'a MemoryTable, RfcError> {
   if state.restricted.iter().any(|t| t == table) {
      return Err(RfcError::NotAuthorized {
         function: function.to_string(),
         message:  format!("no display authorization for {table}"),
      });
   }
   state.tables.get(table).ok_or_else(|| RfcError::Exception {
      function:  function.to_string(),
      exception: "TABLE_NOT_AVAILABLE".to_string(),
      message:   format!("table {table} does not exist"),
   })
}

fn field_info(state: &State, call: &RfcCall) -> Result<RfcResponse, RfcError> {
   let name = call.scalar_param("TABNAME").unwrap_or_default();
   let table = lookup(state, &call.function, name)?;
   let rows = table
      .fields
      .iter()
      .map(|f| {
         row([
            ("FIELDNAME", f.name.as_str()),
            ("DATATYPE", f.datatype.as_str()),
            ("LENG", f.length.to_string().as_str()),
         ])
      })
      .collect();
   let mut out = RfcResponse::default();
   out.tables.insert("DFIES_TAB".to_string(), rows);
   Ok(out)
}

fn number_of_entries(state: &State, call: &RfcCall) -> Result<RfcResponse, RfcError> {
   let mut rows = Vec::new();
   for requested in call.table_param("IT_TABLES") {
      let name = requested.get("TABNAME").map_or("", String::as_str);
      let table = lookup(state, &call.function, name)?;
      rows.push(row([("TABNAME", name), ("TABROWS", table.rows.len().to_string().as_str())]));
   }
   let mut out = RfcResponse::default();
   out.tables.insert("IT_TABLES".to_string(), rows);
   Ok(out)
}

fn read_table(state: &State, call: &RfcCall) -> Result<RfcResponse, RfcError> {
   let name = call.scalar_param("QUERY_TABLE").unwrap_or_default();
   let table = lookup(state, &call.function, name)?;
   let delimiter = call.scalar_param("DELIMITER").unwrap_or_default();
   let skip: usize = call
      .scalar_param("ROWSKIPS")
      .and_then(|v| v.parse().ok())
      .unwrap_or(0);
   let count: usize = call
      .scalar_param("ROWCOUNT")
      .and_then(|v| v.parse().ok())
      .filter(|&n| n > 0)
      .unwrap_or(usize::MAX);
   let no_data = call.scalar_param("NO_DATA") == Some("X");

   let mut fields: Vec<&MemoryField> = Vec::new();
   for requested in call.table_param("FIELDS") {
      let fname = requested.get("FIELDNAME").map_or("", String::as_str);
      let Some(field) = table.fields.iter().find(|f| f.name == fname) else {
         return Err(RfcError::Exception {
            function:  call.function.clone(),
            exception: "FIELD_NOT_VALID".to_string(),
            message:   format!("{name}-{fname} unknown"),
         });
      };
      fields.push(field);
   }
   if fields.is_empty() {
      fields = table.fields.iter().collect();
   }

   let where_clause: String = call
      .table_param("OPTIONS")
      .iter()
      .filter_map(|r| r.get("TEXT"))
      .map(String::as_str)
      .collect::<Vec<_>>()
      .join(" ");
   let predicate = Predicate::parse(&where_clause).map_err(|message| RfcError::Exception {
      function: call.function.clone(),
      exception: "OPTION_NOT_VALID".to_string(),
      message,
   })?;

   let mut field_rows = Vec::new();
   let mut offset = 0usize;
   for f in &fields {
      field_rows.push(row([
         ("FIELDNAME", f.name.as_str()),
         ("OFFSET", offset.to_string().as_str()),
         ("LENGTH", f.length.to_string().as_str()),
         ("TYPE", "C"),
      ]));
      offset += f.length + delimiter.chars().count();
   }

   let data = if no_data {
      Vec::new()
   } else {
      table
         .rows
         .iter()
         .filter(|r| predicate.matches(r))
         .skip(skip)
         .take(count)
         .map(|r| {
            let wa = fields
               .iter()
               .map(|f| {
                  let value = r.get(&f.name).map_or("", String::as_str);
                  format!("{value:<width$}", width = f.length)
               })
               .collect::<Vec<_>>()
               .join(delimiter);
            row([("WA", wa.as_str())])
         })
         .collect()
   };

   let mut out = RfcResponse::default();
   out.tables.insert("FIELDS".to_string(), field_rows);
   out.tables.insert("DATA".to_string(), data);
   Ok(out)
}

/// Conjunction of `FIELD = 'x'` and `FIELD IN ( 'a' , 'b' )` terms.
#[derive(Debug, Default)]
struct Predicate {
   terms: Vec<(String, Vec<String>)>,
}

impl Predicate {
   fn parse(clause: &str) -> Result<Self, String> {
      let tokens = tokenize(clause);
      let mut terms = Vec::new();
      let mut i = 0;
      while i < tokens.len() {
         let field = tokens[i].clone();
         let op = tokens
            .get(i + 1)
            .ok_or_else(|| format!("dangling term {field}"))?;
         if op == "=" {
            let lit = tokens
               .get(i + 2)
               .ok_or_else(|| format!("missing literal after {field} ="))?;
            terms.push((field, vec![unquote(lit)]));
            i += 3;
         } else if op.eq_ignore_ascii_case("IN") {
            let mut values = Vec::new();
            i += 2;
            if tokens.get(i).map(String::as_str) != Some("(") {
               return Err(format!("expected ( after {field} IN"));
            }
            i += 1;
            while let Some(tok) = tokens.get(i) {
               i += 1;
               match tok.as_str() {
                  ")" => break,
                  "," => {},
                  lit => values.push(unquote(lit)),
               }
            }
            terms.push((field, values));
         } else {
            return Err(format!("unsupported operator {op}"));
         }
         if tokens
            .get(i)
            .is_some_and(|t| t.eq_ignore_ascii_case("AND"))
         {
            i += 1;
         }
      }
      Ok(Self { terms })
   }

   fn matches(&self, row: &RfcRow) -> bool {
      self.terms.iter().all(|(field, values)| {
         let value = row.get(field).map_or("", |v| v.trim());
         values.iter().any(|v| v == value)
      })
   }
}

fn tokenize(clause: &str) -> Vec<String> {
   let mut tokens = Vec::new();
   let mut current = String::new();
   let mut in_quote = false;
   let mut chars = clause.chars().peekable();
   while let Some(ch) = chars.next() {
      if in_quote {
         current.push(ch);
         if ch == '\'' {
            if chars.peek() == Some(&'\'') {
               current.push('\'');
               chars.next();
            } else {
               in_quote = false;
            }
         }
         continue;
      }
      match ch {
         '\'' => {
            current.push(ch);
            in_quote = true;
         },
         '(' | ')' | ',' => {
            if !current.is_empty() {
               tokens.push(std::mem::take(&mut current));
            }
            tokens.push(ch.to_string());
         },
         c if c.is_whitespace() => {
            if !current.is_empty() {
               tokens.push(std::mem::take(&mut current));
            }
         },
         c => current.push(c),
      }
   }
   if !current.is_empty() {
      tokens.push(current);
   }
   tokens
}

fn unquote(lit: &str) -> String {
   lit.strip_prefix('\'')
      .and_then(|s| s.strip_suffix('\''))
      .unwrap_or(lit)
      .replace("''", "'")
}

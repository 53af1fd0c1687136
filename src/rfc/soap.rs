//! RFC over HTTP using the SAP `/sap/bc/soap/rfc` ICF service.
//!
//! Every function module is exposed as `urn:sap-com:document:sap:rfc:functions`.
//! Requests are plain SOAP 1.1 envelopes with one element per parameter;
//! table parameters are lists of `<item>` elements. Responses come back as
//! `<FUNCTION.Response>`; failures as a SOAP fault whose detail names the
//! ABAP exception.

use std::collections::BTreeMap;

use quick_xml::{Reader, events::Event};
use reqwest::{StatusCode, header};

use super::{ConnectionParams, RfcCall, RfcParam, RfcResponse, RfcRow, RfcTransport};
use crate::error::{ConfigError, Result, RfcError};

const SOAP_ACTION: &str = "urn:sap-com:document:sap:rfc:functions";
const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Exceptions that SAP raises for authorization checks.
const AUTH_EXCEPTIONS: &[&str] = &["NOT_AUTHORIZED", "NO_AUTHORITY", "NO_AUTHORIZATION"];

pub struct SoapTransport {
   client:   reqwest::Client,
   endpoint: String,
   user:     String,
   password: super::Password,
}

impl SoapTransport {
   pub fn new(params: &ConnectionParams) -> Result<Self> {
      let client = reqwest::Client::builder()
         .timeout(params.timeout)
         .connect_timeout(params.timeout)
         .build()
         .map_err(ConfigError::HttpClient)?;
      Ok(Self {
         client,
         endpoint: params.endpoint(),
         user: params.user.clone(),
         password: params.password.clone(),
      })
   }

   pub fn endpoint(&self) -> &str {
      &self.endpoint
   }
}

#[async_trait::async_trait]
impl RfcTransport for SoapTransport {
   async fn invoke(&self, call: &RfcCall) -> Result<RfcResponse, RfcError> {
      let body = build_envelope(call);
      tracing::debug!(function = %call.function, bytes = body.len(), "sending rfc request");

      let response = self
         .client
         .post(&self.endpoint)
         .basic_auth(&self.user, Some(self.password.expose()))
         .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
         .header("SOAPAction", SOAP_ACTION)
         .body(body)
         .send()
         .await?;

      let status = response.status();
      let text = response.text().await?;

      match status {
         StatusCode::UNAUTHORIZED => {
            return Err(RfcError::Logon("invalid credentials or locked user".to_string()));
         },
         StatusCode::FORBIDDEN => {
            return Err(RfcError::NotAuthorized {
               function: call.function.clone(),
               message:  "HTTP 403 from ICF service".to_string(),
            });
         },
         _ => {},
      }

      if is_fault(&text) {
         return Err(parse_fault(&call.function, &text)?);
      }
      if !status.is_success() {
         return Err(RfcError::HttpStatus(status.as_u16()));
      }

      parse_response(&text)
   }
}

/// Escapes text for element content.
pub fn xml_escape(input: &str) -> String {
   let mut out = String::with_capacity(input.len());
   for ch in input.chars() {
      match ch {
         '&' => out.push_str("&amp;"),
         '<' => out.push_str("&lt;"),
         '>' => out.push_str("&gt;"),
         '"' => out.push_str("&quot;"),
         '\'' => out.push_str("&apos;"),
         _ => out.push(ch),
      }
   }
   out
}

/// Renders the SOAP request envelope for `call`.
pub fn build_envelope(call: &RfcCall) -> String {
   let mut out = String::new();
   out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
   out.push_str(&format!("<SOAP-ENV:Envelope xmlns:SOAP-ENV=\"{ENVELOPE_NS}\">"));
   out.push_str("<SOAP-ENV:Body>");
   out.push_str(&format!("<urn:{} xmlns:urn=\"{SOAP_ACTION}\">", call.function));
   for (name, param) in &call.params {
      match param {
         RfcParam::Scalar(value) => {
            out.push_str(&format!("<{name}>{}</{name}>", xml_escape(value)));
         },
         RfcParam::Table(rows) if rows.is_empty() => {
            out.push_str(&format!("<{name}/>"));
         },
         RfcParam::Table(rows) => {
            out.push_str(&format!("<{name}>"));
            for row in rows {
               out.push_str("<item>");
               for (field, value) in row {
                  out.push_str(&format!("<{field}>{}</{field}>", xml_escape(value)));
               }
               out.push_str("</item>");
            }
            out.push_str(&format!("</{name}>"));
         },
      }
   }
   out.push_str(&format!("</urn:{}>", call.function));
   out.push_str("</SOAP-ENV:Body></SOAP-ENV:Envelope>");
   out
}

fn local_name(raw: &[u8]) -> String {
   String::from_utf8_lossy(raw).into_owned()
}

/// Decodes a `<FUNCTION.Response>` body.
///
/// Direct children of the response element are parameters. A parameter that
/// contains `<item>` children is a table; anything else is a scalar.
pub fn parse_response(xml: &str) -> Result<RfcResponse, RfcError> {
   let mut reader = Reader::from_str(xml);
   let mut out = RfcResponse::default();

   let mut depth = 0usize;
   let mut response_depth: Option<usize> = None;
   let mut param: Option<String> = None;
   let mut param_text = String::new();
   let mut param_rows: Option<Vec<RfcRow>> = None;
   let mut row: Option<RfcRow> = None;
   let mut field: Option<(String, String)> = None;

   loop {
      match reader.read_event()? {
         Event::Start(e) => {
            depth += 1;
            let name = local_name(e.local_name().as_ref());
            match response_depth {
               None if name.ends_with(".Response") => response_depth = Some(depth),
               Some(base) if depth == base + 1 => {
                  param = Some(name);
                  param_text.clear();
                  param_rows = None;
               },
               Some(base) if depth == base + 2 => {
                  param_rows.get_or_insert_with(Vec::new);
                  row = Some(RfcRow::new());
               },
               Some(base) if depth == base + 3 => field = Some((name, String::new())),
               _ => {},
            }
         },
         Event::Empty(e) => {
            let name = local_name(e.local_name().as_ref());
            match response_depth {
               Some(base) if depth == base => {
                  out.scalars.insert(name, String::new());
               },
               Some(base) if depth == base + 1 => {
                  param_rows.get_or_insert_with(Vec::new).push(RfcRow::new());
               },
               Some(base) if depth == base + 2 => {
                  if let Some(r) = row.as_mut() {
                     r.insert(name, String::new());
                  }
               },
               None if name.ends_with(".Response") => return Ok(out),
               _ => {},
            }
         },
         Event::Text(t) => {
            let text = t.unescape()?;
            if let Some((_, value)) = field.as_mut() {
               value.push_str(&text);
            } else if param.is_some() {
               param_text.push_str(&text);
            }
         },
         Event::CData(c) => {
            let raw = c.into_inner();
            let text = String::from_utf8_lossy(&raw);
            if let Some((_, value)) = field.as_mut() {
               value.push_str(&text);
            } else if param.is_some() {
               param_text.push_str(&text);
            }
         },
         Event::End(_) => {
            if let Some(base) = response_depth {
               if depth == base + 3 {
                  if let (Some((name, value)), Some(r)) = (field.take(), row.as_mut()) {
                     r.insert(name, value);
                  }
               } else if depth == base + 2 {
                  if let (Some(r), Some(rows)) = (row.take(), param_rows.as_mut()) {
                     rows.push(r);
                  }
               } else if depth == base + 1 {
                  if let Some(name) = param.take() {
                     match param_rows.take() {
                        Some(rows) => {
                           out.tables.insert(name, rows);
                        },
                        None => {
                           out.scalars.insert(name, param_text.trim().to_string());
                        },
                     }
                  }
               } else if depth == base {
                  return Ok(out);
               }
            }
            depth = depth.saturating_sub(1);
         },
         Event::Eof => break,
         _ => {},
      }
   }

   if response_depth.is_none() {
      return Err(RfcError::Protocol("no response element in SOAP body".to_string()));
   }
   Ok(out)
}

/// True when the first element inside the SOAP `Body` is a `Fault`.
///
/// Unparseable bodies are not faults; the status or the response parser
/// reports them.
pub fn is_fault(xml: &str) -> bool {
   let mut reader = Reader::from_str(xml);
   let mut in_body = false;
   loop {
      match reader.read_event() {
         Ok(Event::Start(e)) => {
            let name = local_name(e.local_name().as_ref());
            if in_body {
               return name == "Fault";
            }
            in_body = name == "Body";
         },
         Ok(Event::Empty(e)) if in_body => return e.local_name().as_ref() == b"Fault",
         Ok(Event::Eof) | Err(_) => return false,
         Ok(_) => {},
      }
   }
}

/// Turns a SOAP fault into the matching [`RfcError`].
pub fn parse_fault(function: &str, xml: &str) -> Result<RfcError, RfcError> {
   let mut reader = Reader::from_str(xml);
   let mut texts: BTreeMap<String, String> = BTreeMap::new();
   let mut current: Option<String> = None;

   loop {
      match reader.read_event()? {
         Event::Start(e) => current = Some(local_name(e.local_name().as_ref())),
         Event::Text(t) => {
            if let Some(name) = &current {
               let text = t.unescape()?;
               let text = text.trim();
               if !text.is_empty() {
                  texts.entry(name.clone()).or_insert_with(|| text.to_string());
               }
            }
         },
         Event::End(_) => current = None,
         Event::Eof => break,
         _ => {},
      }
   }

   let fault_string = texts.get("faultstring").cloned().unwrap_or_default();
   let exception = texts
      .get("Name")
      .cloned()
      .unwrap_or_else(|| fault_string.clone());
   let message = texts
      .get("Message")
      .cloned()
      .unwrap_or_else(|| fault_string.clone());

   if AUTH_EXCEPTIONS.contains(&exception.as_str()) {
      return Ok(RfcError::NotAuthorized { function: function.to_string(), message });
   }
   Ok(RfcError::Exception { function: function.to_string(), exception, message })
}

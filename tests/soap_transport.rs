//! SOAP transport against a local stand-in for the ICF `/sap/bc/soap/rfc`
//! service.

use std::{sync::Arc, time::Duration};

use gosscan::{
   error::RfcError,
   rfc::{
      ConnectionParams, Password, RfcCall, RfcTransport, SoapTransport, row,
      soap::{build_envelope, parse_fault, parse_response},
   },
};
use parking_lot::Mutex;
use tokio::{
   io::{AsyncReadExt, AsyncWriteExt},
   net::TcpListener,
};

const READ_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
  <soap-env:Header/>
  <soap-env:Body>
    <n0:RFC_READ_TABLE.Response xmlns:n0="urn:sap-com:document:sap:rfc:functions">
      <DATA>
        <item><WA>FOL18000000000001|MESSAGE</WA></item>
        <item><WA>FOL18000000000002|R&amp;D</WA></item>
      </DATA>
      <FIELDS>
        <item><FIELDNAME>PHIO_ID</FIELDNAME><OFFSET>000000</OFFSET><LENGTH>000017</LENGTH><TYPE>C</TYPE><FIELDTEXT/></item>
        <item><FIELDNAME>PH_CLASS</FIELDNAME><OFFSET>000018</OFFSET><LENGTH>000010</LENGTH><TYPE>C</TYPE><FIELDTEXT/></item>
      </FIELDS>
      <OPTIONS/>
    </n0:RFC_READ_TABLE.Response>
  </soap-env:Body>
</soap-env:Envelope>"#;

const FAULT_RESPONSE: &str = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
  <soap-env:Body>
    <soap-env:Fault>
      <faultcode>soap-env:Client</faultcode>
      <faultstring>TABLE_NOT_AVAILABLE</faultstring>
      <detail>
        <n0:RFC_READ_TABLE.Exception xmlns:n0="urn:sap-com:document:sap:rfc:functions">
          <Name>TABLE_NOT_AVAILABLE</Name>
          <Text>Table ZNOPE is not available</Text>
        </n0:RFC_READ_TABLE.Exception>
      </detail>
    </soap-env:Fault>
  </soap-env:Body>
</soap-env:Envelope>"#;

const AUTH_FAULT: &str = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
  <soap-env:Body><soap-env:Fault><faultcode>soap-env:Client</faultcode><faultstring>NOT_AUTHORIZED</faultstring>
  <detail><n0:RFC_READ_TABLE.Exception xmlns:n0="urn:sap-com:document:sap:rfc:functions"><Name>NOT_AUTHORIZED</Name></n0:RFC_READ_TABLE.Exception></detail>
  </soap-env:Fault></soap-env:Body></soap-env:Envelope>"#;

const FAULT_TEXT_IN_DATA: &str = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
  <soap-env:Body>
    <n0:RFC_READ_TABLE.Response xmlns:n0="urn:sap-com:document:sap:rfc:functions">
      <DATA><item><WA>SAPFault></WA></item></DATA>
      <FIELDS/>
    </n0:RFC_READ_TABLE.Response>
  </soap-env:Body>
</soap-env:Envelope>"#;

/// Serves one canned reply per connection and records raw requests.
async fn serve(status: &'static str, body: &'static str) -> (u16, Arc<Mutex<Vec<String>>>) {
   let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
   let port = listener.local_addr().expect("addr").port();
   let seen = Arc::new(Mutex::new(Vec::new()));
   let log = Arc::clone(&seen);

   tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
         let mut buf = Vec::new();
         let mut chunk = [0u8; 4096];
         loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
               break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
               let length = text[..end]
                  .lines()
                  .find_map(|l| {
                     let (name, value) = l.split_once(':')?;
                     name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                  })
                  .unwrap_or(0);
               if buf.len() >= end + 4 + length {
                  break;
               }
            }
         }
         log.lock().push(String::from_utf8_lossy(&buf).into_owned());

         let reply = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
         );
         let _ = socket.write_all(reply.as_bytes()).await;
         let _ = socket.shutdown().await;
      }
   });

   (port, seen)
}

fn transport(port: u16) -> SoapTransport {
   let mut params =
      ConnectionParams::new("127.0.0.1", "00", "100", "AUDITOR", Password::new("s3cret"));
   params.port = Some(port);
   params.timeout = Duration::from_secs(5);
   SoapTransport::new(&params).expect("client")
}

fn read_call() -> RfcCall {
   RfcCall::new("RFC_READ_TABLE")
      .scalar("QUERY_TABLE", "SOFFPHIO")
      .scalar("DELIMITER", "|")
      .table("OPTIONS", vec![row([("TEXT", "PH_CLASS = 'R&D'")])])
      .table("DATA", Vec::new())
}

#[tokio::test]
async fn request_carries_auth_client_and_envelope() {
   let (port, seen) = serve("200 OK", READ_RESPONSE).await;
   let response = transport(port).invoke(&read_call()).await.expect("invoke");

   assert_eq!(response.table("DATA").len(), 2);
   assert_eq!(response.table("DATA")[1].get("WA").map(String::as_str), Some("FOL18000000000002|R&D"));
   assert_eq!(response.table("FIELDS")[1].get("OFFSET").map(String::as_str), Some("000018"));
   assert!(response.table("OPTIONS").is_empty());

   let requests = seen.lock();
   let request = &requests[0];
   assert!(request.starts_with("POST /sap/bc/soap/rfc?sap-client=100&sap-language=EN "));
   // AUDITOR:s3cret
   assert!(request.contains("QVVESVRPUjpzM2NyZXQ="));
   assert!(request.contains("<QUERY_TABLE>SOFFPHIO</QUERY_TABLE>"));
   assert!(request.contains("PH_CLASS = &apos;R&amp;D&apos;"));
   assert!(request.contains("<DATA/>"));
}

#[tokio::test]
async fn abap_exception_becomes_an_exception_error() {
   let (port, _) = serve("500 Internal Server Error", FAULT_RESPONSE).await;
   let err = transport(port).invoke(&read_call()).await.expect_err("fault");
   assert!(
      matches!(err, RfcError::Exception { ref exception, .. } if exception == "TABLE_NOT_AVAILABLE"),
      "{err}"
   );
}

#[tokio::test]
async fn fault_like_text_in_data_is_not_a_fault() {
   let (port, _) = serve("200 OK", FAULT_TEXT_IN_DATA).await;
   let response = transport(port).invoke(&read_call()).await.expect("plain response");
   assert_eq!(response.table("DATA")[0].get("WA").map(String::as_str), Some("SAPFault>"));
}

#[tokio::test]
async fn authorization_fault_and_401_map_to_auth_errors() {
   let (port, _) = serve("500 Internal Server Error", AUTH_FAULT).await;
   let err = transport(port).invoke(&read_call()).await.expect_err("fault");
   assert!(matches!(err, RfcError::NotAuthorized { .. }), "{err}");

   let (port, _) = serve("401 Unauthorized", "").await;
   let err = transport(port).invoke(&RfcCall::new("RFC_PING")).await.expect_err("401");
   assert!(matches!(err, RfcError::Logon(_)), "{err}");
}

#[tokio::test]
async fn unreachable_host_is_a_communication_error() {
   let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
   let port = listener.local_addr().expect("addr").port();
   drop(listener);

   let err = transport(port).invoke(&RfcCall::new("RFC_PING")).await.expect_err("refused");
   assert!(matches!(err, RfcError::Communication(_)), "{err}");
}

#[test]
fn envelope_escapes_values_and_names_the_function() {
   let xml = build_envelope(&read_call());
   assert!(xml.contains("<urn:RFC_READ_TABLE xmlns:urn=\"urn:sap-com:document:sap:rfc:functions\">"));
   assert!(xml.contains("<OPTIONS><item><TEXT>PH_CLASS = &apos;R&amp;D&apos;</TEXT></item></OPTIONS>"));
   assert!(xml.ends_with("</urn:RFC_READ_TABLE></SOAP-ENV:Body></SOAP-ENV:Envelope>"));
}

#[test]
fn response_and_fault_parse_without_network() {
   let response = parse_response(READ_RESPONSE).expect("parse");
   assert_eq!(response.table("FIELDS").len(), 2);

   let err = parse_fault("RFC_READ_TABLE", FAULT_RESPONSE).expect("fault");
   assert!(matches!(err, RfcError::Exception { .. }));
   assert!(parse_response("<html>oops</html>").is_err());
}

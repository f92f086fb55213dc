// src/feed/soap.rs
//! LDB staff-version SOAP client for `GetArrivalDepartureBoardByTIPLOC`.
//!
//! The envelope is built by hand and the response is read with a streaming
//! quick-xml reader that matches on local element names only, so the
//! `lt4:`/`lt7:`/... prefixes the service rotates between schema versions
//! never matter.

use async_trait::async_trait;
use html_escape::encode_text;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::config::FeedSettings;
use crate::feed::types::{FeedFetcher, FetchError, RawFeedResult, RawLocation, RawService};

const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const TOKEN_NS: &str = "http://thalesgroup.com/RTTI/2013-11-28/Token/types";
const LDBSV_NS: &str = "http://thalesgroup.com/RTTI/2021-11-01/ldbsv/";
const SOAP_ACTION: &str =
    "http://thalesgroup.com/RTTI/2012-01-13/ldbsv/GetArrivalDepartureBoardByTIPLOC";

pub struct LdbSoapClient {
    endpoint: String,
    token: String,
    client: Client,
}

impl LdbSoapClient {
    pub fn new(settings: &FeedSettings) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            token: settings.token.clone(),
            client,
        })
    }
}

#[async_trait]
impl FeedFetcher for LdbSoapClient {
    async fn fetch(
        &self,
        tiploc: &str,
        window_minutes: u32,
        max_rows: u32,
    ) -> Result<RawFeedResult, FetchError> {
        let time = chrono::Local::now().format("%Y-%m-%dT%H:%M:00").to_string();
        let envelope = build_envelope(&self.token, tiploc, &time, window_minutes, max_rows);

        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(envelope)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        let parsed = parse_board(&body);
        if !status.is_success() {
            // Faults come back as HTTP 500; prefer the fault text when present.
            return match parsed {
                Err(fault @ FetchError::Fault { .. }) => Err(fault),
                _ => Err(FetchError::Status {
                    status: status.as_u16(),
                }),
            };
        }
        parsed
    }

    fn name(&self) -> &'static str {
        "ldb-soap"
    }
}

/// SOAP 1.1 request envelope with the access token header.
pub fn build_envelope(
    token: &str,
    tiploc: &str,
    time: &str,
    window_minutes: u32,
    max_rows: u32,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="{SOAP_ENV_NS}" xmlns:typ="{TOKEN_NS}" xmlns:ldb="{LDBSV_NS}">
  <soap:Header>
    <typ:AccessToken>
      <typ:TokenValue>{token}</typ:TokenValue>
    </typ:AccessToken>
  </soap:Header>
  <soap:Body>
    <ldb:GetArrivalDepartureBoardByTIPLOCRequest>
      <ldb:numRows>{max_rows}</ldb:numRows>
      <ldb:tiploc>{tiploc}</ldb:tiploc>
      <ldb:time>{time}</ldb:time>
      <ldb:timeWindow>{window_minutes}</ldb:timeWindow>
    </ldb:GetArrivalDepartureBoardByTIPLOCRequest>
  </soap:Body>
</soap:Envelope>"#,
        token = encode_text(token),
        tiploc = encode_text(tiploc),
        time = encode_text(time),
    )
}

/// Parse a `GetArrivalDepartureBoardByTIPLOC` response body.
pub fn parse_board(xml: &str) -> Result<RawFeedResult, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = BoardParser::default();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        match event {
            Event::Start(e) => parser.open(local_name(&e)),
            Event::Empty(e) => {
                parser.open(local_name(&e));
                parser.close();
            }
            Event::End(_) => parser.close(),
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| FetchError::Malformed(e.to_string()))?;
                parser.text(text.trim());
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                parser.text(String::from_utf8_lossy(&raw).trim());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    parser.finish()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

#[derive(Default)]
struct FaultText {
    code: String,
    message: String,
}

#[derive(Default)]
struct BoardParser {
    path: Vec<String>,
    board: RawFeedResult,
    saw_board: bool,
    service: Option<RawService>,
    // Only the first location under origin/destination is kept.
    origin_seen: usize,
    destination_seen: usize,
    fault: Option<FaultText>,
}

impl BoardParser {
    fn open(&mut self, name: String) {
        match name.as_str() {
            "GetBoardResult" => self.saw_board = true,
            "Fault" => self.fault = Some(FaultText::default()),
            "service" if self.service.is_none() => {
                self.service = Some(RawService::default());
                self.origin_seen = 0;
                self.destination_seen = 0;
            }
            "location" => match self.path.last().map(String::as_str) {
                Some("origin") => self.origin_seen += 1,
                Some("destination") => self.destination_seen += 1,
                _ => {}
            },
            _ => {}
        }
        self.path.push(name);
    }

    fn close(&mut self) {
        if self.path.pop().as_deref() == Some("service") {
            if let Some(svc) = self.service.take() {
                self.board.services.push(svc);
            }
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let n = self.path.len();
        let Some(field) = self.path.last().map(String::as_str) else {
            return;
        };
        let parent = n.checked_sub(2).map(|i| self.path[i].as_str());

        if let Some(fault) = self.fault.as_mut() {
            match field {
                "faultcode" | "Value" => fault.code = text.to_string(),
                "faultstring" | "Text" => fault.message = text.to_string(),
                _ => {}
            }
            return;
        }

        if let Some(svc) = self.service.as_mut() {
            match parent {
                Some("service") => set_service_field(svc, field, text),
                Some("location") => {
                    let endpoint = n.checked_sub(3).map(|i| self.path[i].as_str());
                    match endpoint {
                        Some("origin") if self.origin_seen == 1 => set_location_field(
                            svc.origin.get_or_insert_with(RawLocation::default),
                            field,
                            text,
                        ),
                        Some("destination") if self.destination_seen == 1 => set_location_field(
                            svc.destination.get_or_insert_with(RawLocation::default),
                            field,
                            text,
                        ),
                        _ => {}
                    }
                }
                _ => {}
            }
            return;
        }

        if parent == Some("GetBoardResult") {
            match field {
                "locationName" => self.board.location_name = Some(text.to_string()),
                "generatedAt" => self.board.generated_at = Some(text.to_string()),
                _ => {}
            }
        }
    }

    fn finish(self) -> Result<RawFeedResult, FetchError> {
        if let Some(open) = self.path.last() {
            return Err(FetchError::Malformed(format!(
                "document ended inside <{open}>"
            )));
        }
        if let Some(fault) = self.fault {
            return Err(FetchError::Fault {
                code: fault.code,
                message: fault.message,
            });
        }
        if !self.saw_board {
            return Err(FetchError::Malformed("response carries no board".into()));
        }
        Ok(self.board)
    }
}

fn set_service_field(svc: &mut RawService, field: &str, text: &str) {
    let value = Some(text.to_string());
    match field {
        "sta" => svc.sta = value,
        "eta" => svc.eta = value,
        "std" => svc.std = value,
        "etd" => svc.etd = value,
        "platform" => svc.platform = value,
        "platformIsHidden" => {
            svc.platform_is_hidden = text.eq_ignore_ascii_case("true") || text == "1"
        }
        "operator" => svc.operator = value,
        "operatorCode" => svc.operator_code = value,
        "trainid" => svc.train_id = value,
        "uid" => svc.uid = value,
        "length" => svc.length = value,
        _ => {}
    }
}

fn set_location_field(loc: &mut RawLocation, field: &str, text: &str) {
    match field {
        "tiploc" => loc.tiploc = Some(text.to_string()),
        "locationName" => loc.location_name = Some(text.to_string()),
        _ => {}
    }
}

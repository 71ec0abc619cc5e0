//! Client for the tour operator aggregation gateway.
//!
//! A search is two XML-enveloped calls against one endpoint: `CreateRequest` returns a
//! request token, and after a fixed delay `GetRequestResult` returns the first page of
//! `XmlTour` fragments.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::debug;

use tourlead_core::config::SearchConfig;

use crate::catalog::{departure_id, find_destination, gateway_meal_code, meal_label, search_window};
use crate::model::{GatewayCredentials, RecordOrigin, SearchCriteria, TourRecord};

const SOAP_NAMESPACE: &str = "urn:SletatRu:Contracts:Soap11Gate:v1";
const PAGE_SIZE: u32 = 10;
const NO_PRICE_CEILING: &str = "99999";
pub const MAX_RECORDS: usize = 5;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned HTTP {0}")]
    Status(u16),
    #[error("gateway fault: {0}")]
    Fault(String),
    #[error("gateway response carried no request token")]
    MissingToken,
    #[error("gateway response is not valid XML: {0}")]
    Xml(String),
    #[error("destination `{0}` has no gateway id")]
    UnmappedDestination(String),
    #[error("gateway returned no tours")]
    Empty,
    #[error("gateway search exceeded {0:?}")]
    Timeout(Duration),
}

impl From<quick_xml::Error> for GatewayError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Xml(error.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct SearchGateway {
    client: reqwest::Client,
    endpoint: String,
    poll_delay: Duration,
    total_timeout: Duration,
    exchange_rate: Decimal,
}

impl SearchGateway {
    pub fn new(config: &SearchConfig) -> Result<Self, GatewayError> {
        let total_timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(total_timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            poll_delay: Duration::from_millis(config.poll_delay_ms),
            total_timeout,
            exchange_rate: Decimal::from(config.exchange_rate),
        })
    }

    /// Runs both phases under one deadline that includes the wait between them.
    pub async fn search(
        &self,
        credentials: &GatewayCredentials,
        criteria: &SearchCriteria,
        today: NaiveDate,
    ) -> Result<Vec<TourRecord>, GatewayError> {
        tokio::time::timeout(self.total_timeout, self.run(credentials, criteria, today))
            .await
            .map_err(|_| GatewayError::Timeout(self.total_timeout))?
    }

    async fn run(
        &self,
        credentials: &GatewayCredentials,
        criteria: &SearchCriteria,
        today: NaiveDate,
    ) -> Result<Vec<TourRecord>, GatewayError> {
        let destination = find_destination(&criteria.destination)
            .ok_or_else(|| GatewayError::UnmappedDestination(criteria.destination.clone()))?;

        let params = self.create_request_params(destination.gateway_id, criteria, today);
        let created = self.call("CreateRequest", credentials, &params).await?;
        let token = parse_request_token(&created)?;
        debug!(
            event_name = "tours.gateway.request_created",
            destination = destination.name,
            "gateway accepted search request"
        );

        tokio::time::sleep(self.poll_delay).await;

        let page = [
            ("requestId", token),
            ("fromPosition", "0".to_string()),
            ("toPosition", PAGE_SIZE.to_string()),
        ];
        let results = self.call("GetRequestResult", credentials, &page).await?;
        let defaults = RecordDefaults {
            meal: meal_label(criteria.meal),
            resort: destination.name.to_string(),
            departure_city: criteria.departure_city.clone(),
            date_begin: search_window(today).0.format("%Y-%m-%d").to_string(),
            nights: criteria.nights,
        };
        let mut records = parse_tours(&results, &defaults, self.exchange_rate)?;
        if records.is_empty() {
            return Err(GatewayError::Empty);
        }
        records.truncate(MAX_RECORDS);
        Ok(records)
    }

    fn create_request_params(
        &self,
        destination_id: u32,
        criteria: &SearchCriteria,
        today: NaiveDate,
    ) -> Vec<(&'static str, String)> {
        let (date_from, date_to) = search_window(today);
        let stars = criteria.stars.map(|stars| stars.to_string()).unwrap_or_default();
        let price_max = criteria
            .budget
            .map(|budget| {
                (Decimal::from(budget) / self.exchange_rate)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .to_string()
            })
            .unwrap_or_else(|| NO_PRICE_CEILING.to_string());

        vec![
            ("countryId", destination_id.to_string()),
            ("departureId", departure_id(&criteria.departure_city).to_string()),
            ("mealId", gateway_meal_code(criteria.meal).to_string()),
            ("starsFrom", stars.clone()),
            ("starsTo", stars),
            ("nightsFrom", criteria.nights.saturating_sub(1).to_string()),
            ("nightsTo", (criteria.nights + 1).to_string()),
            ("adults", criteria.travelers.to_string()),
            ("dateFrom", date_from.format("%Y-%m-%d").to_string()),
            ("dateTo", date_to.format("%Y-%m-%d").to_string()),
            ("priceMax", price_max),
        ]
    }

    async fn call(
        &self,
        method: &str,
        credentials: &GatewayCredentials,
        params: &[(&str, String)],
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("{SOAP_NAMESPACE}/Search/{method}"))
            .body(envelope(method, credentials, params))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if let Some(fault) = parse_fault(&body) {
            return Err(GatewayError::Fault(fault));
        }
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }
        Ok(body)
    }
}

pub(crate) fn envelope(
    method: &str,
    credentials: &GatewayCredentials,
    params: &[(&str, String)],
) -> String {
    let mut fields = String::new();
    let credential_fields = [
        ("login", credentials.login.expose_secret()),
        ("password", credentials.password.expose_secret()),
    ];
    let all = credential_fields
        .iter()
        .map(|(name, value)| (*name, *value))
        .chain(params.iter().map(|(name, value)| (*name, value.as_str())));
    for (name, value) in all {
        fields.push_str(&format!("<{name}>{}</{name}>", escape(value)));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <s:Body><{method} xmlns=\"{SOAP_NAMESPACE}\">{fields}</{method}></s:Body>\
         </s:Envelope>"
    )
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Text of the first element whose local name is one of `names`.
fn first_text(xml: &str, names: &[&str]) -> Result<Option<String>, GatewayError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut inside = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                inside = names.contains(&local_name(element.local_name().as_ref()).as_str());
            }
            Event::Text(text) if inside => {
                let value = text.unescape()?.trim().to_string();
                if !value.is_empty() {
                    return Ok(Some(value));
                }
            }
            Event::CData(data) if inside => {
                let value = String::from_utf8_lossy(&data.into_inner()).trim().to_string();
                if !value.is_empty() {
                    return Ok(Some(value));
                }
            }
            Event::End(_) => inside = false,
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

pub(crate) fn parse_request_token(xml: &str) -> Result<String, GatewayError> {
    first_text(xml, &["RequestId", "CreateRequestResult"])?.ok_or(GatewayError::MissingToken)
}

pub(crate) fn parse_fault(xml: &str) -> Option<String> {
    const UNSPECIFIED: &str = "unspecified fault";
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut in_fault = false;
    let mut in_reason = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = local_name(element.local_name().as_ref());
                in_fault |= name == "Fault";
                in_reason = in_fault && matches!(name.as_str(), "faultstring" | "Text");
            }
            Ok(Event::Empty(element)) if element.local_name().as_ref() == b"Fault" => {
                return Some(UNSPECIFIED.to_string());
            }
            Ok(Event::Text(text)) if in_reason => {
                let reason = text.unescape().map(|value| value.trim().to_string()).unwrap_or_default();
                return Some(if reason.is_empty() { UNSPECIFIED.to_string() } else { reason });
            }
            Ok(Event::End(element)) => {
                if element.local_name().as_ref() == b"Fault" {
                    return Some(UNSPECIFIED.to_string());
                }
                in_reason = false;
            }
            Ok(Event::Eof) | Err(_) => return in_fault.then(|| UNSPECIFIED.to_string()),
            _ => {}
        }
    }
}

pub(crate) struct RecordDefaults {
    pub meal: String,
    pub resort: String,
    pub departure_city: String,
    pub date_begin: String,
    pub nights: u32,
}

pub(crate) fn parse_tours(
    xml: &str,
    defaults: &RecordDefaults,
    exchange_rate: Decimal,
) -> Result<Vec<TourRecord>, GatewayError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut fields: Option<HashMap<String, String>> = None;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = local_name(element.local_name().as_ref());
                if name == "XmlTour" {
                    fields = Some(HashMap::new());
                } else if fields.is_some() {
                    current = Some(name);
                }
            }
            Event::Text(text) => {
                if let (Some(fields), Some(name)) = (fields.as_mut(), current.as_ref()) {
                    fields.insert(name.clone(), text.unescape()?.trim().to_string());
                }
            }
            Event::CData(data) => {
                if let (Some(fields), Some(name)) = (fields.as_mut(), current.as_ref()) {
                    let value = String::from_utf8_lossy(&data.into_inner()).trim().to_string();
                    fields.insert(name.clone(), value);
                }
            }
            Event::End(element) => {
                if element.local_name().as_ref() == b"XmlTour" {
                    if let Some(fields) = fields.take() {
                        records.push(record_from_fields(&fields, defaults, exchange_rate));
                    }
                }
                current = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

fn record_from_fields(
    fields: &HashMap<String, String>,
    defaults: &RecordDefaults,
    exchange_rate: Decimal,
) -> TourRecord {
    let text = |name: &str, fallback: &str| {
        fields
            .get(name)
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };
    let stars = fields
        .get("Stars")
        .and_then(|raw| {
            raw.chars().take_while(char::is_ascii_digit).collect::<String>().parse::<u8>().ok()
        })
        .unwrap_or(5);
    let price = fields
        .get("Price")
        .and_then(|raw| raw.replace(',', ".").parse::<Decimal>().ok())
        .unwrap_or(Decimal::ZERO);
    let nights = fields.get("Nights").and_then(|raw| raw.parse().ok()).unwrap_or(defaults.nights);

    TourRecord {
        hotel_name: text("HotelName", "Hotel"),
        stars,
        operator: text("PartnerName", "Tour operator"),
        price,
        price_local: price * exchange_rate,
        nights,
        meal: text("MealName", &defaults.meal),
        resort: text("ResortName", &defaults.resort),
        departure_city: text("DepartCityName", &defaults.departure_city),
        date_begin: text("DateBegin", &defaults.date_begin),
        room_type: text("RoomName", "Standard"),
        tour_id: fields.get("TourId").filter(|value| !value.is_empty()).cloned(),
        origin: RecordOrigin::Gateway,
    }
}

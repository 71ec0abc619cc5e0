use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tourlead_core::config::SearchConfig;
use tourlead_core::domain::slots::MealPlan;
use tourlead_tours::{
    GatewayCredentials, GatewayError, RecordOrigin, SearchCriteria, SearchGateway,
    TourSearchAdapter,
};

const CREATE_ACTION: &str = "urn:SletatRu:Contracts:Soap11Gate:v1/Search/CreateRequest";
const RESULT_ACTION: &str = "urn:SletatRu:Contracts:Soap11Gate:v1/Search/GetRequestResult";

const CREATED: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <CreateRequestResponse xmlns="urn:SletatRu:Contracts:Soap11Gate:v1">
      <CreateRequestResult><RequestId>REQ-7</RequestId></CreateRequestResult>
    </CreateRequestResponse>
  </s:Body>
</s:Envelope>"#;

const RESULTS: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <GetRequestResultResponse xmlns="urn:SletatRu:Contracts:Soap11Gate:v1">
      <GetRequestResultResult>
        <Rows>
          <XmlTour>
            <HotelName>Gloria Serenity Resort</HotelName><Stars>5</Stars>
            <PartnerName>Anex Tour</PartnerName><Price>1020</Price><Nights>7</Nights>
            <MealName>All inclusive</MealName><ResortName>Belek</ResortName>
            <DepartCityName>Moscow</DepartCityName><DateBegin>2026-03-18</DateBegin>
            <RoomName>Superior Land View</RoomName><TourId>88123</TourId>
          </XmlTour>
          <XmlTour>
            <HotelName><![CDATA[Barut Hemera & Spa]]></HotelName><Stars>5</Stars>
            <PartnerName>Coral Travel</PartnerName><Price>980</Price><Nights>8</Nights>
          </XmlTour>
        </Rows>
      </GetRequestResultResult>
    </GetRequestResultResponse>
  </s:Body>
</s:Envelope>"#;

fn config(endpoint: String) -> SearchConfig {
    SearchConfig {
        endpoint,
        poll_delay_ms: 10,
        timeout_secs: 5,
        exchange_rate: 90,
        default_departure: "Moscow".to_string(),
        default_nights: 7,
        default_travelers: 2,
    }
}

fn credentials() -> GatewayCredentials {
    GatewayCredentials {
        login: SecretString::from("agency-login".to_string()),
        password: SecretString::from("agency-password".to_string()),
    }
}

fn criteria() -> SearchCriteria {
    SearchCriteria {
        credentials: Some(credentials()),
        destination: "Turkey".to_string(),
        meal: Some(MealPlan::Ai),
        stars: Some(5),
        nights: 7,
        travelers: 2,
        budget: Some(100_000),
        departure_city: "Moscow".to_string(),
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).expect("date")
}

#[tokio::test]
async fn live_search_submits_then_fetches_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", CREATE_ACTION))
        .and(body_string_contains("<countryId>1</countryId>"))
        .and(body_string_contains("<mealId>All</mealId>"))
        .and(body_string_contains("<nightsFrom>6</nightsFrom>"))
        .and(body_string_contains("<nightsTo>8</nightsTo>"))
        .and(body_string_contains("<dateFrom>2026-03-15</dateFrom>"))
        .and(body_string_contains("<dateTo>2026-04-30</dateTo>"))
        .and(body_string_contains("<priceMax>1111</priceMax>"))
        .and(body_string_contains("<login>agency-login</login>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CREATED))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", RESULT_ACTION))
        .and(body_string_contains("<requestId>REQ-7</requestId>"))
        .and(body_string_contains("<toPosition>10</toPosition>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = SearchGateway::new(&config(server.uri())).expect("gateway");
    let records = gateway.search(&credentials(), &criteria(), today()).await.expect("search");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].hotel_name, "Gloria Serenity Resort");
    assert_eq!(records[0].price_local, Decimal::from(91_800));
    assert_eq!(records[0].tour_id.as_deref(), Some("88123"));
    assert_eq!(records[1].hotel_name, "Barut Hemera & Spa");
    assert_eq!(records[1].resort, "Turkey");
    assert!(records.iter().all(|record| record.origin == RecordOrigin::Gateway));
}

#[tokio::test]
async fn missing_token_is_reported_and_adapter_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", CREATE_ACTION))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
             <CreateRequestResponse/></s:Body></s:Envelope>",
        ))
        .mount(&server)
        .await;

    let gateway = SearchGateway::new(&config(server.uri())).expect("gateway");
    let error = gateway.search(&credentials(), &criteria(), today()).await.expect_err("no token");
    assert!(matches!(error, GatewayError::MissingToken));

    let adapter = TourSearchAdapter::new(&config(server.uri()));
    let records = adapter.search_on(&criteria(), today()).await;
    assert!(!records.is_empty());
    assert!(records.iter().all(|record| record.origin == RecordOrigin::Synthetic));
    assert!(records.iter().all(|record| record.price_local <= Decimal::from(120_000)));
}

#[tokio::test]
async fn soap_fault_and_http_errors_fall_back_to_synthetic_offers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
             <s:Fault><faultcode>s:Client</faultcode><faultstring>Access denied</faultstring>\
             </s:Fault></s:Body></s:Envelope>",
        ))
        .mount(&server)
        .await;

    let gateway = SearchGateway::new(&config(server.uri())).expect("gateway");
    let error = gateway.search(&credentials(), &criteria(), today()).await.expect_err("fault");
    assert!(matches!(error, GatewayError::Fault(ref reason) if reason == "Access denied"));

    let adapter = TourSearchAdapter::new(&config(server.uri()));
    let records = adapter.search_on(&criteria(), today()).await;
    assert_eq!(records[0].hotel_name, "Kaya Palazzo Golf Resort");
}

#[tokio::test]
async fn empty_result_page_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", CREATE_ACTION))
        .respond_with(ResponseTemplate::new(200).set_body_string(CREATED))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", RESULT_ACTION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<Envelope><Body><Rows></Rows></Body></Envelope>"),
        )
        .mount(&server)
        .await;

    let gateway = SearchGateway::new(&config(server.uri())).expect("gateway");
    let error = gateway.search(&credentials(), &criteria(), today()).await.expect_err("empty");
    assert!(matches!(error, GatewayError::Empty));
}

//! Integration tests for the weather and geocoding gateways using wiremock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use weatherkeep::adapters::ReqwestTransport;
use weatherkeep::ports::HttpTransport;
use weatherkeep::{
    ApiEndpoint, ApiError, ApiErrorKind, GeocodingGateway, Granularity, Location, QueryNormalizer,
    ValidationError, WeatherGateway,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

fn transport() -> Arc<dyn HttpTransport> {
    Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap())
}

fn history_body() -> serde_json::Value {
    json!({
        "message": "Count: 24",
        "cod": "200",
        "city_id": 2643743,
        "calctime": 0.0875,
        "cnt": 2,
        "list": [
            {"dt": 1578384000, "main": {"temp": 275.45}},
            {"dt": 1578387600, "main": {"temp": 275.2}}
        ]
    })
}

/// Mount the probe on `/history/city` (q=London) and return a connected gateway
async fn weather_gateway(server: &MockServer) -> WeatherGateway {
    Mock::given(method("GET"))
        .and(path("/history/city"))
        .and(query_param("q", "London"))
        .and(query_param("appid", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .mount(server)
        .await;

    let endpoint = ApiEndpoint::new(&format!("{}/history/", server.uri()), KEY).unwrap();
    WeatherGateway::connect(transport(), endpoint).await.unwrap()
}

async fn geocoding_gateway(server: &MockServer) -> GeocodingGateway {
    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("lat", "39.9042"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "Beijing"}])))
        .mount(server)
        .await;

    let endpoint = ApiEndpoint::new(&format!("{}/geo/1.0", server.uri()), KEY).unwrap();
    GeocodingGateway::connect(transport(), endpoint).await.unwrap()
}

async fn fetch_with_status(status: u16, body: &str) -> ApiError {
    let server = MockServer::start().await;
    let gateway = weather_gateway(&server).await;

    Mock::given(method("GET"))
        .and(path("/history/city"))
        .and(query_param("q", "Atlantis"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;

    let descriptor = QueryNormalizer::new()
        .past_window(Location::named("Atlantis").unwrap(), "01/10/2020", 1, Granularity::Hour)
        .unwrap();
    gateway.fetch_by_window(&descriptor).await.unwrap_err()
}

#[tokio::test]
async fn test_fetch_by_window_day_granularity_sends_hour_count() {
    let server = MockServer::start().await;
    let gateway = weather_gateway(&server).await;

    Mock::given(method("GET"))
        .and(path("/history/city"))
        .and(query_param("lat", "51.5"))
        .and(query_param("lon", "-0.12"))
        .and(query_param("cnt", "48"))
        .and(query_param("type", "day"))
        .and(query_param("appid", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = QueryNormalizer::new()
        .future_window(Location::at(51.5, -0.12).unwrap(), "01/01/2020", 2, Granularity::Day)
        .unwrap();
    let body = gateway.fetch_by_window(&descriptor).await.unwrap();

    assert_eq!(body["cod"], "200");
    assert_eq!(body["list"].as_array().unwrap().len(), 2);
    assert_eq!(gateway.last_payload(), Some(body));
}

#[tokio::test]
async fn test_fetch_by_interval_sends_start_and_end() {
    let server = MockServer::start().await;
    let gateway = weather_gateway(&server).await;

    let start = QueryNormalizer::parse_date("01/01/2020").unwrap().timestamp();
    let end = QueryNormalizer::parse_date("01/03/2020").unwrap().timestamp();
    Mock::given(method("GET"))
        .and(path("/history/city"))
        .and(query_param("q", "Paris"))
        .and(query_param("start", start.to_string()))
        .and(query_param("end", end.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = QueryNormalizer::new()
        .interval(Location::named("Paris").unwrap(), "01/01/2020", "01/03/2020", Granularity::Hour)
        .unwrap();
    gateway.fetch_by_window(&descriptor).await.unwrap();
}

#[tokio::test]
async fn test_classification_table() {
    assert_eq!(fetch_with_status(404, r#"{"cod":"404"}"#).await.kind(), ApiErrorKind::NotFound);
    assert_eq!(fetch_with_status(429, "").await.kind(), ApiErrorKind::RateLimited);
    assert_eq!(fetch_with_status(500, "oops").await.kind(), ApiErrorKind::UpstreamUnavailable);
    assert_eq!(fetch_with_status(502, "").await.kind(), ApiErrorKind::UpstreamUnavailable);
    assert_eq!(fetch_with_status(401, "{}").await.kind(), ApiErrorKind::Unauthorized);
    assert_eq!(fetch_with_status(200, "{not json").await.kind(), ApiErrorKind::UnclassifiedUpstream);
    assert_eq!(fetch_with_status(418, "{}").await.kind(), ApiErrorKind::UnclassifiedUpstream);

    match fetch_with_status(400, r#"{"cod":"400","message":"end must be after start"}"#).await {
        ApiError::BadRequest(message) => assert_eq!(message, "end must be after start"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_probe_fails_construction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/city"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"cod": 401, "message": "Invalid API key."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = ApiEndpoint::new(&format!("{}/history", server.uri()), "bad-key").unwrap();
    let result = WeatherGateway::connect(transport(), endpoint).await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_rejected_query_issues_no_request() {
    let server = MockServer::start().await;
    let gateway = weather_gateway(&server).await;

    Mock::given(method("GET"))
        .and(path("/history/city"))
        .and(query_param("q", "Reykjavik"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .expect(0)
        .mount(&server)
        .await;

    let err = QueryNormalizer::new()
        .future_window(Location::named("Reykjavik").unwrap(), "01/01/2999", 1, Granularity::Day)
        .unwrap_err();
    assert!(matches!(err, ValidationError::WindowInFuture(_)));
    assert!(gateway.last_payload().is_some());
}

#[tokio::test]
async fn test_reverse_geocode_results() {
    let server = MockServer::start().await;
    let gateway = geocoding_gateway(&server).await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("lat", "51.5098"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "City of Westminster", "lat": 51.5, "lon": -0.13, "country": "GB", "state": "England"},
            {"name": "London", "lat": 51.51, "lon": -0.12, "country": "GB"}
        ])))
        .mount(&server)
        .await;

    let query = QueryNormalizer::new().reverse(51.5098, -0.1180, 5).unwrap();
    let places = gateway.reverse_geocode(&query).await.unwrap();

    assert_eq!(places.len(), 2);
    assert_eq!(places[0].name, "City of Westminster");
    assert_eq!(places[0].state.as_deref(), Some("England"));
    assert_eq!(places[1].country.as_deref(), Some("GB"));
}

#[tokio::test]
async fn test_reverse_geocode_empty_is_success() {
    let server = MockServer::start().await;
    let gateway = geocoding_gateway(&server).await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("lat", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let query = QueryNormalizer::new().reverse(0.0, 0.0, 1).unwrap();
    let places = gateway.reverse_geocode(&query).await.unwrap();

    assert!(places.is_empty());
    assert_eq!(gateway.last_payload(), Some(json!([])));
}

#[tokio::test]
async fn test_last_payload_kept_on_error() {
    let server = MockServer::start().await;
    let gateway = geocoding_gateway(&server).await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("lat", "10"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"zeta": 1, "cod": "400", "alpha": 2, "message": "wrong longitude"}"#,
        ))
        .mount(&server)
        .await;

    let query = QueryNormalizer::new().reverse(10.0, 10.0, 1).unwrap();
    let err = gateway.reverse_geocode(&query).await.unwrap_err();

    match err {
        ApiError::BadRequest(message) => assert_eq!(message, "wrong longitude"),
        other => panic!("unexpected error: {other:?}"),
    }
    let pretty = gateway.last_payload_pretty().unwrap();
    let at = |key: &str| pretty.find(&format!("\"{key}\"")).unwrap();
    assert!(at("alpha") < at("cod"));
    assert!(at("cod") < at("message"));
    assert!(at("message") < at("zeta"));
}

use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::ApiEndpoint;
use crate::domain::{classify, parse_body, ApiError, Place, RequestDescriptor, ReverseGeocodeQuery};
use crate::ports::HttpTransport;

const HISTORY_RESOURCE: &str = "city";
const REVERSE_RESOURCE: &str = "reverse";

const PROBE_CITY: &str = "London";
const PROBE_LAT: f64 = 39.9042;
const PROBE_LON: f64 = 116.4074;

/// Shared request/classify core behind both API front-ends
pub struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
    endpoint: ApiEndpoint,
    last_payload: RwLock<Option<Value>>,
}

impl ApiGateway {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: ApiEndpoint) -> Self {
        Self {
            transport,
            endpoint,
            last_payload: RwLock::new(None),
        }
    }

    /// Issue one GET against `resource` and decode the JSON body.
    ///
    /// The decoded body (or the raw text when it is not JSON) becomes the
    /// last payload before the status is classified.
    pub async fn call(&self, resource: &str, query: Vec<(&str, String)>) -> Result<Value, ApiError> {
        self.send(resource, query).await.map(|(_, body)| body)
    }

    /// Like [`ApiGateway::call`], keeping the 2xx status alongside the body
    async fn send(&self, resource: &str, mut query: Vec<(&str, String)>) -> Result<(u16, Value), ApiError> {
        let url = format!("{}{}", self.endpoint.root(), resource);
        info!("Calling API: {}?{}", url, render_query(&query));
        query.push(("appid", self.endpoint.api_key().to_string()));

        let response = self.transport.get(&url, &query).await?;
        let decoded = serde_json::from_slice::<Value>(&response.body);

        let recorded = match &decoded {
            Ok(value) => value.clone(),
            Err(_) => Value::String(String::from_utf8_lossy(&response.body).into_owned()),
        };
        *self.last_payload.write() = Some(recorded);

        if !response.is_success() {
            let err = classify(response.status, &parse_body(&response.body));
            warn!("API call to {} failed: {}", url, err);
            return Err(err);
        }

        decoded
            .map(|body| (response.status, body))
            .map_err(|e| ApiError::UnclassifiedUpstream {
                status: response.status,
                detail: format!("undecodable response body: {e}"),
            })
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.last_payload.read().clone()
    }

    /// Last payload as indented JSON with sorted keys
    pub fn last_payload_pretty(&self) -> Option<String> {
        self.last_payload
            .read()
            .as_ref()
            .and_then(|v| serde_json::to_string_pretty(&sort_keys(v)).ok())
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn render_query(query: &[(&str, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Client for the hourly weather history API
pub struct WeatherGateway {
    api: ApiGateway,
}

impl WeatherGateway {
    /// Build the gateway and fail unless the probe request succeeds
    pub async fn connect(transport: Arc<dyn HttpTransport>, endpoint: ApiEndpoint) -> Result<Self, ApiError> {
        info!("Initializing weather gateway for {}", endpoint.root());
        let gateway = Self {
            api: ApiGateway::new(transport, endpoint),
        };
        gateway.verify_reachable().await?;
        info!("Weather API probe successful");
        Ok(gateway)
    }

    /// One hour of data for a fixed city, starting a day ago
    pub async fn verify_reachable(&self) -> Result<(), ApiError> {
        let start = Utc::now() - Duration::days(1);
        self.api
            .call(
                HISTORY_RESOURCE,
                vec![
                    ("q", PROBE_CITY.to_string()),
                    ("start", start.timestamp().to_string()),
                    ("cnt", "1".to_string()),
                    ("type", "hour".to_string()),
                ],
            )
            .await
            .map(|_| ())
    }

    pub async fn fetch_by_window(&self, descriptor: &RequestDescriptor) -> Result<Value, ApiError> {
        let (status, body) = self.api.send(HISTORY_RESOURCE, descriptor.query_pairs()).await?;
        if !body.is_object() {
            return Err(ApiError::UnclassifiedUpstream {
                status,
                detail: format!("expected a JSON object, got {}", json_type(&body)),
            });
        }
        Ok(body)
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.api.last_payload()
    }

    pub fn last_payload_pretty(&self) -> Option<String> {
        self.api.last_payload_pretty()
    }
}

/// Client for the reverse geocoding API
pub struct GeocodingGateway {
    api: ApiGateway,
}

impl GeocodingGateway {
    /// Build the gateway and fail unless the probe request succeeds
    pub async fn connect(transport: Arc<dyn HttpTransport>, endpoint: ApiEndpoint) -> Result<Self, ApiError> {
        info!("Initializing geocoding gateway for {}", endpoint.root());
        let gateway = Self {
            api: ApiGateway::new(transport, endpoint),
        };
        gateway.verify_reachable().await?;
        info!("Geocoding API probe successful");
        Ok(gateway)
    }

    pub async fn verify_reachable(&self) -> Result<(), ApiError> {
        self.api
            .call(
                REVERSE_RESOURCE,
                vec![
                    ("lat", PROBE_LAT.to_string()),
                    ("lon", PROBE_LON.to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await
            .map(|_| ())
    }

    /// Places near the coordinates, nearest first; an empty result is not an error
    pub async fn reverse_geocode(&self, query: &ReverseGeocodeQuery) -> Result<Vec<Place>, ApiError> {
        let (status, body) = self.api.send(REVERSE_RESOURCE, query.query_pairs()).await?;
        let mut places: Vec<Place> =
            serde_json::from_value(body).map_err(|e| ApiError::UnclassifiedUpstream {
                status,
                detail: format!("unexpected reverse geocoding payload: {e}"),
            })?;
        places.truncate(usize::try_from(query.limit()).unwrap_or(usize::MAX));
        Ok(places)
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.api.last_payload()
    }

    pub fn last_payload_pretty(&self) -> Option<String> {
        self.api.last_payload_pretty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApiErrorKind, Granularity, Location, TransportError};
    use crate::ports::HttpResponse;
    use crate::QueryNormalizer;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    type Recorded = (String, Vec<(String, String)>);

    /// Replays canned responses and records every request
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn param(&self, index: usize, key: &str) -> Option<String> {
            self.requests.lock()[index]
                .1
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError> {
            self.requests.lock().push((
                url.to_string(),
                query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ));
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted response".into())))
        }
    }

    fn ok(body: Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(200, body.to_string()))
    }

    fn endpoint() -> ApiEndpoint {
        ApiEndpoint::new("https://history.example/data/2.5/history", "secret").unwrap()
    }

    #[tokio::test]
    async fn test_probe_and_window_query() {
        let transport = ScriptedTransport::with(vec![
            ok(json!({"cod": "200", "list": []})),
            ok(json!({"cod": "200", "list": [{"dt": 1}]})),
        ]);
        let gateway = WeatherGateway::connect(transport.clone(), endpoint()).await.unwrap();

        let descriptor = QueryNormalizer::new()
            .past_window(Location::named("Prague").unwrap(), "01/10/2020", 2, Granularity::Day)
            .unwrap();
        let body = gateway.fetch_by_window(&descriptor).await.unwrap();
        assert_eq!(body["list"][0]["dt"], 1);

        let requests = transport.requests.lock().clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0, "https://history.example/data/2.5/history/city");
        assert_eq!(transport.param(0, "q").as_deref(), Some("London"));
        assert_eq!(transport.param(0, "cnt").as_deref(), Some("1"));
        assert_eq!(transport.param(1, "q").as_deref(), Some("Prague"));
        assert_eq!(transport.param(1, "cnt").as_deref(), Some("48"));
        assert_eq!(transport.param(1, "type").as_deref(), Some("day"));
        assert_eq!(transport.param(1, "appid").as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_failed_probe_fails_construction() {
        let transport = ScriptedTransport::with(vec![Ok(HttpResponse::new(
            401,
            json!({"cod": 401, "message": "Invalid API key"}).to_string(),
        ))]);
        let err = WeatherGateway::connect(transport, endpoint()).await.err().unwrap();
        assert_eq!(err.kind(), ApiErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_as_transport_kind() {
        let transport = ScriptedTransport::with(vec![Err(TransportError::Timeout("10s".into()))]);
        let err = WeatherGateway::connect(transport, endpoint()).await.err().unwrap();
        assert_eq!(err.kind(), ApiErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_last_payload_recorded_before_classification() {
        let transport = ScriptedTransport::with(vec![
            ok(json!([])),
            Ok(HttpResponse::new(404, json!({"cod": "404", "message": "city not found"}).to_string())),
            Ok(HttpResponse::new(200, "not json")),
        ]);
        let gateway = GeocodingGateway::connect(transport, endpoint()).await.unwrap();
        assert_eq!(gateway.last_payload(), Some(json!([])));

        let query = QueryNormalizer::new().reverse(1.0, 2.0, 1).unwrap();
        let err = gateway.reverse_geocode(&query).await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::NotFound);
        assert_eq!(gateway.last_payload().unwrap()["message"], "city not found");

        let err = gateway.reverse_geocode(&query).await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::UnclassifiedUpstream);
        assert_eq!(gateway.last_payload(), Some(json!("not json")));
    }

    #[tokio::test]
    async fn test_reverse_geocode_truncates_to_limit() {
        let transport = ScriptedTransport::with(vec![
            ok(json!([])),
            ok(json!([{"name": "A"}, {"name": "B"}, {"name": "C"}])),
        ]);
        let gateway = GeocodingGateway::connect(transport.clone(), endpoint()).await.unwrap();

        let query = QueryNormalizer::new().reverse(1.0, 2.0, 2).unwrap();
        let places = gateway.reverse_geocode(&query).await.unwrap();
        assert_eq!(places.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(transport.param(1, "limit").as_deref(), Some("2"));
        assert_eq!(transport.param(0, "lat").as_deref(), Some("39.9042"));
    }

    #[tokio::test]
    async fn test_history_must_be_an_object() {
        let transport = ScriptedTransport::with(vec![ok(json!({"cod": "200"})), ok(json!([1, 2]))]);
        let gateway = WeatherGateway::connect(transport, endpoint()).await.unwrap();
        let descriptor = QueryNormalizer::new()
            .past_window(Location::at(1.0, 2.0).unwrap(), "01/10/2020", 1, Granularity::Hour)
            .unwrap();
        let err = gateway.fetch_by_window(&descriptor).await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::UnclassifiedUpstream);
        assert!(gateway.last_payload_pretty().unwrap().contains('1'));
    }

    #[tokio::test]
    async fn test_shape_mismatch_reports_actual_status() {
        let transport = ScriptedTransport::with(vec![
            ok(json!({"cod": "200"})),
            Ok(HttpResponse::new(203, json!([1, 2]).to_string())),
        ]);
        let gateway = WeatherGateway::connect(transport, endpoint()).await.unwrap();
        let descriptor = QueryNormalizer::new()
            .past_window(Location::named("Lyon").unwrap(), "01/10/2020", 1, Granularity::Hour)
            .unwrap();
        match gateway.fetch_by_window(&descriptor).await.unwrap_err() {
            ApiError::UnclassifiedUpstream { status, .. } => assert_eq!(status, 203),
            other => panic!("unexpected error: {other:?}"),
        }

        let transport = ScriptedTransport::with(vec![
            ok(json!([])),
            Ok(HttpResponse::new(206, json!({"name": "not a list"}).to_string())),
        ]);
        let gateway = GeocodingGateway::connect(transport, endpoint()).await.unwrap();
        let query = QueryNormalizer::new().reverse(1.0, 2.0, 1).unwrap();
        let err = gateway.reverse_geocode(&query).await.unwrap_err();
        assert_eq!(err.status(), Some(206));
    }

    #[tokio::test]
    async fn test_last_payload_pretty_sorts_nested_keys() {
        let transport = ScriptedTransport::with(vec![Ok(HttpResponse::new(
            200,
            r#"{"zeta": {"b": 1, "a": 2}, "alpha": [{"y": 1, "x": 2}]}"#,
        ))]);
        let gateway = WeatherGateway::connect(transport, endpoint()).await.unwrap();

        let pretty = gateway.last_payload_pretty().unwrap();
        let at = |needle: &str| pretty.find(needle).unwrap();
        assert!(at("\"alpha\"") < at("\"zeta\""));
        assert!(at("\"x\"") < at("\"y\""));
        assert!(at("\"a\"") < at("\"b\""));
        assert!(pretty.contains('\n'));
    }
}

//! HttpSink - sends each record as one HTTP request
//!
//! Batches fan out as concurrent requests, one task per record, each bounded
//! by the per-request timeout. Failures are attributed by record index.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    BatchError, ConstructionError, FailureCollector, Record, Sink, SinkConfig, SinkError,
    SinkState, SinkType,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{run_indexed, TaskOutcome};
use crate::client::{
    HttpBody, HttpClient, HttpClientError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestClient,
};

/// User-Agent sent when the configuration sets none
pub const DEFAULT_USER_AGENT: &str = concat!("outflow/", env!("CARGO_PKG_VERSION"), " HttpSink");

/// Decides whether a response counts as a delivery failure
#[derive(Clone, Default)]
pub enum FailurePredicate {
    /// Status 400 or above
    #[default]
    ErrorStatus,
    /// Response body is empty
    EmptyBody,
    /// Status is one of the listed codes
    Status(Vec<u16>),
    /// Caller-supplied check
    Custom(Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>),
}

impl FailurePredicate {
    /// Parse `error_status`, `empty_body` or `status:500,503`
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.trim() {
            "error_status" => Some(Self::ErrorStatus),
            "empty_body" => Some(Self::EmptyBody),
            other => {
                let codes = other.strip_prefix("status:")?;
                let codes: Vec<u16> = codes
                    .split(',')
                    .map(|code| code.trim().parse())
                    .collect::<Result<_, _>>()
                    .ok()?;
                (!codes.is_empty()).then_some(Self::Status(codes))
            }
        }
    }

    pub fn custom(check: impl Fn(&HttpResponse) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(check))
    }

    /// True when `response` must be reported as failed
    pub fn matches(&self, response: &HttpResponse) -> bool {
        match self {
            Self::ErrorStatus => !response.is_ok(),
            Self::EmptyBody => response.body.is_empty(),
            Self::Status(codes) => codes.contains(&response.status),
            Self::Custom(check) => check(response),
        }
    }
}

impl fmt::Debug for FailurePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorStatus => f.write_str("ErrorStatus"),
            Self::EmptyBody => f.write_str("EmptyBody"),
            Self::Status(codes) => f.debug_tuple("Status").field(codes).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Configuration for HttpSink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    pub url: String,
    pub method: HttpMethod,
    /// Header names are unique, compared case-insensitively
    pub headers: Vec<(String, String)>,
    /// Per-request timeout, never a whole-batch timeout
    pub timeout: Option<Duration>,
    pub fail_on: FailurePredicate,
}

impl HttpSinkConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::default(),
            headers: Vec::new(),
            timeout: None,
            fail_on: FailurePredicate::default(),
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a header, replacing any header of the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fail_on(mut self, fail_on: FailurePredicate) -> Self {
        self.fail_on = fail_on;
        self
    }

    /// Create config from a sink definition
    ///
    /// Params: `url` (required), `method`, `timeout_ms`, `fail_on`.
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        let invalid =
            |message: String| ConstructionError::new(SinkType::Http, &config.name, message);

        let url = config
            .param("url")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| invalid("missing 'url' parameter".into()))?;
        let mut parsed = Self::new(url);

        if let Some(method) = config.param("method") {
            parsed.method = HttpMethod::parse(method)
                .ok_or_else(|| invalid(format!("unsupported method '{method}'")))?;
        }
        if let Some(timeout_ms) = config.param("timeout_ms") {
            let ms: u64 = timeout_ms
                .trim()
                .parse()
                .map_err(|_| invalid(format!("invalid timeout_ms '{timeout_ms}'")))?;
            parsed.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(fail_on) = config.param("fail_on") {
            parsed.fail_on = FailurePredicate::parse(fail_on)
                .ok_or_else(|| invalid(format!("unknown fail_on '{fail_on}'")))?;
        }

        let mut headers: Vec<_> = config.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            parsed = parsed.with_header(name, value);
        }
        Ok(parsed)
    }

    /// Value of a header, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether bodies are sent as JSON
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }

    fn ensure_user_agent(&mut self) {
        if self.header("user-agent").is_none() {
            self.headers
                .push(("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()));
        }
    }
}

/// Sink that issues one HTTP request per record
pub struct HttpSink<C = ReqwestClient> {
    name: String,
    config: HttpSinkConfig,
    client: Option<C>,
    state: SinkState,
}

impl HttpSink<ReqwestClient> {
    /// Create a sink backed by a fresh reqwest client
    pub fn new(name: impl Into<String>, config: HttpSinkConfig) -> Result<Self, ConstructionError> {
        let name = name.into();
        let client = ReqwestClient::new()
            .map_err(|e| ConstructionError::new(SinkType::Http, &name, e.to_string()))?;
        Ok(Self::with_client(name, config, client))
    }

    /// Create from a sink definition (for factory)
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        Self::new(&config.name, HttpSinkConfig::from_params(config)?)
    }
}

impl<C> HttpSink<C>
where
    C: HttpClient + Clone + Sync + 'static,
{
    /// Create a sink around an injected client
    pub fn with_client(name: impl Into<String>, mut config: HttpSinkConfig, client: C) -> Self {
        config.ensure_user_agent();
        Self {
            name: name.into(),
            config,
            client: Some(client),
            state: SinkState::Ready,
        }
    }

    pub fn config(&self) -> &HttpSinkConfig {
        &self.config
    }

    fn client(&self) -> Result<&C, SinkError> {
        self.state.ensure_ready(&self.name)?;
        self.client.as_ref().ok_or_else(|| SinkError::NotReady {
            sink_name: self.name.clone(),
        })
    }

    fn build_request(&self, record: &Record) -> Result<HttpRequest, SinkError> {
        let method = self.config.method;
        let (query, body) = if method == HttpMethod::Get {
            let query = record.to_pairs().ok_or_else(|| {
                SinkError::encode(
                    &self.name,
                    "GET requires an object, a query string or null record",
                )
            })?;
            (query, HttpBody::Empty)
        } else if method.carries_body() {
            (Vec::new(), self.encode_body(record))
        } else {
            (Vec::new(), HttpBody::Empty)
        };

        Ok(HttpRequest {
            method,
            url: self.config.url.clone(),
            headers: self.config.headers.clone(),
            query,
            body,
        })
    }

    fn encode_body(&self, record: &Record) -> HttpBody {
        if self.config.is_json() {
            return HttpBody::Json(record.to_json());
        }
        match record.value() {
            Value::Null => HttpBody::Empty,
            Value::Object(_) => HttpBody::Form(record.to_pairs().unwrap_or_default()),
            _ => HttpBody::Raw(record.to_line()),
        }
    }

    fn check_response(&self, response: &HttpResponse) -> Result<(), SinkError> {
        if self.config.fail_on.matches(response) {
            return Err(SinkError::Rejected {
                sink_name: self.name.clone(),
                response: response.summary(),
            });
        }
        Ok(())
    }

    fn timeout_error(&self, limit: Duration) -> SinkError {
        SinkError::Timeout {
            sink_name: self.name.clone(),
            timeout_ms: limit.as_millis() as u64,
        }
    }

    fn client_error(&self, err: &HttpClientError) -> SinkError {
        match err.kind {
            HttpErrorKind::Timeout => self.timeout_error(self.config.timeout.unwrap_or_default()),
            HttpErrorKind::Connect | HttpErrorKind::Other => {
                SinkError::transport(&self.name, err.message.clone())
            }
        }
    }
}

impl<C> Sink for HttpSink<C>
where
    C: HttpClient + Clone + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Http
    }

    #[instrument(
        name = "http_sink_output",
        skip(self, record),
        fields(sink = %self.name, method = %self.config.method)
    )]
    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        let client = self.client()?;
        let request = self.build_request(record)?;

        let result = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, client.request(request))
                .await
                .map_err(|_| self.timeout_error(limit))?,
            None => client.request(request).await,
        };
        let response = result.map_err(|e| self.client_error(&e))?;
        self.check_response(&response)?;

        debug!(sink = %self.name, status = response.status, "Record delivered");
        Ok(())
    }

    #[instrument(
        name = "http_sink_output_many",
        skip(self, records),
        fields(sink = %self.name, count = records.len())
    )]
    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        if records.is_empty() {
            return Ok(());
        }
        let client = self.client()?;
        let mut collector = FailureCollector::new(&self.name, records.len());

        let mut tasks = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match self.build_request(record) {
                Ok(request) => {
                    let client = client.clone();
                    tasks.push((index, async move { client.request(request).await }));
                }
                Err(error) => collector.fail(index, record.clone(), error, None),
            }
        }

        for (index, outcome) in run_indexed(tasks, self.config.timeout).await {
            let record = &records[index];
            match outcome {
                TaskOutcome::Completed(Ok(response)) => {
                    if let Err(error) = self.check_response(&response) {
                        collector.fail(index, record.clone(), error, None);
                    }
                }
                TaskOutcome::Completed(Err(err)) => {
                    let trace = err.trace.clone().unwrap_or_else(|| err.message.clone());
                    collector.fail(index, record.clone(), self.client_error(&err), Some(trace));
                }
                TaskOutcome::TimedOut(limit) => {
                    let error = self.timeout_error(limit);
                    let trace = error.to_string();
                    collector.fail(index, record.clone(), error, Some(trace));
                }
                TaskOutcome::Aborted(message) => {
                    let error = SinkError::transport(&self.name, message.clone());
                    collector.fail(index, record.clone(), error, Some(message));
                }
            }
        }

        match collector.finish() {
            Ok(delivered) => {
                info!(sink = %self.name, count = delivered, "Batch delivered");
                Ok(())
            }
            Err(aggregate) => {
                warn!(
                    sink = %self.name,
                    delivered = aggregate.succeeded(),
                    failed = aggregate.failures().len(),
                    "Batch partially failed"
                );
                Err(aggregate.into())
            }
        }
    }

    #[instrument(name = "http_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if self.state.close() {
            self.client = None;
            debug!(sink = %self.name, "HttpSink closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FailurePredicate, HttpSink, HttpSinkConfig, DEFAULT_USER_AGENT};
    use crate::client::{HttpMethod, HttpResponse};
    use contracts::{BatchError, Record, Sink, SinkConfig, SinkError, SinkType};
    use serde_json::json;
    use std::time::Duration;
    use tracing_test::traced_test;
    use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn build(config: HttpSinkConfig) -> HttpSink {
        HttpSink::new("api", config).unwrap()
    }

    fn json_post(server: &MockServer) -> HttpSinkConfig {
        HttpSinkConfig::new(format!("{}/ingest", server.uri()))
            .with_method(HttpMethod::Post)
            .with_header("Content-Type", "application/json")
    }

    #[test]
    fn test_predicate_parse() {
        assert!(matches!(
            FailurePredicate::parse("error_status"),
            Some(FailurePredicate::ErrorStatus)
        ));
        assert!(matches!(
            FailurePredicate::parse("status: 500, 503"),
            Some(FailurePredicate::Status(codes)) if codes == vec![500, 503]
        ));
        assert!(FailurePredicate::parse("status:").is_none());
        assert!(FailurePredicate::parse("sometimes").is_none());
    }

    #[test]
    fn test_predicate_matches() {
        let ok_empty = HttpResponse {
            status: 200,
            body: String::new(),
        };
        let redirect = HttpResponse {
            status: 302,
            body: "moved".into(),
        };
        assert!(!FailurePredicate::ErrorStatus.matches(&ok_empty));
        assert!(!FailurePredicate::ErrorStatus.matches(&redirect));
        assert!(FailurePredicate::EmptyBody.matches(&ok_empty));
        assert!(FailurePredicate::Status(vec![302]).matches(&redirect));
        assert!(FailurePredicate::custom(|r| r.body.contains("moved")).matches(&redirect));
    }

    #[test]
    fn test_config_from_params() {
        let config = SinkConfig::new("api", SinkType::Http)
            .with_param("url", "http://localhost/x")
            .with_param("method", "post")
            .with_param("timeout_ms", "250")
            .with_param("fail_on", "empty_body")
            .with_header("content-type", "application/json; charset=utf-8");

        let parsed = HttpSinkConfig::from_params(&config).unwrap();
        assert_eq!(parsed.method, HttpMethod::Post);
        assert_eq!(parsed.timeout, Some(Duration::from_millis(250)));
        assert!(matches!(parsed.fail_on, FailurePredicate::EmptyBody));
        assert!(parsed.is_json());
    }

    #[test]
    fn test_config_rejects_unknown_method() {
        let config = SinkConfig::new("api", SinkType::Http)
            .with_param("url", "http://localhost/x")
            .with_param("method", "TRACE");

        let err = HttpSinkConfig::from_params(&config).unwrap_err();
        assert_eq!(err.sink_type, SinkType::Http);
        assert!(err.message.contains("TRACE"));
    }

    #[test]
    fn test_user_agent_injected_once() {
        let sink = HttpSink::new("api", HttpSinkConfig::new("http://localhost")).unwrap();
        assert_eq!(sink.config().header("USER-AGENT"), Some(DEFAULT_USER_AGENT));

        let custom = HttpSinkConfig::new("http://localhost").with_header("user-agent", "mine");
        let sink = HttpSink::new("api", custom).unwrap();
        assert_eq!(sink.config().header("User-Agent"), Some("mine"));
        assert_eq!(sink.config().headers.len(), 1);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .and(body_json(json!({"id": 7, "name": "x"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = build(json_post(&server));
        sink.output(&Record::from(json!({"id": 7, "name": "x"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_post_passes_strings_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("raw payload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpSinkConfig::new(server.uri()).with_method(HttpMethod::Post);
        let mut sink = build(config);
        sink.output(&Record::from("raw payload")).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_maps_record_to_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpSinkConfig::new(format!("{}/search", server.uri()));
        let mut sink = build(config);
        sink.output(&Record::from(json!({"q": "rust", "page": 2})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_rejects_array_record() {
        let server = MockServer::start().await;
        let mut sink = build(HttpSinkConfig::new(server.uri()));

        let err = sink.output(&Record::from(json!([1, 2]))).await.unwrap_err();
        assert!(matches!(err, SinkError::Encode { .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let mut sink = build(json_post(&server));
        let err = sink.output(&Record::from(json!({"id": 1}))).await.unwrap_err();
        match err {
            SinkError::Rejected { response, .. } => {
                assert_eq!(response.status, 503);
                assert_eq!(response.body, "busy");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_predicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = json_post(&server).with_fail_on(FailurePredicate::EmptyBody);
        let mut sink = build(config);
        let err = sink.output(&Record::from(json!({}))).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_single_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = json_post(&server).with_timeout(Duration::from_millis(50));
        let mut sink = build(config);
        let err = sink.output(&Record::from(json!({}))).await.unwrap_err();
        assert_eq!(
            err,
            SinkError::Timeout {
                sink_name: "api".into(),
                timeout_ms: 50
            }
        );
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on port 1
        let config = HttpSinkConfig::new("http://127.0.0.1:1/").with_method(HttpMethod::Post);
        let mut sink = HttpSink::new("api", config).unwrap();

        let err = sink.output(&Record::from("x")).await.unwrap_err();
        assert!(matches!(err, SinkError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_batch_attributes_failures_by_index() {
        let server = MockServer::start().await;
        for failing in [2, 5] {
            Mock::given(method("POST"))
                .and(body_json(json!({"id": failing})))
                .respond_with(ResponseTemplate::new(500))
                .with_priority(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut sink = build(json_post(&server));
        let records: Vec<Record> = (0..8).map(|id| Record::from(json!({"id": id}))).collect();

        let err = sink.output_many(&records).await.unwrap_err();
        let aggregate = match err {
            BatchError::Aggregate(aggregate) => aggregate,
            other => panic!("expected aggregate, got {other:?}"),
        };
        assert_eq!(aggregate.total(), 8);
        assert_eq!(aggregate.succeeded(), 6);

        let failed: Vec<_> = aggregate.failed_records().cloned().collect();
        assert_eq!(failed, vec![records[2].clone(), records[5].clone()]);
        for failure in aggregate.failures() {
            assert!(matches!(failure.error, SinkError::Rejected { .. }));
            assert!(failure.trace.is_none());
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_batch_all_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(4)
            .mount(&server)
            .await;

        let mut sink = build(json_post(&server));
        let records: Vec<Record> = (0..4).map(|id| Record::from(json!({"id": id}))).collect();
        sink.output_many(&records).await.unwrap();

        assert!(logs_contain("Batch delivered"));
        assert!(logs_contain("count=4"));
        assert!(!logs_contain("Batch partially failed"));
    }

    #[tokio::test]
    async fn test_batch_timeout_is_per_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"id": 1})))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = json_post(&server).with_timeout(Duration::from_millis(100));
        let mut sink = build(config);
        let records: Vec<Record> = (0..3).map(|id| Record::from(json!({"id": id}))).collect();

        let err = sink.output_many(&records).await.unwrap_err();
        let BatchError::Aggregate(aggregate) = err else {
            panic!("expected aggregate");
        };
        assert_eq!(aggregate.failures().len(), 1);
        let failure = &aggregate.failures()[0];
        assert_eq!(failure.data, records[1]);
        assert!(matches!(failure.error, SinkError::Timeout { timeout_ms: 100, .. }));
        assert!(failure.trace.is_some());
    }

    #[tokio::test]
    async fn test_batch_transport_errors_carry_trace() {
        let config = HttpSinkConfig::new("http://127.0.0.1:1/").with_method(HttpMethod::Post);
        let mut sink = HttpSink::new("api", config).unwrap();

        let records = vec![Record::from("a"), Record::from("b")];
        let BatchError::Aggregate(aggregate) = sink.output_many(&records).await.unwrap_err() else {
            panic!("expected aggregate");
        };
        assert_eq!(aggregate.failures().len(), 2);
        assert!(aggregate
            .failures()
            .iter()
            .all(|f| matches!(f.error, SinkError::Transport { .. }) && f.trace.is_some()));
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut sink = build(json_post(&server));
        sink.output_many(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_twice() {
        let mut sink = HttpSink::new("api", HttpSinkConfig::new("http://localhost")).unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        let err = sink.output(&Record::from("x")).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed { .. }));
    }
}

use crate::errors::RelayError;
use crate::helpdesk::{HelpdeskApi, UpstreamResponse};
use crate::payload::{ContactPayload, TicketPayload};
use async_trait::async_trait;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use metrics::{
    Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

/// In-process [`HelpdeskApi`] that records payloads and replays canned responses.
pub struct MockHelpdesk {
    contact_response: UpstreamResponse,
    ticket_response: UpstreamResponse,
    pub contact_calls: Mutex<Vec<Value>>,
    pub ticket_calls: Mutex<Vec<Value>>,
}

impl MockHelpdesk {
    /// Both calls succeed, returning contact `c-1` and ticket `t-1`.
    pub fn succeeding() -> Self {
        Self::new(
            UpstreamResponse::new(StatusCode::OK, serde_json::json!({"type": "contact", "id": "c-1"})),
            UpstreamResponse::new(
                StatusCode::OK,
                serde_json::json!({"type": "ticket", "id": "internal-9", "ticket_id": "t-1"}),
            ),
        )
    }

    pub fn new(contact_response: UpstreamResponse, ticket_response: UpstreamResponse) -> Self {
        MockHelpdesk {
            contact_response,
            ticket_response,
            contact_calls: Mutex::new(Vec::new()),
            ticket_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_contact_response(mut self, status: StatusCode, body: Value) -> Self {
        self.contact_response = UpstreamResponse::new(status, body);
        self
    }

    pub fn with_ticket_response(mut self, status: StatusCode, body: Value) -> Self {
        self.ticket_response = UpstreamResponse::new(status, body);
        self
    }

    pub fn contact_call_count(&self) -> usize {
        self.contact_calls.lock().unwrap().len()
    }

    pub fn ticket_call_count(&self) -> usize {
        self.ticket_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HelpdeskApi for MockHelpdesk {
    async fn upsert_contact(
        &self,
        _access_token: &str,
        payload: &ContactPayload,
    ) -> Result<UpstreamResponse, RelayError> {
        self.contact_calls
            .lock()
            .unwrap()
            .push(serde_json::to_value(payload)?);
        Ok(self.contact_response.clone())
    }

    async fn create_ticket(
        &self,
        _access_token: &str,
        payload: &TicketPayload,
    ) -> Result<UpstreamResponse, RelayError> {
        self.ticket_calls
            .lock()
            .unwrap()
            .push(serde_json::to_value(payload)?);
        Ok(self.ticket_response.clone())
    }
}

/// Helpdesk whose calls never complete.
pub struct StalledHelpdesk;

#[async_trait]
impl HelpdeskApi for StalledHelpdesk {
    async fn upsert_contact(
        &self,
        _access_token: &str,
        _payload: &ContactPayload,
    ) -> Result<UpstreamResponse, RelayError> {
        std::future::pending().await
    }

    async fn create_ticket(
        &self,
        _access_token: &str,
        _payload: &TicketPayload,
    ) -> Result<UpstreamResponse, RelayError> {
        std::future::pending().await
    }
}

/// Recorder tracking the current value of a single gauge; everything else is a no-op.
pub struct GaugeRecorder {
    name: &'static str,
    gauge: Arc<TrackedGauge>,
}

#[derive(Default)]
struct TrackedGauge(Mutex<f64>);

impl GaugeFn for TrackedGauge {
    fn increment(&self, value: f64) {
        *self.0.lock().unwrap() += value;
    }

    fn decrement(&self, value: f64) {
        *self.0.lock().unwrap() -= value;
    }

    fn set(&self, value: f64) {
        *self.0.lock().unwrap() = value;
    }
}

impl GaugeRecorder {
    pub fn new(name: &'static str) -> Self {
        GaugeRecorder {
            name,
            gauge: Arc::default(),
        }
    }

    pub fn value(&self) -> f64 {
        *self.gauge.0.lock().unwrap()
    }
}

impl Recorder for GaugeRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        if key.name() == self.name {
            Gauge::from_arc(self.gauge.clone())
        } else {
            Gauge::noop()
        }
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

/// Canned responses per request path for [`start_mock_helpdesk`].
#[derive(Clone, Default)]
pub struct MockUpstream {
    routes: HashMap<String, (StatusCode, String)>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, path: &str, status: StatusCode, body: &str) -> Self {
        self.routes
            .insert(path.to_string(), (status, body.to_string()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

pub type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Serves `upstream` on a random local port. Unknown paths answer 404.
pub async fn start_mock_helpdesk(upstream: MockUpstream) -> (Url, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let port = listener.local_addr().unwrap().port();
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));

    let upstream = Arc::new(upstream);
    let log = recorded.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let upstream = upstream.clone();
            let log = log.clone();

            tokio::spawn(async move {
                let handler = service_fn(move |req: Request<Incoming>| {
                    let upstream = upstream.clone();
                    let log = log.clone();
                    async move { Ok::<_, Infallible>(respond(req, &upstream, &log).await) }
                });
                if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, handler)
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    (url, recorded)
}

async fn respond(
    req: Request<Incoming>,
    upstream: &MockUpstream,
    log: &Recorded,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    log.lock().unwrap().push(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    });

    let (status, body) = upstream
        .routes
        .get(parts.uri.path())
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, r#"{"type":"error.list"}"#.to_string()));

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

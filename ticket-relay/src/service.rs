use crate::ServerError;
use crate::config::Config;
use crate::errors::RelayError;
use crate::gate::{Admission, Gate};
use crate::helpdesk::HelpdeskApi;
use crate::http::{ServiceBody, empty_response, into_boxed, json_response, with_headers};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT, SUBMISSIONS};
use crate::relay::{RelayOutcome, RequestRelay};
use crate::submission::FormSubmission;
use http::request::Parts;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// The public endpoint: boundary checks, body parsing, then [`RequestRelay`].
///
/// Every failure is turned into a JSON response here; the service itself never errors.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    relay: RequestRelay,
    gate: Gate,
    path: String,
    max_body_bytes: usize,
}

impl RelayService {
    pub fn new(config: &Config, helpdesk: Arc<dyn HelpdeskApi>) -> Self {
        RelayService {
            inner: Arc::new(ServiceInner {
                relay: RequestRelay::new(helpdesk, config.helpdesk.clone()),
                gate: Gate::new(&config.gate),
                path: config.path.trim_end_matches('/').to_string(),
                max_body_bytes: config.max_body_bytes,
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.relay.is_configured()
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let start = Instant::now();
        let _inflight = InflightGuard::new();

        let response = self.inner.process(req).await;

        shared::histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_owned())
            .record(start.elapsed().as_secs_f64());
        response
    }
}

/// Holds one slot of the inflight gauge; released even when the request future is dropped.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        shared::gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        shared::gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

impl ServiceInner {
    async fn process<B>(&self, req: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        let cors = match self.gate.cors_headers(&parts.headers) {
            Ok(headers) => headers,
            Err(e) => return error_response(&e),
        };

        let response = match self.dispatch(parts, body).await {
            Ok(Some(outcome)) => json_response(StatusCode::OK, &outcome.to_body()),
            Ok(None) => empty_response(StatusCode::NO_CONTENT),
            Err(e) => error_response(&e),
        };

        with_headers(response, cors)
    }

    // Ok(None) answers a preflight.
    async fn dispatch<B>(&self, parts: Parts, body: B) -> Result<Option<RelayOutcome>, RelayError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if parts.uri.path().trim_end_matches('/') != self.path {
            return Err(RelayError::NotFound);
        }

        if self.gate.admit(&parts.method, &parts.headers)? == Admission::Preflight {
            return Ok(None);
        }

        let bytes = read_body(body, self.max_body_bytes).await?;
        let submission = FormSubmission::from_slice(&bytes)?;

        let result = self.relay.submit(&submission).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        shared::counter!(SUBMISSIONS, "outcome" => outcome).increment(1);

        result.map(Some)
    }
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, RelayError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::validation("request body too large"))
        }
        Err(e) => Err(RelayError::Unexpected(format!(
            "failed to read request body: {e}"
        ))),
    }
}

fn error_response(error: &RelayError) -> Response<Bytes> {
    match error {
        RelayError::Unexpected(_) | RelayError::Config(_) => {
            tracing::error!(error = %error, "Request failed")
        }
        _ => tracing::debug!(error = %error, "Request rejected"),
    }
    json_response(error.status(), &error.to_body())
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<ServiceBody<ServerError>>;
    type Error = ServerError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(into_boxed(service.handle(req).await)) })
    }
}

use crate::config::HelpdeskConfig;
use crate::errors::RelayError;
use crate::metrics_defs::UPSTREAM_DURATION;
use crate::payload::{ContactPayload, TicketPayload};
use async_trait::async_trait;
use http::StatusCode;
use http::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// Status and decoded body of a helpdesk call.
///
/// Bodies that are not JSON are kept verbatim as a JSON string.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// First of `fields` holding a non-blank string or a number, passed through as is.
    pub fn id(&self, fields: &[&str]) -> Option<String> {
        fields.iter().find_map(|field| match self.body.get(*field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// The two helpdesk operations the relay depends on.
///
/// A non-success status is not an `Err`; implementations only fail on
/// transport problems.
#[async_trait]
pub trait HelpdeskApi: Send + Sync {
    /// Create or update a contact, keyed by email.
    async fn upsert_contact(
        &self,
        access_token: &str,
        payload: &ContactPayload,
    ) -> Result<UpstreamResponse, RelayError>;

    /// Create a ticket attached to an existing contact.
    async fn create_ticket(
        &self,
        access_token: &str,
        payload: &TicketPayload,
    ) -> Result<UpstreamResponse, RelayError>;
}

/// [`HelpdeskApi`] over the Intercom REST API.
#[derive(Clone)]
pub struct IntercomClient {
    client: reqwest::Client,
    base_url: Url,
    api_version: String,
}

impl IntercomClient {
    pub fn new(config: &HelpdeskConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(IntercomClient {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn endpoint(&self, resource: &str) -> Result<Url, RelayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::Unexpected(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .push(resource);
        Ok(url)
    }

    async fn post<T: Serialize + Sync>(
        &self,
        call: &'static str,
        resource: &str,
        access_token: &str,
        payload: &T,
    ) -> Result<UpstreamResponse, RelayError> {
        let url = self.endpoint(resource)?;
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header("Intercom-Version", &self.api_version)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        shared::histogram!(UPSTREAM_DURATION, "call" => call, "status" => status.as_str().to_owned())
            .record(start.elapsed().as_secs_f64());
        tracing::debug!(call, %status, "Helpdesk call finished");

        Ok(UpstreamResponse::new(status, decode_body(&text)))
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl HelpdeskApi for IntercomClient {
    async fn upsert_contact(
        &self,
        access_token: &str,
        payload: &ContactPayload,
    ) -> Result<UpstreamResponse, RelayError> {
        self.post("upsert_contact", "contacts", access_token, payload)
            .await
    }

    async fn create_ticket(
        &self,
        access_token: &str,
        payload: &TicketPayload,
    ) -> Result<UpstreamResponse, RelayError> {
        self.post("create_ticket", "tickets", access_token, payload)
            .await
    }
}

// Boundary checks run before a submission is parsed: origin allow-list, CORS
// preflight, method, and the optional shared secret. Order matters, a
// forbidden origin is rejected before anything else and gets no CORS headers.

use crate::config::GateConfig;
use crate::errors::RelayError;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderMap, HeaderName, HeaderValue, ORIGIN, VARY,
};
use http::Method;

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

#[derive(Debug, PartialEq)]
pub enum Admission {
    /// Answer with 204 and no body
    Preflight,
    /// Go on and relay the submission
    Relay,
}

#[derive(Clone, Debug)]
pub struct Gate {
    allowed_origins: Vec<String>,
    api_key: Option<String>,
}

impl Gate {
    pub fn new(config: &GateConfig) -> Self {
        Gate {
            allowed_origins: config.allowed_origins.clone(),
            api_key: config.api_key().map(String::from),
        }
    }

    /// Checks the request origin and returns the CORS headers for the response.
    ///
    /// Requests without an origin, or with any origin when no allow-list is
    /// configured, are let through.
    pub fn cors_headers(&self, request_headers: &HeaderMap) -> Result<HeaderMap, RelayError> {
        let origin = request_headers
            .get(ORIGIN)
            .filter(|value| !value.as_bytes().is_empty());

        if let Some(origin) = origin
            && !self.allowed_origins.is_empty()
        {
            let allowed = origin
                .to_str()
                .map(|o| self.allowed_origins.iter().any(|a| a == o))
                .unwrap_or(false);
            if !allowed {
                tracing::info!(origin = ?origin, "Rejected request from forbidden origin");
                return Err(RelayError::ForbiddenOrigin);
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            origin.cloned().unwrap_or(HeaderValue::from_static("*")),
        );
        headers.insert(VARY, HeaderValue::from_static("Origin"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST,OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, x-api-key"),
        );
        Ok(headers)
    }

    /// Method and shared secret checks, after the origin has been accepted.
    pub fn admit(&self, method: &Method, request_headers: &HeaderMap) -> Result<Admission, RelayError> {
        if method == Method::OPTIONS {
            return Ok(Admission::Preflight);
        }
        if method != Method::POST {
            return Err(RelayError::MethodNotAllowed);
        }

        if let Some(expected) = &self.api_key {
            let provided = request_headers.get(API_KEY_HEADER).map(HeaderValue::as_bytes);
            if provided != Some(expected.as_bytes()) {
                return Err(RelayError::Unauthorized);
            }
        }

        Ok(Admission::Relay)
    }
}

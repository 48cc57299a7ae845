use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use serde::Serialize;

/// Response body type produced by the relay service.
pub type ServiceBody<E> = BoxBody<Bytes, E>;

/// Serializes `value` as the JSON body of a response with `status`.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Bytes> {
    let (status, bytes) = match serde_json::to_vec(value) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"Unexpected server error"}"#),
            )
        }
    };

    let mut response = Response::new(bytes);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn empty_response(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

pub fn with_headers(mut response: Response<Bytes>, headers: HeaderMap) -> Response<Bytes> {
    response.headers_mut().extend(headers);
    response
}

pub fn into_boxed<E: 'static>(response: Response<Bytes>) -> Response<ServiceBody<E>> {
    response.map(|body| Full::new(body).map_err(|e| match e {}).boxed())
}

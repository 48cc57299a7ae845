use http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

/// Everything that can end a submission early.
///
/// Each variant maps to exactly one response status and JSON body, see
/// [`RelayError::status`] and [`RelayError::to_body`].
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or malformed caller input
    #[error("{0}")]
    Validation(String),

    /// Required server configuration is missing. Carries the setting name, never its value.
    #[error("Missing {0}")]
    Config(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden origin")]
    ForbiddenOrigin,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found")]
    NotFound,

    /// The helpdesk rejected the contact upsert, or accepted it without returning an id
    #[error("Failed to upsert contact (upstream status {status})")]
    ContactUpsert { status: StatusCode, details: Value },

    /// The contact exists but the ticket could not be created
    #[error("Failed to create ticket for contact {contact_id} (upstream status {status})")]
    TicketCreation {
        status: StatusCode,
        details: Value,
        contact_id: String,
    },

    /// Anything else. The message is logged, never returned to the caller.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::ForbiddenOrigin => StatusCode::FORBIDDEN,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::ContactUpsert { status, .. }
            | RelayError::TicketCreation { status, .. } => forwarded_status(*status),
            RelayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body returned to the caller.
    pub fn to_body(&self) -> Value {
        match self {
            RelayError::ContactUpsert { details, .. } => json!({
                "error": "Failed to upsert contact",
                "details": details,
            }),
            RelayError::TicketCreation {
                details,
                contact_id,
                ..
            } => json!({
                "error": "Intercom API error (create ticket)",
                "contact_id": contact_id,
                "details": details,
            }),
            RelayError::Unexpected(_) => json!({ "error": "Unexpected server error" }),
            other => json!({ "error": other.to_string() }),
        }
    }

    /// Label used for the outcome metric tag.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation_error",
            RelayError::Config(_) => "config_error",
            RelayError::Unauthorized => "unauthorized",
            RelayError::ForbiddenOrigin => "forbidden_origin",
            RelayError::MethodNotAllowed => "method_not_allowed",
            RelayError::NotFound => "not_found",
            RelayError::ContactUpsert { .. } => "contact_upsert_error",
            RelayError::TicketCreation { .. } => "ticket_creation_error",
            RelayError::Unexpected(_) => "unexpected_error",
        }
    }
}

// An upstream error with a success status means the helpdesk answered 2xx
// without the id we need.
fn forwarded_status(status: StatusCode) -> StatusCode {
    if status.is_success() {
        StatusCode::BAD_GATEWAY
    } else {
        status
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Unexpected(format!("helpdesk request failed: {e}"))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Unexpected(format!("json error: {e}"))
    }
}

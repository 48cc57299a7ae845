use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Endpoint path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Helpdesk base URL must be an http(s) URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Request body limit cannot be 0")]
    InvalidBodyLimit,

    #[error("Request timeout cannot be 0")]
    InvalidTimeout,
}

/// Form fields that can be mirrored into helpdesk attributes.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    StoreUrl,
    Theme,
    CollaboratorCode,
    MediaLink,
    Message,
}

impl FormField {
    pub const ALL: [FormField; 5] = [
        FormField::StoreUrl,
        FormField::Theme,
        FormField::CollaboratorCode,
        FormField::MediaLink,
        FormField::Message,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            FormField::StoreUrl => "store_url",
            FormField::Theme => "theme",
            FormField::CollaboratorCode => "collaborator_code",
            FormField::MediaLink => "media_link",
            FormField::Message => "message",
        }
    }

    const fn env_suffix(&self) -> &'static str {
        match self {
            FormField::StoreUrl => "STORE_URL",
            FormField::Theme => "THEME",
            FormField::CollaboratorCode => "COLLABORATOR_CODE",
            FormField::MediaLink => "MEDIA_LINK",
            FormField::Message => "MESSAGE",
        }
    }
}

/// Per-field key overrides as written in the config file.
///
/// `Some(key)` maps the field to `key`, `None` (yaml `null`) or an empty key
/// removes the field from the mapping.
pub type KeyOverrides = IndexMap<FormField, Option<String>>;

/// Resolved mapping from form field to the attribute key used by the helpdesk.
///
/// Keys must match attributes that already exist in the helpdesk schema, which
/// is why they come from config rather than being fixed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeKeys(IndexMap<FormField, String>);

impl AttributeKeys {
    /// Every field except the message, keyed by its own name.
    pub fn contact_defaults() -> Self {
        AttributeKeys(
            [
                FormField::StoreUrl,
                FormField::Theme,
                FormField::CollaboratorCode,
                FormField::MediaLink,
            ]
            .into_iter()
            .map(|field| (field, field.as_str().to_string()))
            .collect(),
        )
    }

    pub fn with_overrides(mut self, overrides: &KeyOverrides) -> Self {
        for (field, key) in overrides {
            match key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => {
                    self.0.insert(*field, key.to_string());
                }
                _ => {
                    self.0.shift_remove(field);
                }
            }
        }
        self
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Configured keys in fixed field order.
    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        FormField::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|key| (field, key)))
    }
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for form submissions
    #[serde(default)]
    pub listener: Listener,
    /// Listener for health and readiness probes
    #[serde(default = "Listener::admin_default")]
    pub admin_listener: Listener,
    /// The single endpoint path that accepts submissions
    #[serde(default = "default_path")]
    pub path: String,
    /// Upper bound on the inbound request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub helpdesk: HelpdeskConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

fn default_path() -> String {
    "/api/intercom/ticket".to_string()
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            admin_listener: Listener::admin_default(),
            path: default_path(),
            max_body_bytes: default_max_body_bytes(),
            helpdesk: HelpdeskConfig::default(),
            gate: GateConfig::default(),
        }
    }
}

impl Config {
    /// Validates the relay configuration.
    ///
    /// Missing credentials are not a validation failure; they surface per request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidPath(self.path.clone()));
        }

        if self.max_body_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit);
        }

        self.helpdesk.validate()
    }

    /// Layers environment variables on top of the file configuration.
    ///
    /// `lookup` is normally `|name| std::env::var(name).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("INTERCOM_ACCESS_TOKEN") {
            self.helpdesk.access_token = Some(token.trim().to_string());
        }
        if let Some(id) = non_empty("INTERCOM_TICKET_TYPE_ID") {
            self.helpdesk.ticket_type_id = Some(id.trim().to_string());
        }
        if let Some(version) = non_empty("INTERCOM_VERSION") {
            self.helpdesk.api_version = version.trim().to_string();
        }
        if let Some(base_url) = non_empty("INTERCOM_BASE_URL") {
            match Url::parse(base_url.trim()) {
                Ok(url) => self.helpdesk.base_url = url,
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid INTERCOM_BASE_URL"),
            }
        }
        if let Some(flag) = non_empty("INTERCOM_SKIP_CONTACT_ATTRIBUTES") {
            self.helpdesk.skip_contact_attributes = parse_flag(&flag);
        }

        for field in FormField::ALL {
            let contact_var = format!("INTERCOM_CONTACT_ATTR_{}", field.env_suffix());
            if let Some(key) = lookup(&contact_var) {
                self.helpdesk
                    .contact_attributes
                    .insert(field, Some(key.trim().to_string()));
            }

            let ticket_var = format!("INTERCOM_TICKET_ATTR_{}", field.env_suffix());
            if let Some(key) = lookup(&ticket_var) {
                self.helpdesk
                    .ticket_attributes
                    .insert(field, Some(key.trim().to_string()));
            }
        }

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.gate.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(api_key) = non_empty("FORM_API_KEY") {
            self.gate.api_key = Some(api_key);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Listener {
    fn admin_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Settings for the outbound helpdesk API.
#[derive(Clone, Deserialize, PartialEq)]
pub struct HelpdeskConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub ticket_type_id: Option<String>,
    /// Sent as the `Intercom-Version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Send only role and email on contact upsert, for workspaces without the custom attributes
    #[serde(default)]
    pub skip_contact_attributes: bool,
    /// Applies to each outbound call. Unset leaves the transport default (no timeout).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub contact_attributes: KeyOverrides,
    #[serde(default)]
    pub ticket_attributes: KeyOverrides,
}

fn default_base_url() -> Url {
    Url::parse("https://api.intercom.io").expect("static URL is valid")
}

fn default_api_version() -> String {
    "Unstable".to_string()
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        HelpdeskConfig {
            base_url: default_base_url(),
            access_token: None,
            ticket_type_id: None,
            api_version: default_api_version(),
            skip_contact_attributes: false,
            request_timeout_secs: None,
            contact_attributes: KeyOverrides::new(),
            ticket_attributes: KeyOverrides::new(),
        }
    }
}

impl HelpdeskConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base()
        {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.to_string()));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ValidationError::InvalidTimeout);
        }

        Ok(())
    }

    /// Contact custom attribute keys with the configured overrides applied.
    pub fn contact_keys(&self) -> AttributeKeys {
        AttributeKeys::contact_defaults().with_overrides(&self.contact_attributes)
    }

    /// Extra ticket attribute keys. Nothing is mapped unless configured.
    pub fn ticket_keys(&self) -> AttributeKeys {
        AttributeKeys::default().with_overrides(&self.ticket_attributes)
    }

    pub fn access_token(&self) -> Option<&str> {
        non_blank(&self.access_token)
    }

    pub fn ticket_type_id(&self) -> Option<&str> {
        non_blank(&self.ticket_type_id)
    }

    pub fn has_credentials(&self) -> bool {
        self.access_token().is_some() && self.ticket_type_id().is_some()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for HelpdeskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelpdeskConfig")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &redacted(&self.access_token))
            .field("ticket_type_id", &self.ticket_type_id)
            .field("api_version", &self.api_version)
            .field("skip_contact_attributes", &self.skip_contact_attributes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("contact_attributes", &self.contact_attributes)
            .field("ticket_attributes", &self.ticket_attributes)
            .finish()
    }
}

/// Checks applied at the request boundary before a submission is relayed.
#[derive(Clone, Default, Deserialize, PartialEq)]
pub struct GateConfig {
    /// Origins allowed to call the endpoint. Empty echoes back any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Shared secret expected in the `x-api-key` header
    #[serde(default)]
    pub api_key: Option<String>,
}

impl GateConfig {
    pub fn api_key(&self) -> Option<&str> {
        non_blank(&self.api_key)
    }
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("allowed_origins", &self.allowed_origins)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

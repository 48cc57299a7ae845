use crate::config::FormField;
use crate::errors::RelayError;
use serde_json::Value;

/// A support request as posted by the storefront form.
///
/// Every field is trimmed. Absent optional fields are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormSubmission {
    pub email: String,
    pub store_url: String,
    pub message: String,
    pub theme: String,
    pub collaborator_code: String,
    pub media_link: String,
}

impl FormSubmission {
    /// Parses a raw request body.
    ///
    /// Malformed JSON is an unexpected error. Valid JSON that is not an object
    /// yields an empty submission, which then fails validation.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormSubmission::default());
        }
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::from_json(&value))
    }

    pub fn from_json(value: &Value) -> Self {
        let field = |name: &str| value.get(name).map(stringify).unwrap_or_default();

        FormSubmission {
            email: field("email"),
            store_url: field("store_url"),
            message: field("message"),
            theme: field("theme"),
            collaborator_code: field("collaborator_code"),
            media_link: field("media_link"),
        }
    }

    /// Checks the required fields, in a fixed order so the first missing one is reported.
    pub fn validate(&self) -> Result<(), RelayError> {
        for (name, value) in [
            ("email", &self.email),
            ("store_url", &self.store_url),
            ("message", &self.message),
        ] {
            if value.is_empty() {
                return Err(RelayError::validation(format!("{name} is required")));
            }
        }
        Ok(())
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::StoreUrl => &self.store_url,
            FormField::Theme => &self.theme,
            FormField::CollaboratorCode => &self.collaborator_code,
            FormField::MediaLink => &self.media_link,
            FormField::Message => &self.message,
        }
    }
}

// Falsy JSON values (null, false, 0, "") read as an empty field, anything
// else is rendered as text.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "true".to_string(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

//! Request bodies sent to the helpdesk, built from a validated submission.
//!
//! Everything here is pure so payloads can be checked without a network.

use crate::config::AttributeKeys;
use crate::submission::FormSubmission;
use indexmap::IndexMap;
use serde::Serialize;

pub const LEAD_ROLE: &str = "lead";
pub const DEFAULT_TITLE_KEY: &str = "_default_title_";
pub const DEFAULT_DESCRIPTION_KEY: &str = "_default_description_";

const TITLE: &str = "Support request";
const PLACEHOLDER: &str = "-";

#[derive(Debug, Serialize, PartialEq)]
pub struct ContactPayload {
    pub role: &'static str,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<IndexMap<String, String>>,
}

impl ContactPayload {
    /// Lead contact for the submission.
    ///
    /// With `skip_custom_attributes` only role and email are sent.
    pub fn new(
        submission: &FormSubmission,
        keys: &AttributeKeys,
        skip_custom_attributes: bool,
    ) -> Self {
        let custom_attributes = (!skip_custom_attributes).then(|| {
            keys.iter()
                .map(|(field, key)| (key.to_string(), submission.get(field).to_string()))
                .collect()
        });

        ContactPayload {
            role: LEAD_ROLE,
            email: submission.email.clone(),
            custom_attributes,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ContactRef {
    pub id: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TicketPayload {
    pub ticket_type_id: String,
    pub contacts: Vec<ContactRef>,
    pub ticket_attributes: IndexMap<String, String>,
    #[serde(skip)]
    extra_keys: Vec<String>,
}

impl TicketPayload {
    /// Ticket linked to exactly one, already upserted, contact.
    pub fn new(
        ticket_type_id: &str,
        contact_id: &str,
        submission: &FormSubmission,
        keys: &AttributeKeys,
    ) -> Self {
        let extras = extra_ticket_attributes(submission, keys);
        let extra_keys = extras.keys().cloned().collect();

        let mut ticket_attributes = IndexMap::new();
        ticket_attributes.insert(DEFAULT_TITLE_KEY.to_string(), title(submission));
        ticket_attributes.insert(DEFAULT_DESCRIPTION_KEY.to_string(), description(submission));
        // Configured extras win over the defaults on a key clash
        ticket_attributes.extend(extras);

        TicketPayload {
            ticket_type_id: ticket_type_id.to_string(),
            contacts: vec![ContactRef {
                id: contact_id.to_string(),
            }],
            ticket_attributes,
            extra_keys,
        }
    }

    /// Attribute keys set beyond the default title and description.
    pub fn extra_keys(&self) -> &[String] {
        &self.extra_keys
    }
}

pub fn title(submission: &FormSubmission) -> String {
    if submission.theme.is_empty() {
        TITLE.to_string()
    } else {
        format!("{TITLE} - {}", submission.theme)
    }
}

pub fn description(submission: &FormSubmission) -> String {
    let or_placeholder = |value: &str| {
        if value.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            value.to_string()
        }
    };

    [
        format!("Store URL: {}", submission.store_url),
        format!("Theme: {}", or_placeholder(&submission.theme)),
        format!(
            "Collaborator code: {}",
            or_placeholder(&submission.collaborator_code)
        ),
        format!(
            "Video/Screenshot link: {}",
            or_placeholder(&submission.media_link)
        ),
        String::new(),
        "Message:".to_string(),
        submission.message.clone(),
    ]
    .join("\n")
}

/// Only fields with both a configured key and a value become ticket attributes.
pub fn extra_ticket_attributes(
    submission: &FormSubmission,
    keys: &AttributeKeys,
) -> IndexMap<String, String> {
    keys.iter()
        .filter_map(|(field, key)| {
            let value = submission.get(field);
            (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FormField, KeyOverrides};
    use serde_json::json;

    fn minimal() -> FormSubmission {
        FormSubmission {
            email: "a@b.com".into(),
            store_url: "https://shop.example".into(),
            message: "Help!".into(),
            ..Default::default()
        }
    }

    fn complete() -> FormSubmission {
        FormSubmission {
            theme: "Dawn".into(),
            collaborator_code: "1234".into(),
            media_link: "https://loom.example/v/1".into(),
            ..minimal()
        }
    }

    fn keys(pairs: &[(FormField, &str)]) -> AttributeKeys {
        let overrides: KeyOverrides = pairs
            .iter()
            .map(|(field, key)| (*field, Some(key.to_string())))
            .collect();
        AttributeKeys::default().with_overrides(&overrides)
    }

    #[test]
    fn test_description_with_placeholders() {
        let text = description(&minimal());
        assert_eq!(
            text,
            "Store URL: https://shop.example\n\
             Theme: -\n\
             Collaborator code: -\n\
             Video/Screenshot link: -\n\
             \n\
             Message:\n\
             Help!"
        );
        assert_eq!(text, description(&minimal()));
    }

    #[test]
    fn test_description_complete() {
        let text = description(&complete());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "Theme: Dawn");
        assert_eq!(lines[2], "Collaborator code: 1234");
        assert_eq!(lines[3], "Video/Screenshot link: https://loom.example/v/1");
    }

    #[test]
    fn test_title() {
        assert_eq!(title(&minimal()), "Support request");
        assert_eq!(title(&complete()), "Support request - Dawn");
    }

    #[test]
    fn test_contact_payload_uses_configured_keys() {
        let payload = ContactPayload::new(&complete(), &AttributeKeys::contact_defaults(), false);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "role": "lead",
                "email": "a@b.com",
                "custom_attributes": {
                    "store_url": "https://shop.example",
                    "theme": "Dawn",
                    "collaborator_code": "1234",
                    "media_link": "https://loom.example/v/1",
                },
            })
        );

        let payload = ContactPayload::new(
            &complete(),
            &keys(&[(FormField::StoreUrl, "store-url")]),
            false,
        );
        assert_eq!(
            serde_json::to_value(&payload).unwrap()["custom_attributes"],
            json!({"store-url": "https://shop.example"})
        );
    }

    #[test]
    fn test_contact_payload_skip_attributes() {
        let payload = ContactPayload::new(&complete(), &AttributeKeys::contact_defaults(), true);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"role": "lead", "email": "a@b.com"})
        );
    }

    #[test]
    fn test_extra_attributes_need_key_and_value() {
        let ticket_keys = keys(&[
            (FormField::Theme, "Theme"),
            (FormField::MediaLink, "Video link"),
        ]);

        let extras = extra_ticket_attributes(&complete(), &ticket_keys);
        assert_eq!(
            extras.into_iter().collect::<Vec<_>>(),
            vec![
                ("Theme".to_string(), "Dawn".to_string()),
                ("Video link".to_string(), "https://loom.example/v/1".to_string()),
            ]
        );

        // Configured keys with empty values are left out
        assert!(extra_ticket_attributes(&minimal(), &ticket_keys).is_empty());
    }

    #[test]
    fn test_ticket_payload() {
        let ticket_keys = keys(&[(FormField::CollaboratorCode, "Collaborator")]);
        let payload = TicketPayload::new("99", "contact-1", &complete(), &ticket_keys);

        assert_eq!(payload.extra_keys(), ["Collaborator".to_string()]);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["ticket_type_id"], "99");
        assert_eq!(value["contacts"], json!([{"id": "contact-1"}]));
        assert_eq!(
            value["ticket_attributes"]["_default_title_"],
            "Support request - Dawn"
        );
        assert_eq!(value["ticket_attributes"]["Collaborator"], "1234");
        assert_eq!(value["ticket_attributes"].as_object().unwrap().len(), 3);
    }
}

use crate::config::{AttributeKeys, HelpdeskConfig};
use crate::errors::RelayError;
use crate::helpdesk::HelpdeskApi;
use crate::payload::{ContactPayload, TicketPayload};
use crate::submission::FormSubmission;
use serde_json::{Value, json};
use std::sync::Arc;

/// Result of a relayed submission.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayOutcome {
    pub contact_id: String,
    pub ticket_id: String,
    /// Extra ticket attribute keys that were actually sent
    pub ticket_attributes_set: Vec<String>,
    /// Ticket as returned by the helpdesk
    pub ticket: Value,
}

impl RelayOutcome {
    pub fn to_body(&self) -> Value {
        json!({
            "ok": true,
            "contact_id": self.contact_id,
            "ticket_id": self.ticket_id,
            "ticket_attributes_set": self.ticket_attributes_set,
            "intercom": self.ticket,
        })
    }
}

/// Turns a form submission into a lead contact plus a ticket attached to it.
///
/// The two helpdesk calls run strictly in order: the ticket needs the id that
/// the contact upsert returns, so any failure there ends the submission. A
/// failed ticket leaves the contact in place.
pub struct RequestRelay {
    helpdesk: Arc<dyn HelpdeskApi>,
    config: HelpdeskConfig,
    contact_keys: AttributeKeys,
    ticket_keys: AttributeKeys,
}

impl RequestRelay {
    pub fn new(helpdesk: Arc<dyn HelpdeskApi>, config: HelpdeskConfig) -> Self {
        let contact_keys = config.contact_keys();
        let ticket_keys = config.ticket_keys();

        RequestRelay {
            helpdesk,
            config,
            contact_keys,
            ticket_keys,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.has_credentials()
    }

    pub async fn submit(&self, submission: &FormSubmission) -> Result<RelayOutcome, RelayError> {
        submission.validate()?;

        let access_token = self
            .config
            .access_token()
            .ok_or(RelayError::Config("helpdesk.access_token"))?;
        let ticket_type_id = self
            .config
            .ticket_type_id()
            .ok_or(RelayError::Config("helpdesk.ticket_type_id"))?;

        let contact_id = self.upsert_contact(access_token, submission).await?;
        self.create_ticket(access_token, ticket_type_id, contact_id, submission)
            .await
    }

    async fn upsert_contact(
        &self,
        access_token: &str,
        submission: &FormSubmission,
    ) -> Result<String, RelayError> {
        let payload = ContactPayload::new(
            submission,
            &self.contact_keys,
            self.config.skip_contact_attributes,
        );
        let response = self.helpdesk.upsert_contact(access_token, &payload).await?;

        if !response.is_success() {
            tracing::warn!(status = %response.status, "Contact upsert rejected");
            return Err(RelayError::ContactUpsert {
                status: response.status,
                details: response.body,
            });
        }

        match response.id(&["id"]) {
            Some(id) => Ok(id),
            None => {
                tracing::error!(status = %response.status, "Contact upsert returned no id");
                Err(RelayError::ContactUpsert {
                    status: response.status,
                    details: response.body,
                })
            }
        }
    }

    async fn create_ticket(
        &self,
        access_token: &str,
        ticket_type_id: &str,
        contact_id: String,
        submission: &FormSubmission,
    ) -> Result<RelayOutcome, RelayError> {
        let payload = TicketPayload::new(ticket_type_id, &contact_id, submission, &self.ticket_keys);
        let response = self.helpdesk.create_ticket(access_token, &payload).await?;

        let ticket_id = match response.id(&["ticket_id", "id"]) {
            Some(id) if response.is_success() => id,
            _ => {
                tracing::warn!(
                    status = %response.status,
                    contact_id = %contact_id,
                    "Ticket creation failed, contact kept"
                );
                return Err(RelayError::TicketCreation {
                    status: response.status,
                    details: response.body,
                    contact_id,
                });
            }
        };

        tracing::info!(
            contact_id = %contact_id,
            ticket_id = %ticket_id,
            extra_attributes = payload.extra_keys().len(),
            "Support ticket created"
        );

        Ok(RelayOutcome {
            contact_id,
            ticket_id,
            ticket_attributes_set: payload.extra_keys().to_vec(),
            ticket: response.body,
        })
    }
}

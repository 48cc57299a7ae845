pub mod config;
pub mod errors;
pub mod gate;
pub mod helpdesk;
pub mod http;
pub mod metrics_defs;
pub mod payload;
pub mod relay;
pub mod service;
pub mod submission;

#[cfg(test)]
mod testutils;

use helpdesk::IntercomClient;
use service::RelayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] config::ValidationError),

    #[error("could not build helpdesk client: {0}")]
    HelpdeskClient(#[from] reqwest::Error),
}

/// Runs the relay endpoint and the admin listener until either fails.
pub async fn run(config: config::Config) -> Result<(), ServerError> {
    config.validate()?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    if !config.helpdesk.has_credentials() {
        tracing::warn!(
            "Helpdesk access token or ticket type id is not configured, submissions will fail"
        );
    }

    let helpdesk = Arc::new(IntercomClient::new(&config.helpdesk)?);
    let relay_service = RelayService::new(&config, helpdesk);

    let readiness = relay_service.clone();
    let admin_service = AdminService::new(move || readiness.is_ready());

    tracing::info!(
        path = %config.path,
        helpdesk = %config.helpdesk.base_url,
        "Starting ticket relay"
    );

    let relay_task = run_http_service(&config.listener.host, config.listener.port, relay_service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}

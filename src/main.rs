#![allow(non_snake_case)]

use anyhow::Context;
use log::{info, warn};

use MailTriageDesk::config;
use MailTriageDesk::{AssistantApi, AssistantClient, DashboardController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    config::init_logging();

    let base = config::api_base_url().context("invalid ASSISTANT_API_URL")?;
    info!("Connecting to assistant backend at {}", base);

    let client = AssistantClient::new(base)?;
    match client.health().await {
        Ok(health) => info!(
            "Backend is {} (gemini available: {})",
            health.status, health.gemini_available
        ),
        Err(e) => warn!("Backend health check failed, continuing anyway: {}", e),
    }

    let controller = DashboardController::new(client, config::poll_interval());
    controller.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down");
    controller.stop().await;

    if let Some(summary) = controller.analytics().await {
        info!(
            "Final view: {} emails total, {} pending, {} resolved",
            summary.total_emails, summary.pending_emails, summary.resolved_emails
        );
    }
    for email in controller.emails().await.iter().take(3) {
        info!("  {}", email);
    }
    Ok(())
}

//! Follow the real-time channel and log what it reconciles.

use shopfront_state::{StateConfig, StoreEvent, Storefront};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::CommandError;

/// Connect, hydrate, and log store events until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded.
pub async fn run(admin: bool) -> Result<(), CommandError> {
    let storefront = Storefront::new(StateConfig::from_env()?);
    info!(session = %storefront.session(), admin, "Starting watch");

    match storefront.refresh_catalog().await {
        Ok(products) => info!(count = products.len(), "Catalog loaded"),
        Err(e) => warn!(error = %e, "Initial catalog load failed"),
    }
    storefront.load_banners().await;
    if admin && let Err(e) = storefront.admin().load(storefront.api()).await {
        warn!(error = %e, "Initial admin load failed");
    }

    let mut events = storefront.events().subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let channel = storefront.realtime(admin);
    channel
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Interrupted, shutting down");
        })
        .await;

    storefront.flush().await;
    logger.abort();
    Ok(())
}

fn log_event(event: &StoreEvent) {
    match event {
        StoreEvent::Channel(state) => info!(%state, "Channel state"),
        StoreEvent::Reconciled { entity, action } => {
            info!(entity = ?entity, action = %action, "Change applied");
        }
        StoreEvent::Refetched => info!("Stores refreshed"),
        StoreEvent::Notice(notice) => info!(action = %notice.action, message = %notice.message, "Notice"),
    }
}

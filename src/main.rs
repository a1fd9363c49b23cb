use std::env;

use barber2go_client::{push, ClientContext, Config};
use tokio::sync::watch;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env();
    log::info!(
        "Starting Barber2Go client against {} (store {})",
        config.api_url,
        config.database_url
    );
    let context = ClientContext::connect(config).await?;

    if let Ok(raw) = env::var("PUSH_SUBSCRIPTION") {
        push::store_subscription(&context.db, &raw).await?;
    }

    let mut events = Box::pin(context.event_stream());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            log::debug!("Client event {} for booking {:?}", event.kind, event.booking_id);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                log::warn!("Could not listen for Ctrl-C: {err}");
                std::future::pending::<()>().await;
            }
        }
    });

    context.reminder_worker().run(shutdown_rx).await;
    Ok(())
}

use anyhow::Error;
use sms_relay::{router, AppState, RelayConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sms_relay=debug,tower_http=debug".into()),
        )
        .init();

    let config = RelayConfig::from_env()?;
    let state = AppState {
        topic_arn: config.topic_arn.clone(),
        publisher: config.publisher(),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;

    info!("SMS relay listening on http://{}", config.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

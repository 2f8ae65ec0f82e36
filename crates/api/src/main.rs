use rxstock_api::app::services::AppServices;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rxstock_observability::init();

    let jwt_secret = std::env::var("RXSTOCK_JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("RXSTOCK_JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let services = build_services().await?;
    let app = rxstock_api::app::build_app(services, jwt_secret);

    let bind_addr =
        std::env::var("RXSTOCK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Choose the ledger backend from the environment. `RXSTOCK_DATABASE_URL`
/// selects Postgres (when compiled in); otherwise the process keeps its
/// ledger in memory.
async fn build_services() -> anyhow::Result<AppServices> {
    #[cfg(feature = "postgres")]
    if let Ok(database_url) = std::env::var("RXSTOCK_DATABASE_URL") {
        tracing::info!("using postgres ledger store");
        return AppServices::postgres(&database_url).await;
    }

    tracing::info!("using in-memory ledger store");
    Ok(AppServices::in_memory())
}

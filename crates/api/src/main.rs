use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    netops_observability::init();

    let config = netops_api::config::ApiConfig::from_env();
    let (app, runtime) = netops_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    runtime.shutdown().await;
    Ok(())
}

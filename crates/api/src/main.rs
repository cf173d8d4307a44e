#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vendora_observability::init();

    let app = vendora_api::app::build_app().await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

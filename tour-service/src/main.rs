use anyhow::Context;
use tour_service::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config)?;

    let store = MemoryStore::new();
    register_indexes(&store)
        .await
        .context("declaring unique indexes")?;

    // Mail is logged, not delivered
    let state = AppState::new(config.clone(), store)?;

    Server::new(config).serve(app(state)).await?;

    Ok(())
}

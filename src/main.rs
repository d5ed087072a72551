use anyhow::Context;
use solofile::config::Config;
use solofile::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();

    let dispatcher = server::prepare(&cfg)
        .await
        .with_context(|| format!("cannot serve {} on {}", cfg.file.display(), cfg.service))?;

    let stats = dispatcher.stats();

    tokio::select! {
        res = dispatcher.run() => {
            res.context("server stopped")?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!(workers = %stats, "Shutdown signal received");
        }
    }

    Ok(())
}

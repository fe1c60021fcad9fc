use anyhow::Context;
use tokio::io::BufReader;

use minimart_app::run_batch;
use minimart_infra::repository::{InMemoryRepository, PostgresRepository, Repository};
use minimart_infra::seed::seed_catalog;
use minimart_infra::{EngineConfig, OrderLifecycleService, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            minimart_observability::init();
            tracing::error!(error = %err, "invalid configuration");
            return Err(err.into());
        }
    };
    minimart_observability::init_with_default(&config.log_filter);

    match &config.backend {
        StoreBackend::InMemory { seed } => {
            let repo = InMemoryRepository::new();
            if *seed {
                seed_catalog(&repo).await.context("failed to seed catalog")?;
            } else {
                tracing::warn!("MINIMART_SEED=false; in-memory store starts empty");
            }
            run(OrderLifecycleService::from_config(repo, &config)).await
        }
        StoreBackend::Postgres { database_url } => {
            let repo = PostgresRepository::connect(database_url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            repo.migrate().await.context("failed to apply schema")?;
            tracing::info!("using postgres store");
            run(OrderLifecycleService::from_config(repo, &config)).await
        }
    }
}

async fn run<R: Repository>(service: OrderLifecycleService<R>) -> anyhow::Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    let summary = run_batch(&service, input, tokio::io::stdout()).await?;
    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, "some commands failed");
    }
    Ok(())
}

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use bot_core::config::Config;
use bot_core::deps::Deps;
use bot_core::jobs::{AsyncLoggingHandler, JobRunner, TokioJobQueue};
use bot_core::mob::workflow::{build_dispatcher, CountDownHandler, COUNT_DOWN_JOB};
use bot_core::routes::{self, AppState};
use bot_core::slack::{ReqwestResponseUrl, SlackApiClient};

use slack_dispatch::{
    CredentialStore, InMemoryCredentialStore, InMemoryIdempotencyCache, JobQueue,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let credentials = Arc::new(InMemoryCredentialStore::new());
    credentials.set("SLACK_BOT_TOKEN", &config.bot_token).await?;

    let runner = Arc::new(JobRunner::new());
    let jobs: Arc<dyn JobQueue> = Arc::new(TokioJobQueue::new(runner.clone()));

    let deps = Arc::new(Deps {
        slack: Arc::new(SlackApiClient::new(&config.bot_token)),
        response_url: Arc::new(ReqwestResponseUrl::new()),
        jobs: jobs.clone(),
        cache: Arc::new(InMemoryIdempotencyCache::new()),
        credentials,
        config: config.clone(),
    });

    runner.register(COUNT_DOWN_JOB, Arc::new(CountDownHandler { deps: deps.clone() }));
    runner.register("async_logging", Arc::new(AsyncLoggingHandler));

    let dispatcher = Arc::new(build_dispatcher(deps));
    let app = routes::router(AppState { dispatcher, jobs });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, command = %config.slash_command, "bot listening");
    axum::serve(listener, app).await?;

    Ok(())
}

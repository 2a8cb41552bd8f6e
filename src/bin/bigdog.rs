use std::sync::Arc;

use anyhow::Context;
use bigdog::{
    actors::check_in::CheckInHandle,
    config::Config,
    dispatch::{Dispatch, HttpDispatcher},
    fleet::initialize_fleet,
    throttle::Throttle,
};
use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("bigdog", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env()?;
    trace!("started with config: {config:?}");

    let seed = config
        .seed
        .unwrap_or_else(|| Utc::now().timestamp().unsigned_abs());
    info!("seeding random source with {seed}");
    let mut rng = StdRng::seed_from_u64(seed);

    let dispatcher: Arc<dyn Dispatch> =
        Arc::new(HttpDispatcher::new(&config).context("failed to build HTTP client")?);
    let throttle = Throttle::new(&config.throttle);

    let (fleet, registration) = initialize_fleet(
        &config.fleet,
        &config.vocabulary,
        dispatcher.clone(),
        &throttle,
        &mut rng,
    )
    .await;

    tokio::spawn(async move {
        let summary = registration.wait().await;
        info!(
            "tag registration finished: {}/{} accepted",
            summary.succeeded, summary.attempted
        );
    });

    let check_in = CheckInHandle::spawn(
        fleet,
        dispatcher,
        throttle,
        config.check_in.clone(),
        config.bounds,
        rng,
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down, waiting for in-flight submissions");
    check_in.shutdown().await?;

    Ok(())
}

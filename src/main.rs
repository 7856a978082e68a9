use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use movie_cache::api::{AppState, MovieCache, build_router};
use movie_cache::config::Config;
use movie_cache::database::seed::{DataLoader, LoadEvent};
use movie_cache::database::{InMemoryTable, KeyValueStore, MovieRepository};
use movie_cache::middleware::{LoggerMiddleware, from_middleware};
use movie_cache::security::CorsMiddleware;
use movie_cache::{Request, Server, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    config.validate()?;
    telemetry::init(config.log_level, config.log_format)?;

    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryTable::with_options(config.store_options()));
    let status = DataLoader::new(Arc::clone(&store))
        .handle(LoadEvent::Create)
        .await?;
    info!(%status, "backing store seeded");

    let cache = MovieCache::new(config.cache_config());
    if let Some(every) = config.janitor_interval() {
        cache.spawn_janitor(every);
    }
    if config.fault_injection {
        warn!("fault injection enabled, every store read will fail");
    }

    let state = Arc::new(AppState::new(
        cache,
        MovieRepository::new(store),
        config.route_options(),
    ));

    let mut router = build_router(state);
    router.layer(from_middleware(Arc::new(LoggerMiddleware)));
    router.layer(from_middleware(Arc::new(CorsMiddleware::new().allow_origin("*"))));
    let router = Arc::new(router);

    info!(
        ttl_secs = config.cache_ttl_secs,
        capacity = config.cache_capacity,
        cache_enabled = config.cache_enabled,
        "cache configured"
    );

    let server = Server::bind(&config.bind).await?;
    server
        .run_until(
            move |req: Request| {
                let router = Arc::clone(&router);
                async move { router.route(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for Ctrl-C, serving until killed");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    info!("movie-cache stopped");
    Ok(())
}

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use tollgate::api;
use tollgate::config::Config;
use tollgate::esl::{EngineServices, EslCluster};
use tollgate::services::{
    sweeper::SWEEP_INTERVAL, CallRegistry, CdrGenerator, DashboardGateway, Ledger,
    RatingEngine, ReservationSweeper,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting tollgate billing engine");

    let config = Config::from_env().context("failed to load configuration")?;
    info!("Environment: {}", config.environment);

    let gateway = match &config.dashboard_url {
        Some(url) => {
            info!("Dashboard gateway: {}", url);
            Some(Arc::new(
                DashboardGateway::new(url).context("failed to build dashboard gateway")?,
            ))
        }
        None => {
            info!("No dashboard configured, running standalone");
            None
        }
    };

    let registry = Arc::new(CallRegistry::new());
    let ledger = Arc::new(Ledger::new());
    let rating = Arc::new(RatingEngine::new(Vec::new()));
    let cdr = Arc::new(CdrGenerator::new(
        ledger.clone(),
        rating.clone(),
        gateway.clone(),
    ));

    let services = EngineServices {
        registry: registry.clone(),
        ledger: ledger.clone(),
        rating: rating.clone(),
        cdr,
        gateway,
    };

    if !config.freeswitch_servers.is_empty() {
        EslCluster::new(config.freeswitch_servers.clone(), services).start();
        info!(
            "Event socket cluster started ({} servers)",
            config.freeswitch_servers.len()
        );
    } else {
        info!("No event socket servers configured");
    }

    let _sweeper = ReservationSweeper::spawn(ledger.clone(), SWEEP_INTERVAL);

    let bind_address = format!("{}:{}", config.host, config.port);
    info!("Starting HTTP server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(ledger.clone()))
            .app_data(web::Data::new(rating.clone()))
            .configure(api::routes::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
    .context("HTTP server failed")
}

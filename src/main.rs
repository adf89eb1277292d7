use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::{info, warn};
use std::io;
use std::sync::Arc;

use globchess::clock::{Clock, SystemClock};
use globchess::config::Config;
use globchess::game::HttpEvaluator;
use globchess::models::AppState;
use globchess::routes::configure_routes;
use globchess::services::{GameService, Settings};
use globchess::store::{MemoryStore, Store};
use globchess::websocket::{spawn_relay, Hub, HubAnnouncer};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().map_err(io::Error::other)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new(clock.clone()));
    let evaluator = HttpEvaluator::new(config.evaluator.url.clone(), config.evaluator_timeout())
        .map_err(io::Error::other)?;
    let hub = Arc::new(Hub::new());

    let service = GameService::new(
        store,
        clock,
        Arc::new(evaluator),
        Arc::new(HubAnnouncer::new(hub.clone())),
        Settings::from(&config),
    );
    let game = service.bootstrap().await.map_err(io::Error::other)?;
    info!("Board ready at {}", game.fen);

    spawn_relay(hub.clone(), service.subscribe());

    if config.tokens.credit_secret.is_none() {
        warn!("No credit secret configured; anyone can credit tokens");
    }
    let app_state = web::Data::new(AppState::new(service, hub, &config));
    info!("Starting globchess server at http://{}", config.server.bind);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(configure_routes)
    })
    .bind(&config.server.bind)?
    .run()
    .await
}

mod config;
mod inference;
mod routes;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::ServerConfig;
use inference::model::ModelState;
use routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServerConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e)
    })?;
    log::info!("Configuration: {:?}", config);

    // A missing model is served as a per-request error rather than aborting startup.
    let model = ModelState::load(&config);
    if !model.is_loaded() {
        log::warn!("Serving without a model; /predict will answer with errors until restart");
    }
    let model = web::Data::new(model);

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(routes::cors())
            .app_data(model.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}

mod config;
mod databases;
mod errors;
mod routes;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use env_logger::Env;

use crate::config::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env()?;
    let store = web::Data::new(databases::setup_backend(&cfg).await?);

    log::info!("Starting server at {}:{}", cfg.host, cfg.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(store.clone())
            .configure(routes::messages::init)
    })
    .bind((cfg.host.as_str(), cfg.port))?
    .run()
    .await?;

    Ok(())
}

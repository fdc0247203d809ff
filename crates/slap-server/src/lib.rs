//! SlapHard backend server.
//!
//! Wires the room hub, the store (redis or in-memory), and the optional
//! postgres journal into a single actix-web application exposing `/health`
//! and the `/ws` game socket.
//!
//! ## Submodules
//!
//! - [`config`] — environment contract, read once at startup
//! - [`session`] — websocket upgrade and per-socket pump
mod config;
mod session;

pub use config::*;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;
use slap_database::PgJournal;
use slap_room::Hub;
use slap_room::Journal;
use slap_room::MemoryStore;
use slap_room::RedisStore;
use slap_room::RoomStore;
use std::sync::Arc;
use tokio_postgres::Client;

async fn health(db: web::Data<Option<Arc<Client>>>) -> impl Responder {
    match db.get_ref() {
        Some(client) => match client
            .execute("SELECT 1", &[])
            .await
            .inspect_err(|e| log::error!("health check failed: {}", e))
        {
            Ok(_) => HttpResponse::Ok().body("ok"),
            Err(_) => HttpResponse::ServiceUnavailable().body("database unavailable"),
        },
        None => HttpResponse::Ok().body("ok"),
    }
}

fn cors(origins: &[String]) -> Cors {
    match origins.is_empty() {
        // development fallback; production refuses to boot without origins
        true => Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header(),
        false => origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header(),
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let store: Arc<dyn RoomStore> = match &config.redis_url {
        Some(url) => {
            log::info!("using redis room store");
            Arc::new(RedisStore::connect(url).map_err(|e| anyhow::anyhow!("{}", e))?)
        }
        None if config.allow_memory_store => {
            log::info!("using in-memory room store");
            Arc::new(MemoryStore::new())
        }
        None => anyhow::bail!("set REDIS_URL or opt in with ALLOW_IN_MEMORY_ROOM_STORE=true"),
    };
    let (journal, db) = match config.persistence_enabled {
        true => {
            let client = slap_database::db().await?;
            slap_database::migrate(&client).await?;
            let journal = Journal::new(Arc::new(PgJournal::new(client.clone())));
            (Some(journal), Some(client))
        }
        false => {
            log::info!("db persistence disabled");
            (None, None)
        }
    };
    let hub = web::Data::from(Hub::new(store, journal));
    let db = web::Data::new(db);
    let origins = config.cors_origins.clone();
    log::info!("starting server on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(cors(&origins))
            .app_data(hub.clone())
            .app_data(db.clone())
            .route("/health", web::get().to(health))
            .route("/ws", web::get().to(session::connect))
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;
    Ok(())
}

use actix_web::{web::Data, App, HttpServer};
use log::{log, Level};
use sqlx::postgres::PgPoolOptions;

use studyhall_backend::app::{configure_app, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = std::env::var("HOST").unwrap_or_else(|_| {
        log!(Level::Info, "HOST not set, using 0.0.0.0");
        "0.0.0.0".to_string()
    });
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or_else(|| {
            log!(Level::Info, "PORT not set, using 8080");
            8080
        });

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&db)
        .await
        .expect("Failed to run migrations");

    log!(Level::Info, "Listening on {host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(AppState { db: db.clone() }))
            .configure(configure_app)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

use actix_web::{get, HttpResponse, Responder};

use crate::schema::api::HealthResponse;

pub mod contributions;
pub mod db;
pub mod error;
pub mod moderation;
pub mod votes;

#[get("/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

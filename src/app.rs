use actix_web::web::{self, ServiceConfig};
use sqlx::PgPool;

use crate::api;

pub struct AppState {
    pub db: PgPool,
}

pub fn configure_app(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(api::votes::cast_vote)
            .service(api::votes::list_votes)
            .service(api::votes::vote_stats)
            .service(api::votes::user_vote)
            .service(api::votes::remove_vote)
            .service(api::moderation::create_report)
            .service(api::moderation::list_reports)
            .service(api::moderation::list_queue)
            .service(api::moderation::decide)
            .service(api::moderation::stats)
            .service(api::contributions::submit)
            .service(api::contributions::for_post)
            .service(api::contributions::moderate)
            .service(api::contributions::leaderboard),
    )
    .service(api::healthz);
}

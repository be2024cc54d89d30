use actix_web::{
    get, post, put,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use log::{log, Level};
use uuid::Uuid;

use crate::{
    api::db::{commit_transaction, open_transaction},
    api::error::ApiError,
    app::AppState,
    auth::{ActingUser, GatewayAuth},
    schema::api::{CreateReport, ModerationDecision, QueueFilterParams, ReportFilterParams},
    services::moderation,
};

#[post("/moderation/reports", wrap = "GatewayAuth::enabled()")]
pub async fn create_report(
    state: Data<AppState>,
    body: Json<CreateReport>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    log!(Level::Info, "POST /api/v1/moderation/reports");

    let mut transaction = open_transaction(&state.db).await?;
    let report = moderation::file_report(&user, &body, &mut transaction).await?;
    commit_transaction(transaction).await?;

    Ok(HttpResponse::Created().json(report))
}

#[get("/moderation/reports", wrap = "GatewayAuth::staff_only()")]
pub async fn list_reports(
    state: Data<AppState>,
    params: Query<ReportFilterParams>,
) -> Result<HttpResponse, ApiError> {
    let page = moderation::list_reports(&params, &state.db).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/moderation/queue", wrap = "GatewayAuth::staff_only()")]
pub async fn list_queue(
    state: Data<AppState>,
    params: Query<QueueFilterParams>,
) -> Result<HttpResponse, ApiError> {
    let page = moderation::list_queue(&params, &state.db).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[put("/moderation/queue/{id}/moderate", wrap = "GatewayAuth::staff_only()")]
pub async fn decide(
    state: Data<AppState>,
    path: Path<(Uuid,)>,
    body: Json<ModerationDecision>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    let (queue_id,) = path.into_inner();
    log!(Level::Info, "PUT /api/v1/moderation/queue/{queue_id}/moderate");

    let mut transaction = open_transaction(&state.db).await?;
    let entry = moderation::decide(&user, queue_id, &body, &mut transaction).await?;
    commit_transaction(transaction).await?;

    Ok(HttpResponse::Ok().json(entry))
}

#[get("/moderation/stats", wrap = "GatewayAuth::staff_only()")]
pub async fn stats(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = moderation::moderation_stats(&state.db).await?;
    Ok(HttpResponse::Ok().json(stats))
}

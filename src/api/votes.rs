use actix_web::{
    delete, get, post,
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
    schema::api::{CreateVote, VoteFilterParams},
    schema::db::TargetKind,
    services::votes,
};

#[post("/votes", wrap = "GatewayAuth::enabled()")]
pub async fn cast_vote(
    state: Data<AppState>,
    body: Json<CreateVote>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    log!(Level::Info, "POST /api/v1/votes");

    let mut transaction = open_transaction(&state.db).await?;
    let outcome = votes::cast_vote(&user, &body, &mut transaction).await?;
    commit_transaction(transaction).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

#[delete("/votes/{target_type}/{target_id}", wrap = "GatewayAuth::enabled()")]
pub async fn remove_vote(
    state: Data<AppState>,
    path: Path<(TargetKind, Uuid)>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    let (target_type, target_id) = path.into_inner();
    log!(Level::Info, "DELETE /api/v1/votes");

    let mut transaction = open_transaction(&state.db).await?;
    let outcome = votes::remove_vote(&user, target_type, target_id, &mut transaction).await?;
    commit_transaction(transaction).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/votes", wrap = "GatewayAuth::enabled()")]
pub async fn list_votes(
    state: Data<AppState>,
    params: Query<VoteFilterParams>,
) -> Result<HttpResponse, ApiError> {
    let page = votes::list_votes(&params, &state.db).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/votes/stats/{target_type}/{target_id}", wrap = "GatewayAuth::enabled()")]
pub async fn vote_stats(
    state: Data<AppState>,
    path: Path<(TargetKind, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (target_type, target_id) = path.into_inner();
    let stats = votes::vote_stats(target_type, target_id, &state.db).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/votes/user/{target_type}/{target_id}", wrap = "GatewayAuth::enabled()")]
pub async fn user_vote(
    state: Data<AppState>,
    path: Path<(TargetKind, Uuid)>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    let (target_type, target_id) = path.into_inner();
    let vote = votes::user_vote(&user, target_type, target_id, &state.db).await?;
    Ok(HttpResponse::Ok().json(vote))
}

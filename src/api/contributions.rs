use actix_web::{
    get, patch, post,
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
    schema::api::{
        ContributionListParams, CreateContribution, LeaderboardParams, ModerateContribution,
    },
    services::contributions,
};

#[post("/posts/{id}/contributions", wrap = "GatewayAuth::enabled()")]
pub async fn submit(
    state: Data<AppState>,
    path: Path<(Uuid,)>,
    body: Json<CreateContribution>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    let (post_id,) = path.into_inner();
    log!(Level::Info, "POST /api/v1/posts/{post_id}/contributions");

    let mut transaction = open_transaction(&state.db).await?;
    let contribution = contributions::submit(&user, post_id, &body, &mut transaction).await?;
    commit_transaction(transaction).await?;

    Ok(HttpResponse::Created().json(contribution))
}

#[get("/posts/{id}/contributions", wrap = "GatewayAuth::enabled()")]
pub async fn for_post(
    state: Data<AppState>,
    path: Path<(Uuid,)>,
    params: Query<ContributionListParams>,
) -> Result<HttpResponse, ApiError> {
    let (post_id,) = path.into_inner();
    let contributions = contributions::for_post(post_id, params.status, &state.db).await?;
    Ok(HttpResponse::Ok().json(contributions))
}

#[patch("/posts/contributions/{id}/moderate", wrap = "GatewayAuth::staff_only()")]
pub async fn moderate(
    state: Data<AppState>,
    path: Path<(Uuid,)>,
    body: Json<ModerateContribution>,
    user: ActingUser,
) -> Result<HttpResponse, ApiError> {
    let (contribution_id,) = path.into_inner();
    log!(
        Level::Info,
        "PATCH /api/v1/posts/contributions/{contribution_id}/moderate"
    );

    let mut transaction = open_transaction(&state.db).await?;
    let contribution =
        contributions::moderate(&user, contribution_id, &body, &mut transaction).await?;
    commit_transaction(transaction).await?;

    Ok(HttpResponse::Ok().json(contribution))
}

#[get("/posts/contributors/stats", wrap = "GatewayAuth::enabled()")]
pub async fn leaderboard(
    state: Data<AppState>,
    params: Query<LeaderboardParams>,
) -> Result<HttpResponse, ApiError> {
    let period = params.period.unwrap_or_default();
    let stats = contributions::leaderboard(period, &state.db).await?;
    Ok(HttpResponse::Ok().json(stats))
}

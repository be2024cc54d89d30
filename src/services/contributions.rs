use log::{log, Level};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::ActingUser;
use crate::schema::api::{CreateContribution, LeaderboardResponse, ModerateContribution, StatsPeriod};
use crate::schema::db::{
    Contribution, ContributionKind, ContributorTotals, PostStatus, ReviewStatus, Role,
};

/// Fixed award per contribution kind, realized only on approval.
pub fn points_for(kind: ContributionKind) -> i32 {
    match kind {
        ContributionKind::Edit => 5,
        ContributionKind::AddExample => 10,
        ContributionKind::AddQuestion => 15,
    }
}

pub fn reputation_for(points: i32) -> i32 {
    points / 2
}

pub async fn submit(
    actor: &ActingUser,
    post_id: Uuid,
    body: &CreateContribution,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<Contribution, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::InvalidOperation(
            "Contribution content must not be empty",
        ));
    }

    let post: Option<(Uuid, PostStatus)> =
        sqlx::query_as("SELECT author_id, status FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut **transaction)
            .await?;
    let (author_id, status) = post.ok_or(ApiError::NotFound("Post not found"))?;
    if status != PostStatus::Published {
        return Err(ApiError::InvalidOperation(
            "Can only contribute to published posts",
        ));
    }
    if author_id == actor.id {
        return Err(ApiError::InvalidOperation(
            "Cannot contribute to your own post",
        ));
    }

    let contribution: Contribution = sqlx::query_as(
        "INSERT INTO contributions (id, post_id, contributor_id, kind, content, description)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(post_id)
    .bind(actor.id)
    .bind(body.kind)
    .bind(&body.content)
    .bind(&body.description)
    .fetch_one(&mut **transaction)
    .await?;
    log!(Level::Trace, "created contribution");
    Ok(contribution)
}

pub async fn moderate(
    actor: &ActingUser,
    contribution_id: Uuid,
    body: &ModerateContribution,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<Contribution, ApiError> {
    if body.status == ReviewStatus::Pending {
        return Err(ApiError::InvalidOperation(
            "Decision must be approved or rejected",
        ));
    }

    // The user store is the authority on the moderator's role, whatever the
    // gateway headers said.
    let role: Option<(Role,)> = sqlx::query_as("SELECT role FROM users WHERE id = $1")
        .bind(actor.id)
        .fetch_optional(&mut **transaction)
        .await?;
    match role {
        Some((role,)) if role.is_staff() => {}
        _ => {
            return Err(ApiError::Forbidden(
                "Only moderators can review contributions",
            ))
        }
    }

    let contribution: Option<Contribution> =
        sqlx::query_as("SELECT * FROM contributions WHERE id = $1 FOR UPDATE")
            .bind(contribution_id)
            .fetch_optional(&mut **transaction)
            .await?;
    let contribution = contribution.ok_or(ApiError::NotFound("Contribution not found"))?;
    if contribution.status != ReviewStatus::Pending {
        return Err(ApiError::InvalidOperation(
            "Contribution has already been moderated",
        ));
    }

    let approved = body.status == ReviewStatus::Approved;
    let points = if approved {
        points_for(contribution.kind)
    } else {
        0
    };

    let updated: Contribution = sqlx::query_as(
        "UPDATE contributions
         SET status = $1, moderator_id = $2, moderator_note = $3, points_awarded = $4,
             approved_at = CASE WHEN $5 THEN now() ELSE NULL END
         WHERE id = $6
         RETURNING *",
    )
    .bind(body.status)
    .bind(actor.id)
    .bind(&body.moderator_note)
    .bind(points)
    .bind(approved)
    .bind(contribution_id)
    .fetch_one(&mut **transaction)
    .await?;
    log!(Level::Trace, "decided contribution");

    if approved && points > 0 {
        sqlx::query(
            "UPDATE profiles SET points = points + $1, reputation = reputation + $2
             WHERE user_id = $3",
        )
        .bind(points)
        .bind(reputation_for(points))
        .bind(contribution.contributor_id)
        .execute(&mut **transaction)
        .await?;
        log!(Level::Trace, "awarded contributor points");
    }

    Ok(updated)
}

pub async fn for_post(
    post_id: Uuid,
    status: Option<ReviewStatus>,
    db: &PgPool,
) -> Result<Vec<Contribution>, ApiError> {
    let post: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(db)
        .await?;
    if post.is_none() {
        return Err(ApiError::NotFound("Post not found"));
    }

    let mut sql_query = QueryBuilder::new("SELECT * FROM contributions WHERE post_id = ");
    sql_query.push_bind(post_id);
    if let Some(status) = status {
        sql_query.push(" AND status = ");
        sql_query.push_bind(status);
    }
    sql_query.push(" ORDER BY created_at DESC");
    let contributions = sql_query
        .build_query_as::<Contribution>()
        .fetch_all(db)
        .await?;
    Ok(contributions)
}

pub async fn leaderboard(
    period: StatsPeriod,
    db: &PgPool,
) -> Result<LeaderboardResponse, ApiError> {
    let window = match period {
        StatsPeriod::Week => "7 days",
        StatsPeriod::Month => "1 month",
    };

    let sql = format!(
        "SELECT contributor_id,
                COUNT(*) AS contributions,
                COALESCE(SUM(points_awarded), 0)::bigint AS points
         FROM contributions
         WHERE status = 'approved' AND approved_at >= now() - interval '{window}'
         GROUP BY contributor_id
         ORDER BY points DESC, contributions DESC
         LIMIT 10"
    );
    let top_contributors: Vec<ContributorTotals> = sqlx::query_as(&sql).fetch_all(db).await?;

    let count_sql = format!(
        "SELECT COUNT(*) FROM contributions
         WHERE status = 'approved' AND approved_at >= now() - interval '{window}'"
    );
    let total_contributions: i64 = sqlx::query_scalar(&count_sql).fetch_one(db).await?;

    Ok(LeaderboardResponse {
        period,
        total_contributions,
        top_contributors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_table_is_fixed_by_kind() {
        assert_eq!(points_for(ContributionKind::Edit), 5);
        assert_eq!(points_for(ContributionKind::AddExample), 10);
        assert_eq!(points_for(ContributionKind::AddQuestion), 15);
    }

    #[test]
    fn reputation_is_half_rounded_down() {
        assert_eq!(reputation_for(5), 2);
        assert_eq!(reputation_for(10), 5);
        assert_eq!(reputation_for(15), 7);
        assert_eq!(reputation_for(0), 0);
    }
}

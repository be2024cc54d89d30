//! Vote ledger. One row per (voter, target); the upvote/downvote counters on
//! posts and comments are a cached projection of this table and every ledger
//! mutation pairs with its counter adjustment inside the caller's transaction.

use log::{log, Level};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::ActingUser;
use crate::schema::api::{
    page_window, CreateVote, Paginated, Pagination, VoteFilterParams, VoteOutcome,
};
use crate::schema::db::{TargetKind, Vote, VoteStats};

/// What a cast does to the ledger, decided from the current row state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VotePlan {
    Insert,
    Remove,
    Switch { previous: i16 },
}

pub fn plan_vote(existing: Option<i16>, requested: i16) -> VotePlan {
    match existing {
        None => VotePlan::Insert,
        Some(previous) if previous == requested => VotePlan::Remove,
        Some(previous) => VotePlan::Switch { previous },
    }
}

fn counter_column(value: i16) -> &'static str {
    if value > 0 {
        "upvotes"
    } else {
        "downvotes"
    }
}

fn target_table(target_type: TargetKind) -> &'static str {
    match target_type {
        TargetKind::Post => "posts",
        TargetKind::Comment => "comments",
    }
}

/// Locks the target row so concurrent casts against it serialize, and returns
/// its author.
async fn lock_target(
    target_type: TargetKind,
    target_id: Uuid,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<Uuid, ApiError> {
    let sql = format!(
        "SELECT author_id FROM {} WHERE id = $1 FOR UPDATE",
        target_table(target_type)
    );
    let author: Option<(Uuid,)> = sqlx::query_as(&sql)
        .bind(target_id)
        .fetch_optional(&mut **transaction)
        .await?;
    match author {
        Some((author_id,)) => Ok(author_id),
        None => Err(match target_type {
            TargetKind::Post => ApiError::NotFound("Post not found"),
            TargetKind::Comment => ApiError::NotFound("Comment not found"),
        }),
    }
}

async fn adjust_counter(
    target_type: TargetKind,
    target_id: Uuid,
    value: i16,
    delta: i32,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<(), ApiError> {
    let column = counter_column(value);
    let sql = format!(
        "UPDATE {} SET {column} = {column} + $1 WHERE id = $2",
        target_table(target_type)
    );
    sqlx::query(&sql)
        .bind(delta)
        .bind(target_id)
        .execute(&mut **transaction)
        .await?;
    Ok(())
}

pub async fn cast_vote(
    actor: &ActingUser,
    body: &CreateVote,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<VoteOutcome, ApiError> {
    if body.value != 1 && body.value != -1 {
        return Err(ApiError::InvalidOperation("Vote value must be 1 or -1"));
    }

    let author_id = lock_target(body.target_type, body.target_id, transaction).await?;
    if author_id == actor.id {
        return Err(ApiError::InvalidOperation("Cannot vote on your own content"));
    }

    let existing: Option<Vote> = sqlx::query_as(
        "SELECT * FROM votes WHERE user_id = $1 AND target_type = $2 AND target_id = $3",
    )
    .bind(actor.id)
    .bind(body.target_type)
    .bind(body.target_id)
    .fetch_optional(&mut **transaction)
    .await?;

    match plan_vote(existing.map(|vote| vote.value), body.value) {
        VotePlan::Insert => {
            let vote: Vote = sqlx::query_as(
                "INSERT INTO votes (id, user_id, target_type, target_id, value)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(actor.id)
            .bind(body.target_type)
            .bind(body.target_id)
            .bind(body.value)
            .fetch_one(&mut **transaction)
            .await?;
            adjust_counter(body.target_type, body.target_id, body.value, 1, transaction).await?;
            log!(Level::Trace, "recorded vote");
            Ok(VoteOutcome {
                message: "Vote recorded",
                vote: Some(vote),
            })
        }
        VotePlan::Remove => {
            sqlx::query("DELETE FROM votes WHERE user_id = $1 AND target_type = $2 AND target_id = $3")
                .bind(actor.id)
                .bind(body.target_type)
                .bind(body.target_id)
                .execute(&mut **transaction)
                .await?;
            adjust_counter(body.target_type, body.target_id, body.value, -1, transaction).await?;
            log!(Level::Trace, "removed vote on repeated cast");
            Ok(VoteOutcome {
                message: "Vote removed",
                vote: None,
            })
        }
        VotePlan::Switch { previous } => {
            let vote: Vote = sqlx::query_as(
                "UPDATE votes SET value = $1
                 WHERE user_id = $2 AND target_type = $3 AND target_id = $4
                 RETURNING *",
            )
            .bind(body.value)
            .bind(actor.id)
            .bind(body.target_type)
            .bind(body.target_id)
            .fetch_one(&mut **transaction)
            .await?;
            adjust_counter(body.target_type, body.target_id, previous, -1, transaction).await?;
            adjust_counter(body.target_type, body.target_id, body.value, 1, transaction).await?;
            log!(Level::Trace, "switched vote direction");
            Ok(VoteOutcome {
                message: "Vote updated",
                vote: Some(vote),
            })
        }
    }
}

pub async fn remove_vote(
    actor: &ActingUser,
    target_type: TargetKind,
    target_id: Uuid,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<VoteOutcome, ApiError> {
    // Same lock order as cast_vote. The target may already be gone (a
    // moderated comment); its ledger rows are still removable.
    match lock_target(target_type, target_id, transaction).await {
        Ok(_) | Err(ApiError::NotFound(_)) => {}
        Err(error) => return Err(error),
    }

    let removed: Option<(i16,)> = sqlx::query_as(
        "DELETE FROM votes WHERE user_id = $1 AND target_type = $2 AND target_id = $3
         RETURNING value",
    )
    .bind(actor.id)
    .bind(target_type)
    .bind(target_id)
    .fetch_optional(&mut **transaction)
    .await?;

    let (value,) = removed.ok_or(ApiError::NotFound("Vote not found"))?;
    adjust_counter(target_type, target_id, value, -1, transaction).await?;
    log!(Level::Trace, "removed vote");
    Ok(VoteOutcome {
        message: "Vote removed successfully",
        vote: None,
    })
}

pub async fn user_vote(
    actor: &ActingUser,
    target_type: TargetKind,
    target_id: Uuid,
    db: &PgPool,
) -> Result<Option<Vote>, ApiError> {
    let vote: Option<Vote> = sqlx::query_as(
        "SELECT * FROM votes WHERE user_id = $1 AND target_type = $2 AND target_id = $3",
    )
    .bind(actor.id)
    .bind(target_type)
    .bind(target_id)
    .fetch_optional(db)
    .await?;
    Ok(vote)
}

/// Reconciliation read: aggregates the ledger directly, bypassing the cached
/// counters.
pub async fn vote_stats(
    target_type: TargetKind,
    target_id: Uuid,
    db: &PgPool,
) -> Result<VoteStats, ApiError> {
    let stats: VoteStats = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE value = 1) AS upvotes,
                COUNT(*) FILTER (WHERE value = -1) AS downvotes,
                COUNT(*) AS total
         FROM votes
         WHERE target_type = $1 AND target_id = $2",
    )
    .bind(target_type)
    .bind(target_id)
    .fetch_one(db)
    .await?;
    Ok(stats)
}

pub async fn list_votes(
    filter: &VoteFilterParams,
    db: &PgPool,
) -> Result<Paginated<Vote>, ApiError> {
    let (page, limit, offset) = page_window(filter.page, filter.limit);

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM votes WHERE 1=1");
    filter.push_filters(&mut count_query);
    let total: i64 = count_query.build_query_scalar().fetch_one(db).await?;

    let mut sql_query = QueryBuilder::new("SELECT * FROM votes WHERE 1=1");
    filter.push_filters(&mut sql_query);
    sql_query.push(" ORDER BY created_at DESC LIMIT ");
    sql_query.push_bind(limit);
    sql_query.push(" OFFSET ");
    sql_query.push_bind(offset);
    let data = sql_query.build_query_as::<Vote>().fetch_all(db).await?;

    Ok(Paginated {
        data,
        pagination: Pagination::new(page, limit, total),
    })
}

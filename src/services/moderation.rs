use log::{log, Level};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::ActingUser;
use crate::schema::api::{
    page_window, CreateReport, ModerationDecision, ModerationStatsResponse, Paginated, Pagination,
    QueueFilterParams, ReportFilterParams,
};
use crate::schema::db::{QueueEntry, QueuePayload, Report, ReportTarget, ReviewStatus, TargetKind};
use crate::utils::is_valid_reason;

async fn ensure_target_exists(
    target_type: ReportTarget,
    target_id: Uuid,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<(), ApiError> {
    let (table, missing) = match target_type {
        ReportTarget::Post => ("posts", "Post not found"),
        ReportTarget::Comment => ("comments", "Comment not found"),
        ReportTarget::User => ("users", "User not found"),
    };
    let sql = format!("SELECT 1 FROM {table} WHERE id = $1");
    let found: Option<(i32,)> = sqlx::query_as(&sql)
        .bind(target_id)
        .fetch_optional(&mut **transaction)
        .await?;
    if found.is_none() {
        return Err(ApiError::NotFound(missing));
    }
    Ok(())
}

/// Guarded insert: a target with an open review gets no second entry, no
/// matter how many reports pile onto it. The partial unique index backstops
/// concurrent filers.
async fn enqueue_for_review(
    target_type: TargetKind,
    report: &Report,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<(), ApiError> {
    let payload = QueuePayload {
        report_id: Some(report.id),
        reason: Some(report.reason.clone()),
        review_reason: None,
    };
    let result = sqlx::query(
        "INSERT INTO moderation_queue (id, target_type, target_id, source, payload)
         SELECT $1, $2, $3, 'report', $4
         WHERE NOT EXISTS (
             SELECT 1 FROM moderation_queue
             WHERE target_type = $2 AND target_id = $3 AND status = 'pending'
         )
         ON CONFLICT DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(target_type)
    .bind(report.target_id)
    .bind(Json(payload))
    .execute(&mut **transaction)
    .await?;
    if result.rows_affected() == 0 {
        log!(Level::Trace, "target already has a pending review");
    } else {
        log!(Level::Trace, "enqueued target for review");
    }
    Ok(())
}

pub async fn file_report(
    actor: &ActingUser,
    body: &CreateReport,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<Report, ApiError> {
    if !is_valid_reason(&body.reason) {
        return Err(ApiError::InvalidOperation(
            "Reason must be at least 10 characters",
        ));
    }

    ensure_target_exists(body.target_type, body.target_id, transaction).await?;

    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM reports WHERE reporter_id = $1 AND target_type = $2 AND target_id = $3",
    )
    .bind(actor.id)
    .bind(body.target_type)
    .bind(body.target_id)
    .fetch_optional(&mut **transaction)
    .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("You have already reported this content"));
    }

    let report: Report = sqlx::query_as(
        "INSERT INTO reports (id, reporter_id, target_type, target_id, reason)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(actor.id)
    .bind(body.target_type)
    .bind(body.target_id)
    .bind(&body.reason)
    .fetch_one(&mut **transaction)
    .await?;
    log!(Level::Trace, "created report");

    if let Some(target_type) = body.target_type.reviewable() {
        enqueue_for_review(target_type, &report, transaction).await?;
    }

    Ok(report)
}

/// Removes the content a rejection refers to: posts fall back to draft and
/// disappear from readers, comments are deleted outright.
async fn remove_content(
    target_type: TargetKind,
    target_id: Uuid,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<(), ApiError> {
    match target_type {
        TargetKind::Post => {
            sqlx::query("UPDATE posts SET status = 'draft' WHERE id = $1")
                .bind(target_id)
                .execute(&mut **transaction)
                .await?;
            log!(Level::Trace, "demoted post to draft");
        }
        TargetKind::Comment => {
            sqlx::query("DELETE FROM comments WHERE id = $1")
                .bind(target_id)
                .execute(&mut **transaction)
                .await?;
            log!(Level::Trace, "deleted comment");
        }
    }
    Ok(())
}

pub async fn decide(
    actor: &ActingUser,
    queue_id: Uuid,
    decision: &ModerationDecision,
    transaction: &mut Transaction<'static, Postgres>,
) -> Result<QueueEntry, ApiError> {
    if decision.status == ReviewStatus::Pending {
        return Err(ApiError::InvalidOperation(
            "Decision must be approved or rejected",
        ));
    }

    let entry: Option<QueueEntry> =
        sqlx::query_as("SELECT * FROM moderation_queue WHERE id = $1 FOR UPDATE")
            .bind(queue_id)
            .fetch_optional(&mut **transaction)
            .await?;
    let entry = entry.ok_or(ApiError::NotFound("Moderation queue entry not found"))?;
    if entry.status != ReviewStatus::Pending {
        return Err(ApiError::InvalidOperation(
            "This entry has already been reviewed",
        ));
    }

    let mut payload = entry.payload.0.clone();
    payload.review_reason = decision.reason.clone();

    let updated: QueueEntry = sqlx::query_as(
        "UPDATE moderation_queue
         SET status = $1, reviewer_id = $2, decided_at = now(), payload = $3
         WHERE id = $4
         RETURNING *",
    )
    .bind(decision.status)
    .bind(actor.id)
    .bind(Json(payload))
    .bind(queue_id)
    .fetch_one(&mut **transaction)
    .await?;
    log!(Level::Trace, "decided queue entry");

    // "Rejected" upholds the report: the content comes down with the same
    // transaction as the queue update.
    if decision.status == ReviewStatus::Rejected {
        remove_content(entry.target_type, entry.target_id, transaction).await?;
    }

    Ok(updated)
}

pub async fn list_reports(
    filter: &ReportFilterParams,
    db: &PgPool,
) -> Result<Paginated<Report>, ApiError> {
    let (page, limit, offset) = page_window(filter.page, filter.limit);

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM reports WHERE 1=1");
    filter.push_filters(&mut count_query);
    let total: i64 = count_query.build_query_scalar().fetch_one(db).await?;

    let mut sql_query = QueryBuilder::new("SELECT * FROM reports WHERE 1=1");
    filter.push_filters(&mut sql_query);
    sql_query.push(" ORDER BY created_at DESC LIMIT ");
    sql_query.push_bind(limit);
    sql_query.push(" OFFSET ");
    sql_query.push_bind(offset);
    let data = sql_query.build_query_as::<Report>().fetch_all(db).await?;

    Ok(Paginated {
        data,
        pagination: Pagination::new(page, limit, total),
    })
}

pub async fn list_queue(
    filter: &QueueFilterParams,
    db: &PgPool,
) -> Result<Paginated<QueueEntry>, ApiError> {
    let (page, limit, offset) = page_window(filter.page, filter.limit);

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM moderation_queue WHERE 1=1");
    filter.push_filters(&mut count_query);
    let total: i64 = count_query.build_query_scalar().fetch_one(db).await?;

    let mut sql_query = QueryBuilder::new("SELECT * FROM moderation_queue WHERE 1=1");
    filter.push_filters(&mut sql_query);
    sql_query.push(" ORDER BY created_at DESC LIMIT ");
    sql_query.push_bind(limit);
    sql_query.push(" OFFSET ");
    sql_query.push_bind(offset);
    let data = sql_query
        .build_query_as::<QueueEntry>()
        .fetch_all(db)
        .await?;

    Ok(Paginated {
        data,
        pagination: Pagination::new(page, limit, total),
    })
}

pub async fn moderation_stats(db: &PgPool) -> Result<ModerationStatsResponse, ApiError> {
    let pending_moderations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM moderation_queue WHERE status = 'pending'")
            .fetch_one(db)
            .await?;
    let total_reports: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
        .fetch_one(db)
        .await?;
    let recent_decisions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM moderation_queue WHERE decided_at >= now() - interval '24 hours'",
    )
    .fetch_one(db)
    .await?;
    let by_type: Vec<(ReportTarget, i64)> =
        sqlx::query_as("SELECT target_type, COUNT(*) FROM reports GROUP BY target_type")
            .fetch_all(db)
            .await?;

    Ok(ModerationStatsResponse {
        pending_moderations,
        total_reports,
        recent_decisions,
        reports_by_type: by_type
            .into_iter()
            .map(|(target, count)| (target.label(), count))
            .collect(),
    })
}

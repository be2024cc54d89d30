//! End-to-end checks for the engagement workflows against a real Postgres.
//!
//! Ignored by default; point DATABASE_URL at a scratch database and run
//! `cargo test -- --ignored`.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use studyhall_backend::api::error::ApiError;
use studyhall_backend::auth::ActingUser;
use studyhall_backend::schema::api::{
    CreateContribution, CreateReport, CreateVote, ModerateContribution, ModerationDecision,
    QueueFilterParams,
};
use studyhall_backend::schema::db::{
    ContributionKind, ReportTarget, ReviewStatus, Role, TargetKind,
};
use studyhall_backend::services::{contributions, moderation, votes};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for integration tests");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!().run(&pool).await.expect("run migrations");
    pool
}

async fn create_user(pool: &PgPool, role: Role) -> ActingUser {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, role) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("user-{id}"))
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
    ActingUser { id, role }
}

async fn create_post(pool: &PgPool, author: &ActingUser) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO posts (id, author_id, title, status) VALUES ($1, $2, $3, 'published')")
        .bind(id)
        .bind(author.id)
        .bind("Intro to recursion")
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn create_comment(pool: &PgPool, post_id: Uuid, author: &ActingUser) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO comments (id, post_id, author_id, body) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(post_id)
        .bind(author.id)
        .bind("have you tried tail calls?")
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn counters(pool: &PgPool, table: &str, id: Uuid) -> (i32, i32) {
    let sql = format!("SELECT upvotes, downvotes FROM {table} WHERE id = $1");
    sqlx::query_as(&sql).bind(id).fetch_one(pool).await.unwrap()
}

async fn cast(pool: &PgPool, actor: &ActingUser, target_id: Uuid, value: i16) -> &'static str {
    let mut tx = pool.begin().await.unwrap();
    let outcome = votes::cast_vote(
        actor,
        &CreateVote {
            target_id,
            target_type: TargetKind::Post,
            value,
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    outcome.message
}

/// Cached counters must agree with the ledger after every mutation.
async fn assert_counters_match_ledger(pool: &PgPool, target_id: Uuid) {
    let stats = votes::vote_stats(TargetKind::Post, target_id, pool)
        .await
        .unwrap();
    let (upvotes, downvotes) = counters(pool, "posts", target_id).await;
    assert_eq!(i64::from(upvotes), stats.upvotes);
    assert_eq!(i64::from(downvotes), stats.downvotes);
    assert_eq!(stats.total, stats.upvotes + stats.downvotes);
}

#[actix_web::test]
#[ignore = "requires Postgres; run with --ignored"]
async fn vote_cycle_returns_counters_to_baseline() {
    let pool = pool().await;
    let author = create_user(&pool, Role::Member).await;
    let voter = create_user(&pool, Role::Member).await;
    let post = create_post(&pool, &author).await;

    assert_eq!(cast(&pool, &voter, post, 1).await, "Vote recorded");
    assert_eq!(counters(&pool, "posts", post).await, (1, 0));
    assert_counters_match_ledger(&pool, post).await;

    // Same direction again toggles off.
    assert_eq!(cast(&pool, &voter, post, 1).await, "Vote removed");
    assert_eq!(counters(&pool, "posts", post).await, (0, 0));
    assert_counters_match_ledger(&pool, post).await;

    assert_eq!(cast(&pool, &voter, post, -1).await, "Vote recorded");
    assert_eq!(counters(&pool, "posts", post).await, (0, 1));

    // Opposite direction switches in place, moving both counters by one.
    assert_eq!(cast(&pool, &voter, post, 1).await, "Vote updated");
    assert_eq!(counters(&pool, "posts", post).await, (1, 0));
    assert_counters_match_ledger(&pool, post).await;

    let mut tx = pool.begin().await.unwrap();
    votes::remove_vote(&voter, TargetKind::Post, post, &mut tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(counters(&pool, "posts", post).await, (0, 0));

    let mut tx = pool.begin().await.unwrap();
    let err = votes::remove_vote(&voter, TargetKind::Post, post, &mut tx)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[actix_web::test]
#[ignore = "requires Postgres; run with --ignored"]
async fn self_votes_are_rejected() {
    let pool = pool().await;
    let author = create_user(&pool, Role::Member).await;
    let post = create_post(&pool, &author).await;

    let mut tx = pool.begin().await.unwrap();
    let err = votes::cast_vote(
        &author,
        &CreateVote {
            target_id: post,
            target_type: TargetKind::Post,
            value: 1,
        },
        &mut tx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));
    assert_eq!(counters(&pool, "posts", post).await, (0, 0));
}

#[actix_web::test]
#[ignore = "requires Postgres; run with --ignored"]
async fn reports_dedup_and_share_one_queue_entry() {
    let pool = pool().await;
    let author = create_user(&pool, Role::Member).await;
    let first = create_user(&pool, Role::Member).await;
    let second = create_user(&pool, Role::Member).await;
    let post = create_post(&pool, &author).await;
    let comment = create_comment(&pool, post, &author).await;

    let body = CreateReport {
        target_type: ReportTarget::Comment,
        target_id: comment,
        reason: "spam with phishing links".into(),
    };

    let mut tx = pool.begin().await.unwrap();
    let report = moderation::file_report(&first, &body, &mut tx).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(report.reporter_id, first.id);

    // Same reporter, same target: conflict.
    let mut tx = pool.begin().await.unwrap();
    let err = moderation::file_report(&first, &body, &mut tx)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // A different reporter gets a report but no second queue entry.
    let mut tx = pool.begin().await.unwrap();
    moderation::file_report(&second, &body, &mut tx).await.unwrap();
    tx.commit().await.unwrap();

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM moderation_queue
         WHERE target_type = 'comment' AND target_id = $1 AND status = 'pending'",
    )
    .bind(comment)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(pending, 1);
}

#[actix_web::test]
#[ignore = "requires Postgres; run with --ignored"]
async fn rejecting_a_queue_entry_removes_the_comment_once() {
    let pool = pool().await;
    let author = create_user(&pool, Role::Member).await;
    let reporter = create_user(&pool, Role::Member).await;
    let reviewer = create_user(&pool, Role::Moderator).await;
    let post = create_post(&pool, &author).await;
    let comment = create_comment(&pool, post, &author).await;

    let mut tx = pool.begin().await.unwrap();
    moderation::file_report(
        &reporter,
        &CreateReport {
            target_type: ReportTarget::Comment,
            target_id: comment,
            reason: "harassment in replies".into(),
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let page = moderation::list_queue(
        &QueueFilterParams {
            target_type: Some(TargetKind::Comment),
            status: Some(ReviewStatus::Pending),
            ..Default::default()
        },
        &pool,
    )
    .await
    .unwrap();
    let entry = page
        .data
        .iter()
        .find(|entry| entry.target_id == comment)
        .expect("queue entry for reported comment");

    let mut tx = pool.begin().await.unwrap();
    let decided = moderation::decide(
        &reviewer,
        entry.id,
        &ModerationDecision {
            status: ReviewStatus::Rejected,
            reason: Some("confirmed harassment".into()),
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(decided.status, ReviewStatus::Rejected);
    assert_eq!(decided.reviewer_id, Some(reviewer.id));
    assert!(decided.decided_at.is_some());
    assert_eq!(
        decided.payload.0.review_reason.as_deref(),
        Some("confirmed harassment")
    );

    let gone: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE id = $1")
        .bind(comment)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(gone, 0);

    // Terminal states are immutable.
    let mut tx = pool.begin().await.unwrap();
    let err = moderation::decide(
        &reviewer,
        entry.id,
        &ModerationDecision {
            status: ReviewStatus::Approved,
            reason: None,
        },
        &mut tx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));
}

#[actix_web::test]
#[ignore = "requires Postgres; run with --ignored"]
async fn approving_a_contribution_awards_points_exactly_once() {
    let pool = pool().await;
    let author = create_user(&pool, Role::Member).await;
    let contributor = create_user(&pool, Role::Member).await;
    let moderator = create_user(&pool, Role::Moderator).await;
    let post = create_post(&pool, &author).await;

    // Authors cannot pad their own posts.
    let mut tx = pool.begin().await.unwrap();
    let err = contributions::submit(
        &author,
        post,
        &CreateContribution {
            kind: ContributionKind::Edit,
            content: "clarify the base case".into(),
            description: None,
        },
        &mut tx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    let mut tx = pool.begin().await.unwrap();
    let contribution = contributions::submit(
        &contributor,
        post,
        &CreateContribution {
            kind: ContributionKind::AddQuestion,
            content: "What happens for n = 0?".into(),
            description: Some("practice question".into()),
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(contribution.status, ReviewStatus::Pending);
    assert_eq!(contribution.points_awarded, 0);

    let mut tx = pool.begin().await.unwrap();
    let updated = contributions::moderate(
        &moderator,
        contribution.id,
        &ModerateContribution {
            status: ReviewStatus::Approved,
            moderator_note: Some("good question".into()),
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(updated.status, ReviewStatus::Approved);
    assert_eq!(updated.points_awarded, 15);
    assert!(updated.approved_at.is_some());

    let (points, reputation): (i32, i32) =
        sqlx::query_as("SELECT points, reputation FROM profiles WHERE user_id = $1")
            .bind(contributor.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(points, 15);
    assert_eq!(reputation, 7);

    // Already decided: no re-review, no double award.
    let mut tx = pool.begin().await.unwrap();
    let err = contributions::moderate(
        &moderator,
        contribution.id,
        &ModerateContribution {
            status: ReviewStatus::Rejected,
            moderator_note: None,
        },
        &mut tx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));

    let (points, _): (i32, i32) =
        sqlx::query_as("SELECT points, reputation FROM profiles WHERE user_id = $1")
            .bind(contributor.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(points, 15);
}

#[actix_web::test]
#[ignore = "requires Postgres; run with --ignored"]
async fn rejecting_a_contribution_awards_nothing() {
    let pool = pool().await;
    let author = create_user(&pool, Role::Member).await;
    let contributor = create_user(&pool, Role::Member).await;
    let moderator = create_user(&pool, Role::Admin).await;
    let plain = create_user(&pool, Role::Member).await;
    let post = create_post(&pool, &author).await;

    let mut tx = pool.begin().await.unwrap();
    let contribution = contributions::submit(
        &contributor,
        post,
        &CreateContribution {
            kind: ContributionKind::AddExample,
            content: "fibonacci(5) walkthrough".into(),
            description: None,
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    // Members cannot moderate, whatever the route guard saw.
    let mut tx = pool.begin().await.unwrap();
    let err = contributions::moderate(
        &plain,
        contribution.id,
        &ModerateContribution {
            status: ReviewStatus::Approved,
            moderator_note: None,
        },
        &mut tx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let mut tx = pool.begin().await.unwrap();
    let updated = contributions::moderate(
        &moderator,
        contribution.id,
        &ModerateContribution {
            status: ReviewStatus::Rejected,
            moderator_note: Some("duplicate of an existing example".into()),
        },
        &mut tx,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(updated.status, ReviewStatus::Rejected);
    assert_eq!(updated.points_awarded, 0);
    assert!(updated.approved_at.is_none());

    let (points, reputation): (i32, i32) =
        sqlx::query_as("SELECT points, reputation FROM profiles WHERE user_id = $1")
            .bind(contributor.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(points, 0);
    assert_eq!(reputation, 0);
}

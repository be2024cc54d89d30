use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "role_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    Member,
}

impl Role {
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "member" => Ok(Role::Member),
            _ => Err(()),
        }
    }
}

/// What a vote or queue entry points at. Reports can additionally target
/// users, see [`ReportTarget`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "target_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "report_target", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportTarget {
    Post,
    Comment,
    User,
}

impl ReportTarget {
    /// Reports against users never enter the review queue.
    pub fn reviewable(self) -> Option<TargetKind> {
        match self {
            ReportTarget::Post => Some(TargetKind::Post),
            ReportTarget::Comment => Some(TargetKind::Comment),
            ReportTarget::User => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportTarget::Post => "post",
            ReportTarget::Comment => "comment",
            ReportTarget::User => "user",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "queue_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueSource {
    Report,
    AutoSafety,
}

/// Shared by the moderation queue and contributions. A queue `Rejected` means
/// the report was upheld and the content comes down; a contribution
/// `Rejected` simply declines the proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "review_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "contribution_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Edit,
    AddExample,
    AddQuestion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_type: TargetKind,
    pub target_id: Uuid,
    pub value: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_type: ReportTarget,
    pub target_id: Uuid,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Free-form payload carried on a queue entry: where the entry came from and,
/// once decided, why.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueuePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: Uuid,
    pub target_type: TargetKind,
    pub target_id: Uuid,
    pub source: QueueSource,
    pub status: ReviewStatus,
    pub payload: Json<QueuePayload>,
    pub reviewer_id: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: Uuid,
    pub post_id: Uuid,
    pub contributor_id: Uuid,
    pub kind: ContributionKind,
    pub content: String,
    pub description: Option<String>,
    pub status: ReviewStatus,
    pub moderator_id: Option<Uuid>,
    pub moderator_note: Option<String>,
    pub points_awarded: i32,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate over the vote ledger itself, not the cached counters.
#[derive(Serialize, Debug, Clone, Copy, FromRow)]
pub struct VoteStats {
    pub upvotes: i64,
    pub downvotes: i64,
    pub total: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContributorTotals {
    pub contributor_id: Uuid,
    pub contributions: i64,
    pub points: i64,
}

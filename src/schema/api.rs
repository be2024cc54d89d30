use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::schema::db::{
    ContributionKind, ContributorTotals, QueueSource, ReportTarget, ReviewStatus, TargetKind, Vote,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalized (page, limit, offset) from raw query params.
pub fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1) * limit)
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateVote {
    pub target_id: Uuid,
    pub target_type: TargetKind,
    pub value: i16,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vote>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VoteFilterParams {
    pub user_id: Option<Uuid>,
    pub target_type: Option<TargetKind>,
    pub value: Option<i16>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl VoteFilterParams {
    pub fn push_filters(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(user_id) = self.user_id {
            query.push(" AND user_id = ");
            query.push_bind(user_id);
        }
        if let Some(target_type) = self.target_type {
            query.push(" AND target_type = ");
            query.push_bind(target_type);
        }
        if let Some(value) = self.value {
            query.push(" AND value = ");
            query.push_bind(value);
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateReport {
    pub target_type: ReportTarget,
    pub target_id: Uuid,
    pub reason: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilterParams {
    pub target_type: Option<ReportTarget>,
    pub target_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ReportFilterParams {
    pub fn push_filters(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(target_type) = self.target_type {
            query.push(" AND target_type = ");
            query.push_bind(target_type);
        }
        if let Some(target_id) = self.target_id {
            query.push(" AND target_id = ");
            query.push_bind(target_id);
        }
        if let Some(reporter_id) = self.reporter_id {
            query.push(" AND reporter_id = ");
            query.push_bind(reporter_id);
        }
        if let Some(search) = &self.search {
            query.push(" AND reason ILIKE ");
            query.push_bind(format!("%{search}%"));
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueueFilterParams {
    pub target_type: Option<TargetKind>,
    pub source: Option<QueueSource>,
    pub status: Option<ReviewStatus>,
    pub reviewer_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl QueueFilterParams {
    pub fn push_filters(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(target_type) = self.target_type {
            query.push(" AND target_type = ");
            query.push_bind(target_type);
        }
        if let Some(source) = self.source {
            query.push(" AND source = ");
            query.push_bind(source);
        }
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(reviewer_id) = self.reviewer_id {
            query.push(" AND reviewer_id = ");
            query.push_bind(reviewer_id);
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModerationDecision {
    pub status: ReviewStatus,
    pub reason: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModerationStatsResponse {
    pub pending_moderations: i64,
    pub total_reports: i64,
    pub recent_decisions: i64,
    pub reports_by_type: std::collections::HashMap<&'static str, i64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateContribution {
    #[serde(rename = "type")]
    pub kind: ContributionKind,
    pub content: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModerateContribution {
    pub status: ReviewStatus,
    pub moderator_note: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ContributionListParams {
    pub status: Option<ReviewStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    #[default]
    Week,
    Month,
}

#[derive(Deserialize, Debug, Default)]
pub struct LeaderboardParams {
    pub period: Option<StatsPeriod>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub period: StatsPeriod,
    pub total_contributions: i64,
    pub top_contributors: Vec<ContributorTotals>,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use std::sync::Arc;

use crate::auth::extractor::AuthenticatedUser;
use crate::diary::models::{attach_all, DiaryEntry, EntryResponse};
use crate::diary::store::attachments_for;
use crate::error::{AppError, AppResult};
use crate::search::filter::{parse_tags, Clause, Filter};
use crate::search::query::parse_date;
use crate::views::aggregate::{
    day_counts, month_summaries, overview, DayCount, MonthSummary, OverviewStats, StatsRow,
};
use crate::views::timeline::{timeline, TimelinePage, TimelineParams};
use crate::views::{DateWindow, ViewMode};
use crate::AppState;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ViewParams {
    pub view: Option<String>,
    pub date: Option<String>,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewResponse {
    pub view: Option<ViewMode>,
    pub window: Option<DateWindow>,
    pub total: usize,
    pub entries: Vec<EntryResponse>,
    pub day_counts: Vec<DayCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<Vec<MonthSummary>>,
}

fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Mode and window from the query string; no `view` means every entry.
fn resolve_window(
    params: &ViewParams,
    today: NaiveDate,
) -> AppResult<Option<(ViewMode, DateWindow)>> {
    let Some(view) = field(&params.view) else {
        return Ok(None);
    };
    let mode = ViewMode::parse(view)?;
    let anchor = match field(&params.date) {
        Some(raw) => parse_date("date", raw)?,
        None => today,
    };
    let window = DateWindow::containing(mode, anchor)
        .ok_or_else(|| AppError::validation("date is out of range"))?;
    Ok(Some((mode, window)))
}

pub async fn get_entries_for_view(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<ViewParams>,
) -> AppResult<Json<ViewResponse>> {
    let owner_id = claims.owner_id()?;
    let window = resolve_window(&params, Utc::now().date_naive())?;

    let filter = Filter::for_owner(owner_id)
        .and_maybe(window.map(|(_, w)| Clause::DateFrom(w.start)))
        .and_maybe(window.map(|(_, w)| Clause::DateTo(w.end)))
        .and_maybe(field(&params.mood).map(|m| Clause::Mood(m.to_string())))
        .and_maybe(field(&params.weather).map(|w| Clause::Weather(w.to_string())))
        .and(Clause::TagsAny(
            field(&params.tags).map(parse_tags).unwrap_or_default(),
        ));

    let mut qb = QueryBuilder::<Postgres>::new("SELECT e.* FROM diary_entries e");
    filter.push_where(&mut qb);
    qb.push(" ORDER BY e.date DESC, e.created_at DESC, e.id DESC");

    let entries = qb
        .build_query_as::<DiaryEntry>()
        .fetch_all(&state.db)
        .await
        .map_err(|e| {
            tracing::error!(
                query   = "SELECT e.* FROM diary_entries e WHERE ...",
                error   = %e,
                user_id = %owner_id,
                "DB error loading view"
            );
            AppError::from(e)
        })?;

    let counts = day_counts(entries.iter().map(|e| e.date));
    let months = match window {
        Some((ViewMode::Yearly, w)) => Some(month_summaries(
            w.start.year(),
            entries.iter().map(|e| (e.date, e.mood.as_deref())),
        )),
        _ => None,
    };

    let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
    let attachments = attachments_for(&state.db, &ids).await?;
    let entries = attach_all(entries, attachments);

    Ok(Json(ViewResponse {
        view: window.map(|(mode, _)| mode),
        window: window.map(|(_, w)| w),
        total: entries.len(),
        entries,
        day_counts: counts,
        months,
    }))
}

pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<TimelineParams>,
) -> AppResult<Json<TimelinePage>> {
    let owner_id = claims.owner_id()?;
    Ok(Json(timeline(&state.db, owner_id, &params).await?))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<OverviewStats>> {
    let owner_id = claims.owner_id()?;

    let rows = sqlx::query_as::<_, StatsRow>(
        "SELECT date, mood, tags FROM diary_entries WHERE owner_id = $1",
    )
    .bind(owner_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(overview(&rows, Utc::now().date_naive())))
}

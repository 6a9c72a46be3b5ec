//! Reverse-chronological, keyset-paginated stream grouped by month.
//!
//! A cursor names the last item of the previous page as
//! `{date}_{created_at micros}_{id}`; the next page starts strictly after it
//! in `(date, created_at, id)` descending order.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::diary::models::DiaryEntry;
use crate::error::{AppError, AppResult};
use crate::search::filter::{parse_tags, Clause, Filter};
use crate::search::query::{Page, YEARS};
use crate::search::snippet::preview;
use crate::views::month_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn after(entry: &DiaryEntry) -> Self {
        Cursor {
            date: entry.date,
            created_at: entry.created_at,
            id: entry.id,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}_{}_{}",
            self.date.format("%Y-%m-%d"),
            self.created_at.timestamp_micros(),
            self.id.simple()
        )
    }

    pub fn decode(raw: &str) -> AppResult<Self> {
        let invalid = || AppError::validation("cursor is invalid");
        let mut parts = raw.trim().splitn(3, '_');
        let (Some(date), Some(micros), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        Ok(Cursor {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .filter(|d| YEARS.contains(&d.year()))
                .ok_or_else(invalid)?,
            created_at: micros
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_micros)
                .ok_or_else(invalid)?,
            id: Uuid::parse_str(id).map_err(|_| invalid())?,
        })
    }

    fn clause(&self) -> Clause {
        Clause::Before {
            date: self.date,
            created_at: self.created_at,
            id: self.id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TimelineParams {
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct TimelineRow {
    #[sqlx(flatten)]
    pub entry: DiaryEntry,
    pub attachment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: Uuid,
    pub date: NaiveDate,
    pub title: String,
    pub mood: Option<String>,
    pub tags: Option<String>,
    pub is_favorite: bool,
    pub category_id: Option<Uuid>,
    pub attachment_count: i64,
    pub snippet: String,
}

impl From<&TimelineRow> for TimelineItem {
    fn from(row: &TimelineRow) -> Self {
        let e = &row.entry;
        TimelineItem {
            id: e.id,
            date: e.date,
            title: e.title.clone(),
            mood: e.mood.clone(),
            tags: e.tags.clone(),
            is_favorite: e.is_favorite,
            category_id: e.category_id,
            attachment_count: row.attachment_count,
            snippet: preview(&e.title, &e.body_text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineGroup {
    /// `YYYY-MM`
    pub month: String,
    pub items: Vec<TimelineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePage {
    pub groups: Vec<TimelineGroup>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Consecutive items of the same month share a group; input is already ordered.
pub fn group_by_month(items: Vec<TimelineItem>) -> Vec<TimelineGroup> {
    let mut groups: Vec<TimelineGroup> = Vec::new();
    for item in items {
        let key = month_key(item.date);
        match groups.last_mut() {
            Some(group) if group.month == key => group.items.push(item),
            _ => groups.push(TimelineGroup {
                month: key,
                items: vec![item],
            }),
        }
    }
    groups
}

/// `rows` holds up to `limit + 1` rows; the extra one only signals another page.
pub fn assemble(mut rows: Vec<TimelineRow>, limit: usize) -> TimelinePage {
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    let next_cursor = if has_more {
        rows.last().map(|r| Cursor::after(&r.entry).encode())
    } else {
        None
    };

    TimelinePage {
        groups: group_by_month(rows.iter().map(TimelineItem::from).collect()),
        next_cursor,
        has_more,
    }
}

pub async fn timeline(
    pool: &PgPool,
    owner_id: Uuid,
    params: &TimelineParams,
) -> AppResult<TimelinePage> {
    let page = Page::parse(params.limit.as_deref(), None)?;
    let cursor = non_blank(&params.cursor)
        .map(|c| Cursor::decode(&c))
        .transpose()?;

    let filter = Filter::for_owner(owner_id)
        .and_maybe(non_blank(&params.mood).map(Clause::Mood))
        .and_maybe(non_blank(&params.weather).map(Clause::Weather))
        .and(Clause::TagsAny(
            non_blank(&params.tags).map(|t| parse_tags(&t)).unwrap_or_default(),
        ))
        .and_maybe(cursor.map(|c| c.clause()));

    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT e.*, (SELECT COUNT(*) FROM attachments a WHERE a.entry_id = e.id) AS attachment_count FROM diary_entries e",
    );
    filter.push_where(&mut qb);
    qb.push(" ORDER BY e.date DESC, e.created_at DESC, e.id DESC LIMIT ")
        .push_bind(page.limit + 1);

    let rows = qb
        .build_query_as::<TimelineRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!(
                query    = "SELECT e.*, attachment_count FROM diary_entries e WHERE ...",
                error    = %e,
                owner_id = %owner_id,
                "DB error loading timeline"
            );
            AppError::from(e)
        })?;

    Ok(assemble(rows, page.limit as usize))
}

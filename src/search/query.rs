//! Search planning: filters in SQL, hybrid text matching and ranking in memory.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::diary::models::DiaryEntry;
use crate::error::{AppError, AppResult};
use crate::search::filter::{parse_tags, Clause, Filter};
use crate::search::index::{fold_case, query_terms};
use crate::search::snippet::{preview, snippet};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

const ORDER_RECENT: &str = " ORDER BY e.date DESC, e.created_at DESC, e.id DESC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Parses raw query-string values. Limit is clamped to [`MAX_LIMIT`].
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> AppResult<Self> {
        let limit = match limit.map(str::trim).filter(|s| !s.is_empty()) {
            None => DEFAULT_LIMIT,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => n.min(MAX_LIMIT),
                _ => return Err(AppError::validation("limit must be a positive integer")),
            },
        };
        let offset = match offset.map(str::trim).filter(|s| !s.is_empty()) {
            None => 0,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 0 => n,
                _ => return Err(AppError::validation("offset must be a non-negative integer")),
            },
        };
        Ok(Page { limit, offset })
    }

    /// The slice of `items` this page covers; empty past the end.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(items.len());
        let end = start
            .saturating_add(usize::try_from(self.limit).unwrap_or(0))
            .min(items.len());
        &items[start..end]
    }
}

/// Raw query-string parameters; validated by [`SearchRequest::from_params`].
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SearchParams {
    #[serde(alias = "text")]
    pub q: Option<String>,
    #[serde(alias = "date_from")]
    pub from: Option<String>,
    #[serde(alias = "date_to")]
    pub to: Option<String>,
    pub mood: Option<String>,
    pub tags: Option<String>,
    pub favorite: Option<String>,
    pub category_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub text: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub mood: Option<String>,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub category_id: Option<Uuid>,
    pub page: Page,
}

/// Years the `date` column can hold and the week and month windows can span.
pub const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

pub fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{field} must be a date (YYYY-MM-DD)")))?;
    if !YEARS.contains(&date.year()) {
        return Err(AppError::validation(format!("{field} is out of range")));
    }
    Ok(date)
}

pub fn parse_uuid(field: &str, raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(format!("{field} must be a UUID")))
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl SearchRequest {
    pub fn from_params(params: &SearchParams) -> AppResult<Self> {
        let page = Page::parse(params.limit.as_deref(), params.offset.as_deref())?;
        Ok(SearchRequest {
            text: non_blank(params.q.as_ref()).map(str::to_string),
            date_from: non_blank(params.from.as_ref())
                .map(|d| parse_date("from", d))
                .transpose()?,
            date_to: non_blank(params.to.as_ref())
                .map(|d| parse_date("to", d))
                .transpose()?,
            mood: non_blank(params.mood.as_ref()).map(str::to_string),
            tags: non_blank(params.tags.as_ref())
                .map(parse_tags)
                .unwrap_or_default(),
            favorite: matches!(
                non_blank(params.favorite.as_ref()),
                Some("true") | Some("1")
            ),
            category_id: non_blank(params.category_id.as_ref())
                .map(|c| parse_uuid("category_id", c))
                .transpose()?,
            page,
        })
    }

    pub fn filter(&self, owner_id: Uuid) -> Filter {
        Filter::for_owner(owner_id)
            .and_maybe(self.date_from.map(Clause::DateFrom))
            .and_maybe(self.date_to.map(Clause::DateTo))
            .and_maybe(self.mood.clone().map(Clause::Mood))
            .and(Clause::TagsAny(self.tags.clone()))
            .and_maybe(self.favorite.then_some(Clause::Favorite))
            .and_maybe(self.category_id.map(Clause::Category))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub date: NaiveDate,
    pub title: String,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
    pub is_favorite: bool,
    pub category_id: Option<Uuid>,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl SearchHit {
    fn new(entry: &DiaryEntry, snippet: String, score: Option<u32>) -> Self {
        SearchHit {
            id: entry.id,
            date: entry.date,
            title: entry.title.clone(),
            mood: entry.mood.clone(),
            weather: entry.weather.clone(),
            tags: entry.tags.clone(),
            is_favorite: entry.is_favorite,
            category_id: entry.category_id,
            snippet,
            score,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchResponse {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub results: Vec<SearchHit>,
}

/// Why an entry matched, in ranking priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankKey {
    pub title_literal: bool,
    pub body_literal: bool,
    pub score: u32,
}

/// Hybrid match: literal substring in any zone, or every term prefixing an
/// indexed token. `None` when neither applies.
pub fn match_entry(entry: &DiaryEntry, needle_lower: &str, terms: &[String]) -> Option<RankKey> {
    let title_literal = fold_case(&entry.title).contains(needle_lower);
    let body_literal = fold_case(&entry.body_text).contains(needle_lower);
    let tags_literal = fold_case(entry.tags_str()).contains(needle_lower);
    let indexed = entry.search_index.prefix_score(terms);

    if !(title_literal || body_literal || tags_literal || indexed.is_some()) {
        return None;
    }

    Some(RankKey {
        title_literal,
        body_literal,
        score: indexed.unwrap_or(0),
    })
}

/// Title literal, then body literal, then score, then date; newer rows and
/// then ids settle the remaining ties so pages never reshuffle.
pub fn compare_ranked(a: &(RankKey, &DiaryEntry), b: &(RankKey, &DiaryEntry)) -> Ordering {
    let (ka, ea) = a;
    let (kb, eb) = b;
    kb.title_literal
        .cmp(&ka.title_literal)
        .then(kb.body_literal.cmp(&ka.body_literal))
        .then(kb.score.cmp(&ka.score))
        .then(eb.date.cmp(&ea.date))
        .then(eb.created_at.cmp(&ea.created_at))
        .then(eb.id.cmp(&ea.id))
}

/// Matches and orders `entries` against `text`.
pub fn rank<'a>(entries: &'a [DiaryEntry], text: &str) -> Vec<(RankKey, &'a DiaryEntry)> {
    let needle = fold_case(text.trim());
    let terms = query_terms(&needle);
    let mut ranked: Vec<(RankKey, &DiaryEntry)> = entries
        .iter()
        .filter_map(|e| match_entry(e, &needle, &terms).map(|k| (k, e)))
        .collect();
    ranked.sort_by(compare_ranked);
    ranked
}

/// Text search over already-filtered candidates.
pub fn search_in(entries: &[DiaryEntry], text: &str, page: Page) -> SearchResponse {
    let ranked = rank(entries, text);
    let results = page
        .slice(&ranked)
        .iter()
        .map(|(key, entry)| {
            SearchHit::new(
                entry,
                snippet(&entry.title, &entry.body_text, Some(text)),
                Some(key.score),
            )
        })
        .collect();

    SearchResponse {
        total: ranked.len() as i64,
        limit: page.limit,
        offset: page.offset,
        results,
    }
}

pub async fn search(pool: &PgPool, owner_id: Uuid, req: &SearchRequest) -> AppResult<SearchResponse> {
    let filter = req.filter(owner_id);

    if let Some(text) = &req.text {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT e.* FROM diary_entries e");
        filter.push_where(&mut qb);
        qb.push(ORDER_RECENT);

        let candidates = qb
            .build_query_as::<DiaryEntry>()
            .fetch_all(pool)
            .await
            .map_err(|e| {
                tracing::error!(
                    query    = "SELECT e.* FROM diary_entries e WHERE ...",
                    error    = %e,
                    owner_id = %owner_id,
                    "DB error loading search candidates"
                );
                AppError::from(e)
            })?;

        let response = search_in(&candidates, text, req.page);
        tracing::debug!(
            owner_id   = %owner_id,
            candidates = candidates.len(),
            total      = response.total,
            "Text search complete"
        );
        return Ok(response);
    }

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM diary_entries e");
    filter.push_where(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new("SELECT e.* FROM diary_entries e");
    filter.push_where(&mut qb);
    qb.push(ORDER_RECENT);
    qb.push(" LIMIT ").push_bind(req.page.limit);
    qb.push(" OFFSET ").push_bind(req.page.offset);

    let rows = qb.build_query_as::<DiaryEntry>().fetch_all(pool).await?;

    Ok(SearchResponse {
        total,
        limit: req.page.limit,
        offset: req.page.offset,
        results: rows
            .iter()
            .map(|e| SearchHit::new(e, preview(&e.title, &e.body_text), None))
            .collect(),
    })
}

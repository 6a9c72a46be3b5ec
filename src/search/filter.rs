//! Composable WHERE clauses for entry queries.
//!
//! A [`Filter`] is an ordered list of typed clauses, rendered onto a
//! `sqlx::QueryBuilder` with every user value bound as a parameter. Clauses are
//! AND-combined; the tag clause ORs over its tags internally. Queries using a
//! filter must alias `diary_entries` as `e`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Owner(Uuid),
    DateFrom(NaiveDate),
    DateTo(NaiveDate),
    Mood(String),
    Weather(String),
    /// Any listed tag is a case-insensitive substring of the entry's tags.
    TagsAny(Vec<String>),
    Favorite,
    Category(Uuid),
    /// Keyset bound for `date DESC, created_at DESC, id DESC` ordering.
    Before {
        date: NaiveDate,
        created_at: DateTime<Utc>,
        id: Uuid,
    },
}

impl Clause {
    fn push(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Clause::Owner(owner_id) => {
                qb.push("e.owner_id = ").push_bind(*owner_id);
            }
            Clause::DateFrom(date) => {
                qb.push("e.date >= ").push_bind(*date);
            }
            Clause::DateTo(date) => {
                qb.push("e.date <= ").push_bind(*date);
            }
            Clause::Mood(mood) => {
                qb.push("e.mood = ").push_bind(mood.clone());
            }
            Clause::Weather(weather) => {
                qb.push("e.weather = ").push_bind(weather.clone());
            }
            Clause::TagsAny(tags) => {
                qb.push("(");
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push("POSITION(")
                        .push_bind(tag.to_lowercase())
                        .push(" IN LOWER(COALESCE(e.tags, ''))) > 0");
                }
                qb.push(")");
            }
            Clause::Favorite => {
                qb.push("e.is_favorite = TRUE");
            }
            Clause::Category(category_id) => {
                qb.push("e.category_id = ").push_bind(*category_id);
            }
            Clause::Before {
                date,
                created_at,
                id,
            } => {
                qb.push("(e.date, e.created_at, e.id) < (")
                    .push_bind(*date)
                    .push(", ")
                    .push_bind(*created_at)
                    .push(", ")
                    .push_bind(*id)
                    .push(")");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Every filter starts scoped to one owner.
    pub fn for_owner(owner_id: Uuid) -> Self {
        Filter {
            clauses: vec![Clause::Owner(owner_id)],
        }
    }

    pub fn and(mut self, clause: Clause) -> Self {
        match &clause {
            // an empty OR group would match nothing
            Clause::TagsAny(tags) if tags.is_empty() => {}
            _ => self.clauses.push(clause),
        }
        self
    }

    pub fn and_maybe(self, clause: Option<Clause>) -> Self {
        match clause {
            Some(c) => self.and(c),
            None => self,
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Appends ` WHERE c1 AND c2 ...`.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE ");
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                qb.push(" AND ");
            }
            clause.push(qb);
        }
    }
}

/// Comma-separated tag list, trimmed, empties dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

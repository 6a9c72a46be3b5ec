//! Cross-entry counts: per day, per month, dominant mood, overview stats.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::search::filter::parse_tags;
use crate::views::{month_key, DateWindow, ViewMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSummary {
    /// `YYYY-MM`
    pub month: String,
    pub count: u32,
    pub dominant_mood: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    pub value: String,
    pub count: u32,
}

/// The fields stats need, nothing more.
#[derive(Debug, Clone, FromRow)]
pub struct StatsRow {
    pub date: NaiveDate,
    pub mood: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_entries: u32,
    pub entries_this_week: u32,
    pub entries_this_month: u32,
    pub most_common_mood: Option<String>,
    pub entries_by_month: Vec<MonthSummary>,
    pub mood_frequency: Vec<Frequency>,
    pub tag_frequency: Vec<Frequency>,
}

pub fn day_counts(dates: impl IntoIterator<Item = NaiveDate>) -> Vec<DayCount> {
    let mut counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for date in dates {
        *counts.entry(date).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(date, count)| DayCount { date, count })
        .collect()
}

/// Highest count wins; ties go to the lexicographically smallest mood.
/// Blank moods do not vote.
pub fn dominant_mood<'a>(moods: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for mood in moods.into_iter().map(str::trim).filter(|m| !m.is_empty()) {
        *counts.entry(mood).or_default() += 1;
    }
    let mut best: Option<(&str, u32)> = None;
    for (mood, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((mood, count));
        }
    }
    best.map(|(mood, _)| mood.to_string())
}

/// One summary per calendar month of `year`, empty months included.
pub fn month_summaries<'a>(
    year: i32,
    entries: impl IntoIterator<Item = (NaiveDate, Option<&'a str>)>,
) -> Vec<MonthSummary> {
    let mut moods_by_month: BTreeMap<u32, Vec<Option<&str>>> =
        (1..=12).map(|m| (m, Vec::new())).collect();
    for (date, mood) in entries {
        if date.year() == year {
            moods_by_month.entry(date.month()).or_default().push(mood);
        }
    }
    moods_by_month
        .into_iter()
        .map(|(month, moods)| MonthSummary {
            month: format!("{year:04}-{month:02}"),
            count: moods.len() as u32,
            dominant_mood: dominant_mood(moods.into_iter().flatten()),
        })
        .collect()
}

/// Most frequent first, then alphabetical.
fn frequencies(counts: BTreeMap<String, u32>) -> Vec<Frequency> {
    let mut out: Vec<Frequency> = counts
        .into_iter()
        .map(|(value, count)| Frequency { value, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    out
}

pub fn overview(rows: &[StatsRow], today: NaiveDate) -> OverviewStats {
    let week = DateWindow::containing(ViewMode::Weekly, today);
    let month = DateWindow::containing(ViewMode::Monthly, today);
    let count_in = |window: Option<DateWindow>| {
        window.map_or(0, |w| rows.iter().filter(|r| w.contains(r.date)).count() as u32)
    };

    let mut by_month: BTreeMap<String, Vec<Option<&str>>> = BTreeMap::new();
    let mut moods: BTreeMap<String, u32> = BTreeMap::new();
    let mut tags: BTreeMap<String, u32> = BTreeMap::new();

    for row in rows {
        by_month
            .entry(month_key(row.date))
            .or_default()
            .push(row.mood.as_deref());
        if let Some(mood) = row.mood.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            *moods.entry(mood.to_string()).or_default() += 1;
        }
        for tag in parse_tags(row.tags.as_deref().unwrap_or("")) {
            *tags.entry(tag.to_lowercase()).or_default() += 1;
        }
    }

    OverviewStats {
        total_entries: rows.len() as u32,
        entries_this_week: count_in(week),
        entries_this_month: count_in(month),
        most_common_mood: dominant_mood(rows.iter().filter_map(|r| r.mood.as_deref())),
        entries_by_month: by_month
            .into_iter()
            .map(|(month, moods)| MonthSummary {
                month,
                count: moods.len() as u32,
                dominant_mood: dominant_mood(moods.into_iter().flatten()),
            })
            .collect(),
        mood_frequency: frequencies(moods),
        tag_frequency: frequencies(tags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(date: &str, mood: Option<&str>, tags: Option<&str>) -> StatsRow {
        StatsRow {
            date: d(date),
            mood: mood.map(str::to_string),
            tags: tags.map(str::to_string),
        }
    }

    #[test]
    fn test_day_counts_sorted() {
        let counts = day_counts([d("2024-01-16"), d("2024-01-15"), d("2024-01-16")]);
        assert_eq!(
            counts,
            vec![
                DayCount { date: d("2024-01-15"), count: 1 },
                DayCount { date: d("2024-01-16"), count: 2 },
            ]
        );
    }

    #[test]
    fn test_dominant_mood_highest_count() {
        assert_eq!(
            dominant_mood(["sad", "happy", "happy"]),
            Some("happy".to_string())
        );
    }

    #[test]
    fn test_dominant_mood_tie_is_alphabetical() {
        assert_eq!(
            dominant_mood(["tired", "calm", "tired", "calm"]),
            Some("calm".to_string())
        );
        // insertion order does not matter
        assert_eq!(
            dominant_mood(["calm", "tired", "calm", "tired"]),
            Some("calm".to_string())
        );
    }

    #[test]
    fn test_dominant_mood_ignores_blank() {
        assert_eq!(dominant_mood(["", "  "]), None);
        assert_eq!(dominant_mood(std::iter::empty()), None);
    }

    #[test]
    fn test_month_summaries_cover_the_year() {
        let entries = vec![
            (d("2024-01-02"), Some("happy")),
            (d("2024-01-09"), Some("happy")),
            (d("2024-01-20"), None),
            (d("2024-03-01"), Some("sad")),
            (d("2023-12-31"), Some("angry")),
        ];
        let months = month_summaries(2024, entries);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].month, "2024-01");
        assert_eq!(months[0].count, 3);
        assert_eq!(months[0].dominant_mood.as_deref(), Some("happy"));
        assert_eq!(months[1].count, 0);
        assert_eq!(months[1].dominant_mood, None);
        assert_eq!(months[2].dominant_mood.as_deref(), Some("sad"));
    }

    #[test]
    fn test_overview() {
        // 2024-01-17 is a Wednesday
        let rows = vec![
            row("2024-01-15", Some("happy"), Some("Work, travel")),
            row("2024-01-17", Some("happy"), Some("work")),
            row("2024-01-02", Some("sad"), None),
            row("2023-12-30", None, Some(" ,travel")),
        ];
        let stats = overview(&rows, d("2024-01-17"));

        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.entries_this_week, 2);
        assert_eq!(stats.entries_this_month, 3);
        assert_eq!(stats.most_common_mood.as_deref(), Some("happy"));
        assert_eq!(
            stats
                .entries_by_month
                .iter()
                .map(|m| (m.month.as_str(), m.count))
                .collect::<Vec<_>>(),
            vec![("2023-12", 1), ("2024-01", 3)]
        );
        assert_eq!(
            stats.tag_frequency,
            vec![
                Frequency { value: "travel".into(), count: 2 },
                Frequency { value: "work".into(), count: 2 },
            ]
        );
        assert_eq!(stats.mood_frequency[0], Frequency { value: "happy".into(), count: 2 });
    }
}

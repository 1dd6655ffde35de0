//! Pure aggregation over in-memory snapshot batches.
//!
//! Nothing in this module performs I/O: callers load a batch of
//! [`SnapshotRecord`]s from the store and derive tables from it. All
//! counters come from upstream data and are non-negative, except
//! `inactive`, which is preserved unclamped when upstream reports more
//! engaged than active users.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::models::{DaySnapshot, SnapshotRecord};

/// Editor/model/language name filters.
///
/// An empty set means no restriction; a non-empty set keeps only the
/// listed names. Filters AND hierarchically: an editor excluded at the
/// editor level skips its whole model/language subtree.
#[derive(Debug, Clone, Default)]
pub struct MetricsFilter {
    pub editors: HashSet<String>,
    pub models: HashSet<String>,
    pub languages: HashSet<String>,
}

impl MetricsFilter {
    pub fn new(
        editors: impl IntoIterator<Item = String>,
        models: impl IntoIterator<Item = String>,
        languages: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            editors: editors.into_iter().collect(),
            models: models.into_iter().collect(),
            languages: languages.into_iter().collect(),
        }
    }

    fn keeps(set: &HashSet<String>, name: &str) -> bool {
        set.is_empty() || set.contains(name)
    }
}

/// Distinct names observed across a batch, used to populate selectable
/// filter options. Independent of any currently applied filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterVocabulary {
    pub editors: Vec<String>,
    pub models: Vec<String>,
    pub languages: Vec<String>,
}

/// Walk every record's completion tree and collect sorted, de-duplicated
/// editor/model/language names.
pub fn filter_vocabulary(records: &[SnapshotRecord]) -> FilterVocabulary {
    let mut editors = BTreeSet::new();
    let mut models = BTreeSet::new();
    let mut languages = BTreeSet::new();

    for record in records {
        for editor in record.data.editors() {
            editors.insert(editor.name.clone());
            for model in &editor.models {
                models.insert(model.name.clone());
                for language in &model.languages {
                    languages.insert(language.name.clone());
                }
            }
        }
    }

    FilterVocabulary {
        editors: editors.into_iter().collect(),
        models: models.into_iter().collect(),
        languages: languages.into_iter().collect(),
    }
}

/// Suggested/accepted line totals for one snapshot under a filter set.
pub fn code_metrics(snapshot: &DaySnapshot, filter: &MetricsFilter) -> (i64, i64) {
    let mut suggested = 0;
    let mut accepted = 0;

    for editor in snapshot.editors() {
        if !MetricsFilter::keeps(&filter.editors, &editor.name) {
            continue;
        }
        for model in &editor.models {
            if !MetricsFilter::keeps(&filter.models, &model.name) {
                continue;
            }
            for language in &model.languages {
                if !MetricsFilter::keeps(&filter.languages, &language.name) {
                    continue;
                }
                suggested += language.total_code_lines_suggested;
                accepted += language.total_code_lines_accepted;
            }
        }
    }

    (suggested, accepted)
}

/// Accepted lines over suggested lines as a percentage; zero when nothing
/// was suggested.
pub fn acceptance_rate(accepted: i64, suggested: i64) -> f64 {
    if suggested == 0 {
        0.0
    } else {
        accepted as f64 / suggested as f64 * 100.0
    }
}

/// One aggregated row per (date, org).
#[derive(Debug, Clone, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub org: String,
    pub active: i64,
    pub engaged: i64,
    /// `active - engaged`; negative values pass through unclamped as a
    /// data-quality signal.
    pub inactive: i64,
    pub suggested: i64,
    pub accepted: i64,
    pub acceptance_rate: f64,
}

/// One row per record, date-ascending.
pub fn daily_rows(records: &[SnapshotRecord], filter: &MetricsFilter) -> Vec<DailyRow> {
    let mut rows: Vec<DailyRow> = records
        .iter()
        .map(|record| {
            let (suggested, accepted) = code_metrics(&record.data, filter);
            let active = record.data.total_active_users;
            let engaged = record.data.total_engaged_users;
            DailyRow {
                date: record.date,
                org: record.org.clone(),
                active,
                engaged,
                inactive: active - engaged,
                suggested,
                accepted,
                acceptance_rate: acceptance_rate(accepted, suggested),
            }
        })
        .collect();

    rows.sort_by_key(|row| row.date);
    rows
}

/// Per-language totals across all editors/models passing the filter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageStat {
    pub language: String,
    pub suggested: i64,
    pub accepted: i64,
    pub acceptance_rate: f64,
}

/// Accumulate suggested/accepted per language name, drop languages with
/// no suggestions, sort descending by suggested lines.
pub fn language_rollup(records: &[SnapshotRecord], filter: &MetricsFilter) -> Vec<LanguageStat> {
    let mut totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();

    for record in records {
        for editor in record.data.editors() {
            if !MetricsFilter::keeps(&filter.editors, &editor.name) {
                continue;
            }
            for model in &editor.models {
                if !MetricsFilter::keeps(&filter.models, &model.name) {
                    continue;
                }
                for language in &model.languages {
                    if !MetricsFilter::keeps(&filter.languages, &language.name) {
                        continue;
                    }
                    let entry = totals.entry(language.name.clone()).or_insert((0, 0));
                    entry.0 += language.total_code_lines_suggested;
                    entry.1 += language.total_code_lines_accepted;
                }
            }
        }
    }

    let mut stats: Vec<LanguageStat> = totals
        .into_iter()
        .filter(|(_, (suggested, _))| *suggested > 0)
        .map(|(language, (suggested, accepted))| LanguageStat {
            language,
            suggested,
            accepted,
            acceptance_rate: acceptance_rate(accepted, suggested),
        })
        .collect();

    stats.sort_by(|a, b| b.suggested.cmp(&a.suggested));
    stats
}

/// Per-date sums across organizations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub active: i64,
    pub engaged: i64,
    pub inactive: i64,
    pub suggested: i64,
    pub accepted: i64,
}

/// Re-group daily rows into one totals row per date, date-ascending.
pub fn daily_totals(rows: &[DailyRow]) -> Vec<DailyTotals> {
    let mut by_date: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();

    for row in rows {
        let entry = by_date.entry(row.date).or_insert(DailyTotals {
            date: row.date,
            active: 0,
            engaged: 0,
            inactive: 0,
            suggested: 0,
            accepted: 0,
        });
        entry.active += row.active;
        entry.engaged += row.engaged;
        entry.inactive += row.inactive;
        entry.suggested += row.suggested;
        entry.accepted += row.accepted;
    }

    by_date.into_values().collect()
}

/// Mean per-day user counts over weekday dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserAverages {
    pub active: f64,
    pub engaged: f64,
    pub inactive: f64,
}

/// Average the per-date user totals over weekdays only; Saturdays and
/// Sundays are excluded by the calendar weekday of the row's date.
pub fn weekday_user_averages(totals: &[DailyTotals]) -> UserAverages {
    let weekdays: Vec<&DailyTotals> = totals
        .iter()
        .filter(|t| !matches!(t.date.weekday(), Weekday::Sat | Weekday::Sun))
        .collect();

    if weekdays.is_empty() {
        return UserAverages::default();
    }

    let n = weekdays.len() as f64;
    UserAverages {
        active: weekdays.iter().map(|t| t.active).sum::<i64>() as f64 / n,
        engaged: weekdays.iter().map(|t| t.engaged).sum::<i64>() as f64 / n,
        inactive: weekdays.iter().map(|t| t.inactive).sum::<i64>() as f64 / n,
    }
}

/// Acceptance rate across every row of the table.
pub fn overall_acceptance_rate(rows: &[DailyRow]) -> f64 {
    let suggested: i64 = rows.iter().map(|row| row.suggested).sum();
    let accepted: i64 = rows.iter().map(|row| row.accepted).sum();
    acceptance_rate(accepted, suggested)
}

/// One acceptance-rate observation; `org` is None for the overall series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub org: Option<String>,
    pub acceptance_rate: f64,
}

/// Per-date acceptance rates: for each date (ascending) one overall point
/// followed by per-org points, orgs sorted by name.
pub fn acceptance_rate_series(rows: &[DailyRow]) -> Vec<RatePoint> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, (i64, i64)>> = BTreeMap::new();

    for row in rows {
        let entry = by_date
            .entry(row.date)
            .or_default()
            .entry(row.org.clone())
            .or_insert((0, 0));
        entry.0 += row.suggested;
        entry.1 += row.accepted;
    }

    let mut series = Vec::new();
    for (date, orgs) in &by_date {
        let suggested: i64 = orgs.values().map(|(s, _)| s).sum();
        let accepted: i64 = orgs.values().map(|(_, a)| a).sum();
        series.push(RatePoint {
            date: *date,
            org: None,
            acceptance_rate: acceptance_rate(accepted, suggested),
        });
        for (org, (suggested, accepted)) in orgs {
            series.push(RatePoint {
                date: *date,
                org: Some(org.clone()),
                acceptance_rate: acceptance_rate(*accepted, *suggested),
            });
        }
    }

    series
}

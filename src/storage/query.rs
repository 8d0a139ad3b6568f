//! Range queries over the daily logs.

use crate::error::Result;
use crate::sensors::Reading;
use crate::storage::daily_log::PersistenceStore;
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum points returned for the week, month and year ranges.
pub const MAX_DOWNSAMPLED_POINTS: usize = 192;

/// Historical query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeSelector {
    Day,
    Week,
    Month,
    Year,
}

impl RangeSelector {
    /// Parse an external range token. The empty token means `Day`; unknown
    /// tokens give `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "" | "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn span(self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
            Self::Year => Duration::days(365),
        }
    }

    /// Point cap; the day range is returned uncapped.
    pub fn max_points(self) -> Option<usize> {
        match self {
            Self::Day => None,
            _ => Some(MAX_DOWNSAMPLED_POINTS),
        }
    }
}

impl FromStr for RangeSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| format!("unknown range '{}'", s))
    }
}

/// Keep every `step`-th reading so that at most `max` remain.
///
/// `step` is `ceil(len / max)`, which is the plain `len / max` whenever that
/// divides evenly. Unlike a floor step, it never returns more than `max`.
pub fn downsample(readings: Vec<Reading>, max: usize) -> Vec<Reading> {
    if max == 0 || readings.len() <= max {
        return readings;
    }
    let step = readings.len().div_ceil(max);
    readings.into_iter().step_by(step).collect()
}

/// Range-bucketed views over a [`PersistenceStore`].
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: PersistenceStore,
}

impl QueryEngine {
    pub fn new(store: PersistenceStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    /// Query by external token relative to the local clock.
    /// Unknown tokens give an empty series.
    pub async fn query_token(&self, token: &str) -> Result<Vec<Reading>> {
        match RangeSelector::from_token(token) {
            Some(range) => self.query(range).await,
            None => {
                tracing::warn!("Unknown range token '{}', returning no readings", token);
                Ok(Vec::new())
            }
        }
    }

    pub async fn query(&self, range: RangeSelector) -> Result<Vec<Reading>> {
        self.query_at(range, Local::now().naive_local()).await
    }

    /// Readings at or after `now - span`, ascending by time, capped for the
    /// longer ranges.
    pub async fn query_at(&self, range: RangeSelector, now: NaiveDateTime) -> Result<Vec<Reading>> {
        let cutoff = now - range.span();

        let mut readings = Vec::new();
        let mut date = now.date();
        while date >= cutoff.date() {
            let day = self.store.load_day(date).await?;
            readings.extend(day.into_iter().filter(|r| r.time() >= cutoff));
            match date.pred_opt() {
                Some(previous) => date = previous,
                None => break,
            }
        }

        // Days were visited newest first; each file is itself chronological.
        readings.sort_by_key(Reading::time);

        Ok(match range.max_points() {
            Some(max) => downsample(readings, max),
            None => readings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::reading::keys;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn reading(time: NaiveDateTime, temp: f64) -> Reading {
        Reading::new(time).with(keys::TEMPERATURE, Some(temp))
    }

    #[test]
    fn test_range_tokens() {
        assert_eq!(RangeSelector::from_token(""), Some(RangeSelector::Day));
        assert_eq!(RangeSelector::from_token("day"), Some(RangeSelector::Day));
        assert_eq!(RangeSelector::from_token("year"), Some(RangeSelector::Year));
        assert_eq!(RangeSelector::from_token("decade"), None);
        assert_eq!("week".parse::<RangeSelector>(), Ok(RangeSelector::Week));
        assert_eq!(RangeSelector::Month.span(), Duration::days(30));
        assert_eq!(RangeSelector::Day.max_points(), None);
    }

    #[test]
    fn test_downsample_keeps_small_series() {
        let series: Vec<_> = (0..192).map(|i| reading(at(1, 0, 0), i as f64)).collect();
        assert_eq!(downsample(series, 192).len(), 192);
    }

    #[test]
    fn test_downsample_even_multiple() {
        let series: Vec<_> = (0..384).map(|i| reading(at(1, 0, 0), i as f64)).collect();
        let result = downsample(series, 192);
        assert_eq!(result.len(), 192);
        assert_eq!(result[1].get(keys::TEMPERATURE), Some(Some(2.0)));
    }

    #[test]
    fn test_downsample_never_exceeds_cap() {
        for total in [193usize, 250, 383, 385, 1000, 35_040] {
            let series: Vec<_> = (0..total).map(|i| reading(at(1, 0, 0), i as f64)).collect();
            let result = downsample(series, 192);
            assert!(result.len() <= 192, "{} -> {}", total, result.len());
            let step = total.div_ceil(192) as f64;
            for pair in result.windows(2) {
                let a = pair[0].get(keys::TEMPERATURE).flatten().unwrap();
                let b = pair[1].get(keys::TEMPERATURE).flatten().unwrap();
                assert_eq!(b - a, step);
            }
        }
    }

    #[tokio::test]
    async fn test_day_query_spans_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        let jan1 = at(1, 0, 0).date();
        let jan2 = at(2, 0, 0).date();

        store.append(jan1, &reading(at(1, 9, 0), 1.0)).await.unwrap();
        store.append(jan1, &reading(at(1, 18, 0), 2.0)).await.unwrap();
        store.append(jan2, &reading(at(2, 6, 0), 3.0)).await.unwrap();

        let engine = QueryEngine::new(store);
        let result = engine.query_at(RangeSelector::Day, at(2, 12, 0)).await.unwrap();

        let temps: Vec<f64> = result
            .iter()
            .map(|r| r.get(keys::TEMPERATURE).flatten().unwrap())
            .collect();
        assert_eq!(temps, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_unreadable_day_does_not_fail_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        std::fs::create_dir(store.log_path(at(1, 0, 0).date())).unwrap();
        store.append(at(2, 0, 0).date(), &reading(at(2, 6, 0), 3.0)).await.unwrap();

        let engine = QueryEngine::new(store);
        let result = engine.query_at(RangeSelector::Day, at(2, 12, 0)).await.unwrap();
        assert_eq!(result, vec![reading(at(2, 6, 0), 3.0)]);
    }

    #[tokio::test]
    async fn test_week_query_merges_days_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        for day in [5, 2, 7, 1, 4, 6, 3] {
            for hour in [18, 6, 12] {
                let time = at(day, hour, 0);
                store.append(time.date(), &reading(time, f64::from(day * 100 + hour))).await.unwrap();
            }
        }

        let engine = QueryEngine::new(store);
        let result = engine.query_at(RangeSelector::Week, at(8, 8, 0)).await.unwrap();

        // cutoff is Jan 1 08:00, so only the early Jan 1 reading falls outside
        assert_eq!(result.len(), 20);
        assert!(result.windows(2).all(|w| w[0].time() < w[1].time()));
        assert_eq!(result[0].time(), at(1, 12, 0));
        assert_eq!(result[19].time(), at(7, 18, 0));
    }

    #[tokio::test]
    async fn test_repeated_query_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        for day in 1..=31 {
            for hour in 0..24 {
                let time = at(day, hour, 0);
                store.append(time.date(), &reading(time, f64::from(hour))).await.unwrap();
            }
        }

        let engine = QueryEngine::new(store);
        let now = at(31, 23, 30);
        for range in [RangeSelector::Day, RangeSelector::Week, RangeSelector::Year] {
            let first = engine.query_at(range, now).await.unwrap();
            let second = engine.query_at(range, now).await.unwrap();
            assert!(!first.is_empty());
            assert_eq!(first, second);
        }

        // 744 readings in the year window, step 4
        let year = engine.query_at(RangeSelector::Year, now).await.unwrap();
        assert_eq!(year.len(), 186);
        assert_eq!(year[0].time(), at(1, 0, 0));
        assert_eq!(year[1].time(), at(1, 4, 0));
    }

    #[tokio::test]
    async fn test_unknown_token_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = QueryEngine::new(PersistenceStore::new(dir.path()));
        assert!(engine.query_token("fortnight").await.unwrap().is_empty());
    }
}

//! Statistics snapshot over Store A.
//!
//! The aggregator dispatches the primary battery concurrently. Each statistic
//! is evaluated in isolation: a query failure becomes an `Err` entry for that
//! statistic only. A connection failure is different, it means the store is
//! gone and the whole snapshot is abandoned.
//!
//! `max_salary` and `max_salary_region` come from one joined query run after
//! the battery, so the department is always the one of the best-paid row.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::ser::{Serialize, SerializeMap, Serializer};
use strum::IntoStaticStr;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::JobStore;

pub const MAX_SALARY: &str = "max_salary";
pub const MAX_SALARY_REGION: &str = "max_salary_region";

/// The primary, independently computed statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Statistic {
    /// Share of CDI (permanent) contracts.
    PctCdi,
    /// Share of apprenticeship contracts.
    PctApprenticeship,
    /// Share of postings that require experience (`E`).
    PctExperienceRequired,
    /// Continuous percentile-50 over the non-null experience durations.
    MedianExperienceMonths,
    /// Share of postings open to beginners (`D`).
    PctNoExperience,
    /// Mean salary over postings created inside the salary window.
    MeanSalary,
    TotalOffers,
    /// Postings whose creation date is today.
    NewOffersToday,
}

impl Statistic {
    pub const PRIMARY: [Statistic; 8] = [
        Statistic::PctCdi,
        Statistic::PctApprenticeship,
        Statistic::PctExperienceRequired,
        Statistic::MedianExperienceMonths,
        Statistic::PctNoExperience,
        Statistic::MeanSalary,
        Statistic::TotalOffers,
        Statistic::NewOffersToday,
    ];

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn is_percentage(self) -> bool {
        matches!(
            self,
            Statistic::PctCdi
                | Statistic::PctApprenticeship
                | Statistic::PctExperienceRequired
                | Statistic::PctNoExperience
        )
    }

    pub fn is_count(self) -> bool {
        matches!(self, Statistic::TotalOffers | Statistic::NewOffersToday)
    }

    /// Shape a raw aggregate into its published form.
    fn finish(self, raw: f64) -> StatValue {
        if self.is_count() {
            StatValue::Count(raw.round() as i64)
        } else if self.is_percentage() || self == Statistic::MeanSalary {
            StatValue::Number(round2(raw))
        } else {
            StatValue::Number(raw)
        }
    }
}

/// Half-open creation-date window `[start, end)` used by the mean salary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalaryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SalaryWindow {
    pub fn calendar_year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }
}

/// The best-paid posting and the department it belongs to.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TopSalary {
    pub salary: f64,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Count(i64),
    Text(String),
}

impl StatValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Outcome of one named statistic: a value (possibly SQL `NULL`) or the
/// reason its query failed.
pub type StatOutcome = Result<Option<StatValue>, String>;

/// Flat, per-request statistics record.
///
/// Serializes as `{ name: value | null }`; failed and empty statistics are
/// both `null` on the wire and told apart through [`Self::failures`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsSnapshot {
    fields: BTreeMap<&'static str, StatOutcome>,
}

impl StatisticsSnapshot {
    pub fn insert(&mut self, name: &'static str, outcome: StatOutcome) {
        self.fields.insert(name, outcome);
    }

    pub fn outcome(&self, name: &str) -> Option<&StatOutcome> {
        self.fields.get(name)
    }

    /// The value of `name`, if its query succeeded and was not `NULL`.
    pub fn get(&self, name: &str) -> Option<&StatValue> {
        match self.fields.get(name) {
            Some(Ok(value)) => value.as_ref(),
            _ => None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.fields
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| (*name, e.as_str())))
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for StatisticsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, outcome) in &self.fields {
            let value = match outcome {
                Ok(v) => v.as_ref(),
                Err(_) => None,
            };
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn JobStore>,
    window: SalaryWindow,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn JobStore>, window: SalaryWindow) -> Self {
        Self { store, window }
    }

    /// Build a fresh snapshot.
    ///
    /// The battery runs over one store handle, followed by the top-salary
    /// query; at most one handle is held at any time.
    ///
    /// # Errors
    ///
    /// Only [`StoreError::Connection`]; query failures are recorded in the
    /// snapshot instead.
    pub async fn compute_snapshot(&self) -> Result<StatisticsSnapshot, StoreError> {
        let results = self
            .store
            .fetch_statistics(&Statistic::PRIMARY, self.window)
            .await?;

        let mut snapshot = StatisticsSnapshot::default();
        let mut connection_error = None;
        for (stat, result) in results {
            match result {
                Ok(raw) => snapshot.insert(stat.name(), Ok(raw.map(|v| stat.finish(v)))),
                Err(e) if e.is_connection() => {
                    connection_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!(statistic = stat.name(), error = %e, "statistic query failed");
                    snapshot.insert(stat.name(), Err(e.to_string()));
                }
            }
        }
        if let Some(e) = connection_error {
            return Err(e);
        }

        match self.store.fetch_top_salary().await {
            Ok(Some(top)) => {
                snapshot.insert(MAX_SALARY, Ok(Some(StatValue::Number(top.salary))));
                snapshot.insert(MAX_SALARY_REGION, Ok(top.department.map(StatValue::Text)));
            }
            Ok(None) => {
                snapshot.insert(MAX_SALARY, Ok(None));
                snapshot.insert(MAX_SALARY_REGION, Ok(None));
            }
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => {
                warn!(statistic = MAX_SALARY, error = %e, "top salary query failed");
                let reason = e.to_string();
                snapshot.insert(MAX_SALARY, Err(reason.clone()));
                snapshot.insert(MAX_SALARY_REGION, Err(reason));
            }
        }

        debug!(
            fields = snapshot.len(),
            complete = snapshot.is_complete(),
            "statistics snapshot computed"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobPosting;
    use crate::store::memory::MemoryJobStore;
    use tracing_test::traced_test;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn posting(contract: &str, salary: Option<f64>, postal: &str, created: NaiveDate) -> JobPosting {
        JobPosting {
            rome_code: Some("M1805".into()),
            rome_label: Some("Études et développement informatique".into()),
            contract_type: Some(contract.into()),
            contract_nature: Some("Contrat travail".into()),
            experience_required: Some("D".into()),
            experience_required_months: None,
            department: Some(postal[..2].to_owned()),
            postal_code: Some(postal.into()),
            creation_date: Some(created),
            calculated_salary: salary,
            geo_point: None,
        }
    }

    fn aggregator(store: MemoryJobStore) -> StatisticsAggregator {
        StatisticsAggregator::new(Arc::new(store), SalaryWindow::calendar_year(2024).unwrap())
    }

    fn three_postings() -> Vec<JobPosting> {
        vec![
            posting("CDI", Some(30000.0), "75011", date(2024, 3, 1)),
            posting("CDD", Some(45000.0), "69003", date(2024, 6, 1)),
            posting("CDI", Some(60000.0), "75002", date(2023, 12, 31)),
        ]
    }

    #[tokio::test]
    async fn max_salary_and_region_come_from_the_same_row() {
        let store = MemoryJobStore::new(three_postings()).with_today(date(2024, 6, 1));
        let snapshot = aggregator(store).compute_snapshot().await.unwrap();

        assert_eq!(snapshot.get(MAX_SALARY), Some(&StatValue::Number(60000.0)));
        assert_eq!(snapshot.get(MAX_SALARY_REGION).and_then(StatValue::as_str), Some("75"));
    }

    #[tokio::test]
    async fn primary_battery_is_rounded_and_windowed() {
        let store = MemoryJobStore::new(three_postings()).with_today(date(2024, 6, 1));
        let snapshot = aggregator(store).compute_snapshot().await.unwrap();

        // 2 of 3 postings are CDI.
        assert_eq!(snapshot.get("pct_cdi"), Some(&StatValue::Number(66.67)));
        // Only the two 2024 postings fall inside the window.
        assert_eq!(snapshot.get("mean_salary"), Some(&StatValue::Number(37500.0)));
        assert_eq!(snapshot.get("total_offers"), Some(&StatValue::Count(3)));
        assert_eq!(snapshot.get("new_offers_today"), Some(&StatValue::Count(1)));
        // No posting has a duration, so the median is NULL rather than a failure.
        assert_eq!(snapshot.outcome("median_experience_months"), Some(&Ok(None)));
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.len(), Statistic::PRIMARY.len() + 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn one_failing_query_only_nulls_its_own_field() {
        let store = MemoryJobStore::new(three_postings()).failing(Statistic::PctApprenticeship);
        let snapshot = aggregator(store).compute_snapshot().await.unwrap();

        assert!(matches!(snapshot.outcome("pct_apprenticeship"), Some(Err(_))));
        for stat in Statistic::PRIMARY {
            if stat != Statistic::PctApprenticeship {
                assert!(
                    matches!(snapshot.outcome(stat.name()), Some(Ok(_))),
                    "{} should have succeeded",
                    stat.name()
                );
            }
        }
        assert!(snapshot.get(MAX_SALARY).is_some());

        let failures: Vec<_> = snapshot.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["pct_apprenticeship"]);
        assert!(logs_contain("statistic query failed"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["pct_apprenticeship"].is_null());
        assert_eq!(json["pct_cdi"], 66.67);
    }

    #[tokio::test]
    async fn failing_top_salary_nulls_both_coupled_fields() {
        let store = MemoryJobStore::new(three_postings()).failing_top_salary();
        let snapshot = aggregator(store).compute_snapshot().await.unwrap();

        assert!(matches!(snapshot.outcome(MAX_SALARY), Some(Err(_))));
        assert!(matches!(snapshot.outcome(MAX_SALARY_REGION), Some(Err(_))));
        assert!(snapshot.get("total_offers").is_some());
    }

    #[tokio::test]
    async fn unreachable_store_aborts_the_snapshot() {
        let store = MemoryJobStore::new(three_postings()).unreachable();
        let err = aggregator(store).compute_snapshot().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn snapshot_never_holds_more_than_one_handle() {
        let store = MemoryJobStore::new(three_postings()).failing(Statistic::PctCdi);
        let gauge = store.clone();
        let snapshot = aggregator(store).compute_snapshot().await.unwrap();

        assert_eq!(snapshot.len(), Statistic::PRIMARY.len() + 2);
        assert_eq!(gauge.peak_handles(), 1);
    }

    #[tokio::test]
    async fn empty_store_yields_nulls_and_zero_counts() {
        let snapshot = aggregator(MemoryJobStore::default()).compute_snapshot().await.unwrap();
        assert_eq!(snapshot.get("total_offers"), Some(&StatValue::Count(0)));
        assert_eq!(snapshot.outcome("pct_cdi"), Some(&Ok(None)));
        assert_eq!(snapshot.outcome(MAX_SALARY), Some(&Ok(None)));
        assert!(snapshot.is_complete());
    }

    #[test]
    fn statistic_names_are_snake_case() {
        assert_eq!(Statistic::PctCdi.name(), "pct_cdi");
        assert_eq!(Statistic::MedianExperienceMonths.name(), "median_experience_months");
        assert_eq!(Statistic::NewOffersToday.name(), "new_offers_today");
    }

    #[test]
    fn salary_window_is_half_open() {
        let window = SalaryWindow::calendar_year(2024).unwrap();
        assert!(window.contains(date(2024, 1, 1)));
        assert!(window.contains(date(2024, 12, 31)));
        assert!(!window.contains(date(2025, 1, 1)));
        assert_eq!(window.year(), 2024);
    }
}

//! In-process stores.
//!
//! [`MemoryJobStore`] evaluates every statistic over a `Vec<JobPosting>`
//! with the same semantics as the SQL battery, and can be told to fail
//! individual statistics, the top-salary query, or the whole store.
//! Each query holds a simulated pooled handle while it runs; the gauge is
//! shared between clones so tests can read the peak afterwards.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use futures::StreamExt;
use futures::stream;

use super::{JobStore, MetricsStore, MetricsStream};
use crate::error::StoreError;
use crate::features::department_of;
use crate::models::{JobPosting, MetricRecord};
use crate::provider::StoreId;
use crate::stats::{SalaryWindow, Statistic, TopSalary};

#[derive(Debug, Clone)]
pub struct MemoryJobStore {
    postings: Vec<JobPosting>,
    today: NaiveDate,
    failing: HashSet<Statistic>,
    fail_top_salary: bool,
    unreachable: bool,
    handles: Arc<HandleGauge>,
}

#[derive(Debug, Default)]
struct HandleGauge {
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

/// Released on drop.
struct HandleGuard(Arc<HandleGauge>);

impl HandleGauge {
    fn acquire(self: &Arc<Self>) -> HandleGuard {
        let now = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        HandleGuard(Arc::clone(self))
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryJobStore {
    pub fn new(postings: Vec<JobPosting>) -> Self {
        Self {
            postings,
            today: Local::now().date_naive(),
            failing: HashSet::new(),
            fail_top_salary: false,
            unreachable: false,
            handles: Arc::default(),
        }
    }

    /// Most handles held at the same time so far, across all clones.
    pub fn peak_handles(&self) -> usize {
        self.handles.peak.load(Ordering::SeqCst)
    }

    /// Pin the date used by `new_offers_today`.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Make one statistic's query fail.
    pub fn failing(mut self, stat: Statistic) -> Self {
        self.failing.insert(stat);
        self
    }

    pub fn failing_top_salary(mut self) -> Self {
        self.fail_top_salary = true;
        self
    }

    /// Make every call fail as if the store were down.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Connection {
                store: StoreId::Jobs,
                message: "connection refused".into(),
            });
        }
        Ok(())
    }

    /// Take a handle, then yield so overlapping callers would be observed.
    async fn acquire(&self) -> Result<HandleGuard, StoreError> {
        self.check_reachable()?;
        let guard = self.handles.acquire();
        tokio::task::yield_now().await;
        Ok(guard)
    }

    fn share(&self, pred: impl Fn(&JobPosting) -> bool) -> Option<f64> {
        if self.postings.is_empty() {
            return None;
        }
        let hits = self.postings.iter().filter(|p| pred(p)).count();
        Some(100.0 * hits as f64 / self.postings.len() as f64)
    }

    fn evaluate(&self, stat: Statistic, window: SalaryWindow) -> Option<f64> {
        match stat {
            Statistic::PctCdi => self.share(|p| p.contract_type.as_deref() == Some("CDI")),
            Statistic::PctApprenticeship => self.share(|p| {
                p.contract_nature
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains("apprentissage"))
            }),
            Statistic::PctExperienceRequired => {
                self.share(|p| p.experience_required.as_deref() == Some("E"))
            }
            Statistic::PctNoExperience => {
                self.share(|p| p.experience_required.as_deref() == Some("D"))
            }
            Statistic::MedianExperienceMonths => {
                let months: Vec<f64> = self
                    .postings
                    .iter()
                    .filter_map(|p| p.experience_required_months)
                    .collect();
                percentile_cont(months, 0.5)
            }
            Statistic::MeanSalary => {
                let salaries: Vec<f64> = self
                    .postings
                    .iter()
                    .filter(|p| p.creation_date.is_some_and(|d| window.contains(d)))
                    .filter_map(|p| p.calculated_salary)
                    .collect();
                if salaries.is_empty() {
                    None
                } else {
                    Some(salaries.iter().sum::<f64>() / salaries.len() as f64)
                }
            }
            Statistic::TotalOffers => Some(self.postings.len() as f64),
            Statistic::NewOffersToday => Some(
                self.postings
                    .iter()
                    .filter(|p| p.creation_date == Some(self.today))
                    .count() as f64,
            ),
        }
    }
}

/// Continuous (linearly interpolated) percentile, as `PERCENTILE_CONT`.
pub fn percentile_cont(mut values: Vec<f64>, fraction: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let pos = fraction * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(values[lo] + (values[hi] - values[lo]) * (pos - lo as f64))
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn fetch_statistics(
        &self,
        stats: &[Statistic],
        window: SalaryWindow,
    ) -> Result<Vec<(Statistic, Result<Option<f64>, StoreError>)>, StoreError> {
        let _handle = self.acquire().await?;
        let mut results = Vec::with_capacity(stats.len());
        for &stat in stats {
            let value = if self.failing.contains(&stat) {
                Err(StoreError::Query {
                    query: stat.name().to_owned(),
                    message: "relation \"jm_job\" does not exist".into(),
                })
            } else {
                Ok(self.evaluate(stat, window))
            };
            results.push((stat, value));
            tokio::task::yield_now().await;
        }
        Ok(results)
    }

    async fn fetch_top_salary(&self) -> Result<Option<TopSalary>, StoreError> {
        let _handle = self.acquire().await?;
        if self.fail_top_salary {
            return Err(StoreError::Query {
                query: "top_salary".into(),
                message: "relation \"jm_code_postaux\" does not exist".into(),
            });
        }
        let top = self
            .postings
            .iter()
            .filter_map(|p| p.calculated_salary.map(|s| (s, p)))
            .max_by(|a, b| a.0.total_cmp(&b.0));
        Ok(top.map(|(salary, posting)| TopSalary {
            salary,
            department: posting
                .department
                .clone()
                .or_else(|| posting.postal_code.as_deref().map(department_of)),
        }))
    }

    async fn list_postings(&self) -> Result<Vec<JobPosting>, StoreError> {
        let _handle = self.acquire().await?;
        Ok(self.postings.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_reachable()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMetricsStore {
    records: Vec<MetricRecord>,
    unreachable: bool,
}

impl MemoryMetricsStore {
    pub fn new(records: Vec<MetricRecord>) -> Self {
        Self {
            records,
            unreachable: false,
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Connection {
                store: StoreId::Metrics,
                message: "connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn read_metrics_history(&self) -> Result<MetricsStream, StoreError> {
        self.check_reachable()?;
        Ok(stream::iter(self.records.clone().into_iter().map(Ok)).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_reachable()
    }
}

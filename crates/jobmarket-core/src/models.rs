//! Read-only records owned by the two stores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the flattened postings listing (postings joined with the
/// occupation labels and the postal-code reference table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobPosting {
    /// Occupation classification (ROME) code.
    pub rome_code: Option<String>,
    pub rome_label: Option<String>,
    /// One of CDI, CDD, MIS, LIB, FRA, DIN, SAI, CCE.
    pub contract_type: Option<String>,
    /// Free-text nature of the contract, e.g. an apprenticeship marker.
    pub contract_nature: Option<String>,
    /// `D` (beginner accepted), `E` (experience required) or unset.
    pub experience_required: Option<String>,
    pub experience_required_months: Option<f64>,
    /// First two characters of `postal_code`.
    pub department: Option<String>,
    pub postal_code: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub calculated_salary: Option<f64>,
    /// `"lat,long"`.
    pub geo_point: Option<String>,
}

/// One evaluation run of the salary model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricRecord {
    /// Surrogate row key; breaks ties between runs on the same date.
    pub id: i64,
    pub evaluation_date: NaiveDate,
    pub mse: f64,
    pub rmse: f64,
    /// May be negative for a poorly fitted model.
    pub r2: f64,
    pub mae: f64,
}

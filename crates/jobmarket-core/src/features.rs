//! Parse-and-validate boundary between raw form values and the model's
//! feature schema.
//!
//! [`normalize`] either returns a fully typed, immutable
//! [`PredictionRequest`] or a [`ValidationError`]; there is no partially
//! typed intermediate.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Placeholder a select box reports when nothing was chosen.
pub const UNSELECTED: &str = "--";

/// Separator between a code and its human-readable description, as in
/// `"CDI - Contrat à Durée Indéterminée"`.
const LABEL_SEPARATOR: &str = " - ";

/// A form value as it arrives: text or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// Canonical string rendering; integral floats lose their fraction so
    /// `75001.0` and `75001` name the same postal code.
    fn render(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.0}"),
            RawValue::Float(f) => f.to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

/// Unvalidated prediction fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPredictionInput {
    /// ROME code, bare or as `"CODE - label"`.
    pub rome_code: Option<RawValue>,
    /// Contract code, bare or as `"CODE - description"`.
    pub contract_type: Option<RawValue>,
    pub experience_required: Option<RawValue>,
    /// Optional; anything unparseable becomes `0.0`.
    pub experience_required_months: Option<RawValue>,
    pub postal_code: Option<RawValue>,
}

/// One model input row, every field present and typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    rome_code: String,
    contract_type: String,
    experience_required: String,
    experience_required_months: f64,
    department: String,
    postal_code: String,
}

/// A single cell of the model input row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl PredictionRequest {
    /// Feature names in the order the model was trained on.
    pub const FEATURE_NAMES: [&'static str; 6] = [
        "rome_code",
        "contract_type",
        "experience_required",
        "experience_required_months",
        "department",
        "postal_code",
    ];

    pub fn rome_code(&self) -> &str {
        &self.rome_code
    }

    pub fn contract_type(&self) -> &str {
        &self.contract_type
    }

    pub fn experience_required(&self) -> &str {
        &self.experience_required
    }

    pub fn experience_required_months(&self) -> f64 {
        self.experience_required_months
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    /// The row handed to the model, as `(feature name, value)` pairs.
    pub fn feature_row(&self) -> [(&'static str, FeatureValue<'_>); 6] {
        [
            ("rome_code", FeatureValue::Text(&self.rome_code)),
            ("contract_type", FeatureValue::Text(&self.contract_type)),
            ("experience_required", FeatureValue::Text(&self.experience_required)),
            (
                "experience_required_months",
                FeatureValue::Number(self.experience_required_months),
            ),
            ("department", FeatureValue::Text(&self.department)),
            ("postal_code", FeatureValue::Text(&self.postal_code)),
        ]
    }
}

impl From<&PredictionRequest> for RawPredictionInput {
    fn from(req: &PredictionRequest) -> Self {
        Self {
            rome_code: Some(req.rome_code.as_str().into()),
            contract_type: Some(req.contract_type.as_str().into()),
            experience_required: Some(req.experience_required.as_str().into()),
            experience_required_months: Some(req.experience_required_months.into()),
            postal_code: Some(req.postal_code.as_str().into()),
        }
    }
}

/// Validate and coerce raw form values into a [`PredictionRequest`].
///
/// # Errors
///
/// [`ValidationError`] when `rome_code`, `contract_type`,
/// `experience_required` or `postal_code` is absent, blank, or left on
/// [`UNSELECTED`].
pub fn normalize(raw: &RawPredictionInput) -> Result<PredictionRequest, ValidationError> {
    let rome_code = strip_label(&required("rome_code", raw.rome_code.as_ref())?).to_owned();
    if rome_code.is_empty() {
        return Err(ValidationError::Missing("rome_code"));
    }
    let contract_type =
        strip_label(&required("contract_type", raw.contract_type.as_ref())?).to_owned();
    if contract_type.is_empty() {
        return Err(ValidationError::Missing("contract_type"));
    }
    let experience_required = required("experience_required", raw.experience_required.as_ref())?;
    let postal_code = required("postal_code", raw.postal_code.as_ref())?;

    Ok(PredictionRequest {
        department: department_of(&postal_code),
        experience_required_months: coerce_months(raw.experience_required_months.as_ref()),
        rome_code,
        contract_type,
        experience_required,
        postal_code,
    })
}

/// Department of a postal code: its first two characters after
/// left-padding with zeros to a width of two.
pub fn department_of(postal_code: &str) -> String {
    format!("{postal_code:0>2}").chars().take(2).collect()
}

fn required(field: &'static str, value: Option<&RawValue>) -> Result<String, ValidationError> {
    let rendered = value.map(RawValue::render).ok_or(ValidationError::Missing(field))?;
    match rendered.trim() {
        "" => Err(ValidationError::Missing(field)),
        UNSELECTED => Err(ValidationError::Unselected(field)),
        trimmed => Ok(trimmed.to_owned()),
    }
}

fn strip_label(value: &str) -> &str {
    match value.find(LABEL_SEPARATOR) {
        Some(idx) => &value[..idx],
        None => value,
    }
}

/// Permissive numeric coercion; anything that is not a finite number is 0.
fn coerce_months(value: Option<&RawValue>) -> f64 {
    let parsed = match value {
        Some(RawValue::Int(i)) => *i as f64,
        Some(RawValue::Float(f)) => *f,
        Some(RawValue::Text(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        None => 0.0,
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

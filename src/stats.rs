use crate::config::FieldConfig;
use crate::error::DataShapeError;
use crate::types::Feature;
use serde::Serialize;
use serde_json::Value;

/// Typed view of the census attributes of a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusRecord {
    pub state_name: String,
    pub population: f64,
    pub female_count: f64,
    pub male_count: f64,
}

impl CensusRecord {
    pub fn project(feature: &Feature, fields: &FieldConfig) -> Result<Self, DataShapeError> {
        Ok(Self {
            state_name: text_field(feature, &fields.state_name)?,
            population: numeric_field(feature, &fields.population)?,
            female_count: numeric_field(feature, &fields.females)?,
            male_count: numeric_field(feature, &fields.males)?,
        })
    }
}

fn present<'a>(feature: &'a Feature, field: &str) -> Result<&'a Value, DataShapeError> {
    match feature.attribute(field) {
        None | Some(Value::Null) => Err(DataShapeError::MissingField(field.to_string())),
        Some(value) => Ok(value),
    }
}

fn numeric_field(feature: &Feature, field: &str) -> Result<f64, DataShapeError> {
    let value = present(feature, field)?;
    value.as_f64().ok_or_else(|| DataShapeError::NotNumeric {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn text_field(feature: &Feature, field: &str) -> Result<String, DataShapeError> {
    let value = present(feature, field)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DataShapeError::NotText {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Gender split of one selection.
///
/// With a zero total both percentages are NaN; nothing downstream guards
/// against that, so the chart shows a degenerate ring and a `NaN%` label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionStats {
    pub female_count: f64,
    pub male_count: f64,
    pub total: f64,
    pub female_percent: f64,
    pub male_percent: f64,
}

impl SelectionStats {
    pub fn from_counts(female_count: f64, male_count: f64) -> Self {
        let total = female_count + male_count;
        Self {
            female_count,
            male_count,
            total,
            female_percent: female_count / total * 100.0,
            male_percent: male_count / total * 100.0,
        }
    }

    pub fn from_record(record: &CensusRecord) -> Self {
        Self::from_counts(record.female_count, record.male_count)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.female_percent.is_finite() && self.male_percent.is_finite())
    }
}

/// Rounds half up, the way the viewer's labels always have.
pub fn round_percent(value: f64) -> f64 {
    (value + 0.5).floor()
}

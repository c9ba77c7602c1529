//! Per-axis dimension descriptors.
//!
//! # Responsibility
//! - Describe how positions along one axis of a data array map to indices.
//! - Validate descriptor invariants before they are persisted.
//!
//! # Invariants
//! - Sampled dimensions have a finite, strictly positive sampling interval.
//! - Range dimensions have at least one tick, strictly ascending and finite.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Dimension descriptor validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionValidationError {
    NonPositiveInterval(f64),
    NonFiniteOffset(f64),
    EmptyTicks,
    NonFiniteTick { index: usize },
    UnsortedTicks { index: usize },
    InvalidUnit(String),
}

impl Display for DimensionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveInterval(value) => {
                write!(f, "sampling interval must be finite and > 0, got {value}")
            }
            Self::NonFiniteOffset(value) => write!(f, "offset must be finite, got {value}"),
            Self::EmptyTicks => write!(f, "range dimension requires at least one tick"),
            Self::NonFiniteTick { index } => write!(f, "tick {index} is not finite"),
            Self::UnsortedTicks { index } => {
                write!(f, "ticks must be strictly ascending (violated at {index})")
            }
            Self::InvalidUnit(unit) => write!(f, "`{unit}` is not an atomic SI unit"),
        }
    }
}

impl Error for DimensionValidationError {}

/// Discrete, labelled positions. A position is itself an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetDimension {
    #[serde(default)]
    pub labels: Vec<String>,
}

impl SetDimension {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }
}

/// Regular sampling: `position(i) = offset + i * sampling_interval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledDimension {
    pub sampling_interval: f64,
    #[serde(default)]
    pub offset: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl SampledDimension {
    pub fn new(sampling_interval: f64) -> Result<Self, DimensionValidationError> {
        let dim = Self {
            sampling_interval,
            offset: None,
            unit: None,
            label: None,
        };
        dim.validate()?;
        Ok(dim)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn validate(&self) -> Result<(), DimensionValidationError> {
        if !self.sampling_interval.is_finite() || self.sampling_interval <= 0.0 {
            return Err(DimensionValidationError::NonPositiveInterval(
                self.sampling_interval,
            ));
        }
        if let Some(offset) = self.offset {
            if !offset.is_finite() {
                return Err(DimensionValidationError::NonFiniteOffset(offset));
            }
        }
        validate_unit(self.unit.as_deref())
    }

    /// Position of sample `index`.
    pub fn position_at(&self, index: u64) -> f64 {
        self.offset.unwrap_or(0.0) + index as f64 * self.sampling_interval
    }

    /// Positions of `count` samples starting at `start`.
    pub fn axis(&self, count: u64, start: u64) -> Vec<f64> {
        (start..start.saturating_add(count))
            .map(|index| self.position_at(index))
            .collect()
    }
}

/// Irregular sampling with explicit ascending ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeDimension {
    pub ticks: Vec<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl RangeDimension {
    pub fn new(ticks: Vec<f64>) -> Result<Self, DimensionValidationError> {
        let dim = Self {
            ticks,
            unit: None,
            label: None,
        };
        dim.validate()?;
        Ok(dim)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn validate(&self) -> Result<(), DimensionValidationError> {
        if self.ticks.is_empty() {
            return Err(DimensionValidationError::EmptyTicks);
        }
        for (index, tick) in self.ticks.iter().enumerate() {
            if !tick.is_finite() {
                return Err(DimensionValidationError::NonFiniteTick { index });
            }
            if index > 0 && *tick <= self.ticks[index - 1] {
                return Err(DimensionValidationError::UnsortedTicks { index });
            }
        }
        validate_unit(self.unit.as_deref())
    }

    /// Distance between the last two ticks, or zero for a single tick.
    pub fn last_step(&self) -> f64 {
        match self.ticks.as_slice() {
            [.., before, last] => last - before,
            _ => 0.0,
        }
    }
}

/// Descriptor for one axis of a data array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dimension_type", rename_all = "snake_case")]
pub enum Dimension {
    Set(SetDimension),
    Sampled(SampledDimension),
    Range(RangeDimension),
}

impl Dimension {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Sampled(_) => "sampled",
            Self::Range(_) => "range",
        }
    }

    /// Native unit of the axis, if any. Set dimensions never carry one.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Set(_) => None,
            Self::Sampled(dim) => dim.unit.as_deref(),
            Self::Range(dim) => dim.unit.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<(), DimensionValidationError> {
        match self {
            Self::Set(_) => Ok(()),
            Self::Sampled(dim) => dim.validate(),
            Self::Range(dim) => dim.validate(),
        }
    }
}

impl From<SetDimension> for Dimension {
    fn from(value: SetDimension) -> Self {
        Self::Set(value)
    }
}

impl From<SampledDimension> for Dimension {
    fn from(value: SampledDimension) -> Self {
        Self::Sampled(value)
    }
}

impl From<RangeDimension> for Dimension {
    fn from(value: RangeDimension) -> Self {
        Self::Range(value)
    }
}

fn validate_unit(unit: Option<&str>) -> Result<(), DimensionValidationError> {
    match unit {
        Some(unit) if !super::units::is_unitless(Some(unit)) => {
            if super::units::parse_si_unit(unit).is_none() {
                return Err(DimensionValidationError::InvalidUnit(unit.to_string()));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Dimension, DimensionValidationError, RangeDimension, SampledDimension};

    #[test]
    fn sampled_rejects_non_positive_interval() {
        assert_eq!(
            SampledDimension::new(0.0).unwrap_err(),
            DimensionValidationError::NonPositiveInterval(0.0)
        );
        assert!(SampledDimension::new(f64::NAN).is_err());
    }

    #[test]
    fn sampled_axis_applies_offset() {
        let dim = SampledDimension::new(0.5).unwrap().with_offset(1.0);
        assert_eq!(dim.axis(3, 1), vec![1.5, 2.0, 2.5]);
    }

    #[test]
    fn range_requires_strictly_ascending_ticks() {
        assert_eq!(
            RangeDimension::new(vec![]).unwrap_err(),
            DimensionValidationError::EmptyTicks
        );
        assert_eq!(
            RangeDimension::new(vec![1.0, 1.0]).unwrap_err(),
            DimensionValidationError::UnsortedTicks { index: 1 }
        );
        assert_eq!(RangeDimension::new(vec![1.0, 3.0]).unwrap().last_step(), 2.0);
    }

    #[test]
    fn unit_must_be_atomic_si() {
        let dim = SampledDimension::new(1.0).unwrap().with_unit("furlong");
        assert!(matches!(
            dim.validate(),
            Err(DimensionValidationError::InvalidUnit(_))
        ));
    }

    #[test]
    fn descriptor_is_tagged_on_the_wire() {
        let dim: Dimension = SampledDimension::new(0.1).unwrap().with_unit("s").into();
        let json = serde_json::to_value(&dim).unwrap();
        assert_eq!(json["dimension_type"], "sampled");
        assert_eq!(json["sampling_interval"], 0.1);
        let decoded: Dimension = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, dim);
    }
}

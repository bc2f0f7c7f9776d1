//! Fuzzy truth values.
//!
//! Instructions, actions and plans report a [`FuzzyValue<bool>`] instead of a
//! plain flag. The degree is kept all the way up to plan scoring and
//! intention reports; it is only compared against a threshold where a binary
//! decision is unavoidable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default threshold at which a fuzzy boolean counts as success.
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.5;

/// A payload with a truth degree in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use bdi_engine::FuzzyValue;
///
/// let ok = FuzzyValue::new(true, 0.8).unwrap();
/// assert!(ok.is_success(0.5));
///
/// // degrees outside [0, 1] are rejected
/// assert!(FuzzyValue::new(true, 1.2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FuzzyValue<T> {
    value: T,
    degree: f64,
}

impl<T> FuzzyValue<T> {
    /// Minimum valid degree.
    pub const MIN_DEGREE: f64 = 0.0;

    /// Maximum valid degree.
    pub const MAX_DEGREE: f64 = 1.0;

    /// Creates a fuzzy value with validation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::FuzzyOutOfRange` if the degree is NaN or not
    /// in [0.0, 1.0].
    pub fn new(value: T, degree: f64) -> Result<Self, ValidationError> {
        validate_degree(degree)?;
        Ok(Self { value, degree })
    }

    pub const fn value(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub const fn degree(&self) -> f64 {
        self.degree
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Maps the payload, keeping the degree.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FuzzyValue<U> {
        FuzzyValue {
            value: f(self.value),
            degree: self.degree,
        }
    }
}

impl FuzzyValue<bool> {
    /// Full success.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            value: true,
            degree: 1.0,
        }
    }

    /// Full failure.
    #[must_use]
    pub const fn failure() -> Self {
        Self {
            value: false,
            degree: 1.0,
        }
    }

    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::success()
        } else {
            Self::failure()
        }
    }

    /// A success-leaning value whose truth equals `truth`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::FuzzyOutOfRange` if `truth` is not in [0.0, 1.0].
    pub fn with_truth(truth: f64) -> Result<Self, ValidationError> {
        Self::new(true, truth)
    }

    /// Degree of truth: the degree for `true`, its complement for `false`.
    #[must_use]
    pub fn truth(&self) -> f64 {
        if self.value {
            self.degree
        } else {
            1.0 - self.degree
        }
    }

    /// Defuzzifies against a threshold.
    #[must_use]
    pub fn is_success(&self, threshold: f64) -> bool {
        self.truth() >= threshold
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FuzzyValue<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw<T> {
            value: T,
            degree: f64,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        FuzzyValue::new(raw.value, raw.degree).map_err(serde::de::Error::custom)
    }
}

impl<T: fmt::Display> fmt::Display for FuzzyValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2})", self.value, self.degree)
    }
}

/// Validates that a degree is in the valid range.
///
/// # Errors
///
/// Returns `ValidationError::FuzzyOutOfRange` for NaN or out-of-range values.
pub fn validate_degree(degree: f64) -> Result<(), ValidationError> {
    if degree.is_nan() || !(0.0..=1.0).contains(&degree) {
        return Err(ValidationError::FuzzyOutOfRange { value: degree });
    }
    Ok(())
}

/// How a list of degrees folds into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Arithmetic mean.
    #[default]
    Mean,
    Min,
    Max,
    Product,
}

impl Aggregation {
    /// Folds `degrees`; an empty list aggregates to 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aggregate(self, degrees: &[f64]) -> f64 {
        if degrees.is_empty() {
            return 1.0;
        }
        let folded = match self {
            Self::Mean => degrees.iter().sum::<f64>() / degrees.len() as f64,
            Self::Min => degrees.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => degrees.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Product => degrees.iter().product(),
        };
        folded.clamp(0.0, 1.0)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Product => write!(f, "product"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_validation() {
        assert!(FuzzyValue::new(true, 0.0).is_ok());
        assert!(FuzzyValue::new(true, 1.0).is_ok());
        assert_eq!(
            FuzzyValue::new(true, 1.2),
            Err(ValidationError::FuzzyOutOfRange { value: 1.2 })
        );
        assert!(FuzzyValue::new(false, -0.1).is_err());
        assert!(FuzzyValue::new(false, f64::NAN).is_err());
    }

    #[test]
    fn test_deserialize_validates_degree() {
        let parsed: FuzzyValue<bool> = serde_json::from_str(r#"{"value":false,"degree":0.25}"#).unwrap();
        assert!((parsed.truth() - 0.75).abs() < 1e-12);
        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(serde_json::from_str::<FuzzyValue<bool>>(&json).unwrap(), parsed);

        let err = serde_json::from_str::<FuzzyValue<bool>>(r#"{"value":true,"degree":1.2}"#).unwrap_err();
        assert!(err.to_string().contains("1.2"));
        assert!(serde_json::from_str::<FuzzyValue<bool>>(r#"{"value":true,"degree":-0.5}"#).is_err());
    }

    #[test]
    fn test_truth() {
        assert!((FuzzyValue::success().truth() - 1.0).abs() < f64::EPSILON);
        assert!(FuzzyValue::failure().truth().abs() < f64::EPSILON);

        let weak_no = FuzzyValue::new(false, 0.3).unwrap();
        assert!((weak_no.truth() - 0.7).abs() < 1e-12);
        assert!(weak_no.is_success(DEFAULT_SUCCESS_THRESHOLD));

        let weak_yes = FuzzyValue::with_truth(0.4).unwrap();
        assert!(!weak_yes.is_success(DEFAULT_SUCCESS_THRESHOLD));
    }

    #[test]
    fn test_map_keeps_degree() {
        let v = FuzzyValue::new(2_i32, 0.6).unwrap().map(|x| x * 2);
        assert_eq!(*v.value(), 4);
        assert!((v.degree() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregation() {
        let degrees = [0.2, 0.4, 0.9];
        assert!((Aggregation::Mean.aggregate(&degrees) - 0.5).abs() < 1e-12);
        assert!((Aggregation::Min.aggregate(&degrees) - 0.2).abs() < 1e-12);
        assert!((Aggregation::Max.aggregate(&degrees) - 0.9).abs() < 1e-12);
        assert!((Aggregation::Product.aggregate(&degrees) - 0.072).abs() < 1e-12);
        assert!((Aggregation::Mean.aggregate(&[]) - 1.0).abs() < f64::EPSILON);
    }
}
